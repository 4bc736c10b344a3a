//! ServerTool entity - the cached tool catalog of a connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One callable operation a connected server exposes.
///
/// The catalog is discovered after authorization and replaced wholesale on
/// every successful introspection; stale entries never survive a refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerTool {
    pub id: Uuid,

    pub connection_id: Uuid,

    /// MCP tool name (unique per connection).
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// JSON Schema describing the tool's input, as reported by the server.
    #[serde(default)]
    pub input_schema: Option<serde_json::Value>,

    pub discovered_at: DateTime<Utc>,
}

impl ServerTool {
    pub fn new(connection_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            connection_id,
            name: name.into(),
            description: None,
            input_schema: None,
            discovered_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input_schema(mut self, schema: serde_json::Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}
