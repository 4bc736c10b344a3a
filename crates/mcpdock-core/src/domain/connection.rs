//! Connection entity - a configured link to one deployment of a remote
//! tool-provider server, owned by an organization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a connection's target server comes from.
///
/// Resolved exactly once at connection creation into a [`ResolvedServer`];
/// every downstream step consumes the normalized form and never branches on
/// the origin again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerOrigin {
    /// A server instantiated from a curated template.
    Template {
        template_id: Uuid,
        url: String,
        name: String,
    },
    /// A server the operator pointed at directly by URL.
    Custom { url: String, name: String },
}

impl ServerOrigin {
    /// Normalize into the (url, display name, owning template) triple.
    pub fn resolve(&self) -> ResolvedServer {
        match self {
            Self::Template {
                template_id,
                url,
                name,
            } => ResolvedServer {
                url: url.clone(),
                display_name: name.clone(),
                template_id: Some(*template_id),
            },
            Self::Custom { url, name } => ResolvedServer {
                url: url.clone(),
                display_name: name.clone(),
                template_id: None,
            },
        }
    }
}

/// Normalized server identity consumed by every downstream step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedServer {
    pub url: String,
    pub display_name: String,
    pub template_id: Option<Uuid>,
}

/// Wire protocol used for the connection's tool-listing calls.
///
/// A property of the connection record, chosen at creation - not a runtime
/// decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolTransport {
    /// Streaming listing: responses framed as Server-Sent Events.
    Sse,
    /// Plain request/response listing over HTTP POST.
    Http,
}

impl ToolTransport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sse => "sse",
            Self::Http => "http",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sse" => Some(Self::Sse),
            "http" => Some(Self::Http),
            _ => None,
        }
    }
}

/// Connection status lifecycle.
///
/// `Pending` covers everything before authorization completes. Only the
/// callback/introspection path may move a connection to `Running` or
/// `Error`; `Stopped` is an administrative switch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Created, awaiting authorization.
    Pending,
    /// Token obtained and at least one tool discovered.
    Running,
    /// Introspection failed or returned zero tools.
    Error { message: String },
    /// Administratively disabled.
    Stopped,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Error { .. } => "error",
            Self::Stopped => "stopped",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// A configured, possibly-authorized link to one remote tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: Uuid,

    /// Owning organization.
    pub organization_id: Uuid,

    /// Normalized server identity (resolved from the origin at creation).
    pub server: ResolvedServer,

    /// Tool-listing wire protocol for this connection.
    pub transport: ToolTransport,

    pub status: ConnectionStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    /// Create a pending connection from an origin.
    pub fn new(organization_id: Uuid, origin: &ServerOrigin, transport: ToolTransport) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            server: origin.resolve(),
            transport,
            status: ConnectionStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}
