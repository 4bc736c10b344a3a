//! Post-authorization tool introspection.
//!
//! Once a token exists, the target server is asked what tools it exposes.
//! A connection only becomes RUNNING if the listing returns at least one
//! tool; an empty catalog is a failure, not a valid empty state.

mod transport;

pub use transport::{ToolDescriptor, ToolListingClient};

use std::sync::Arc;

use mcpdock_core::{
    Connection, ConnectionRepository, ConnectionStatus, ServerTool, ServerToolRepository,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ConnectError;

/// Outcome of a successful introspection.
#[derive(Debug)]
pub struct IntrospectionReport {
    pub connection_id: Uuid,
    pub tools: Vec<ServerTool>,
}

impl IntrospectionReport {
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }
}

/// Lists a connected server's tools and finalizes the connection status.
///
/// Owns the PENDING→RUNNING and →ERROR transitions: on success the cached
/// catalog is replaced wholesale and the connection flips to RUNNING; any
/// failure (including zero tools) records ERROR with a message.
pub struct ToolIntrospector {
    http_client: reqwest::Client,
    connection_repo: Arc<dyn ConnectionRepository>,
    tool_repo: Arc<dyn ServerToolRepository>,
}

impl ToolIntrospector {
    pub fn new(
        http_client: reqwest::Client,
        connection_repo: Arc<dyn ConnectionRepository>,
        tool_repo: Arc<dyn ServerToolRepository>,
    ) -> Self {
        Self {
            http_client,
            connection_repo,
            tool_repo,
        }
    }

    /// Introspect the connection's server with a bearer token and settle
    /// the connection status accordingly.
    pub async fn introspect(
        &self,
        connection: &Connection,
        access_token: &str,
    ) -> Result<IntrospectionReport, ConnectError> {
        info!(
            "Introspecting tools for connection {} ({})",
            connection.id, connection.server.url
        );

        let client = ToolListingClient::new(self.http_client.clone(), connection.transport);

        let descriptors = match client
            .list_tools(&connection.server.url, access_token)
            .await
        {
            Ok(descriptors) => descriptors,
            Err(e) => {
                let message = format!("tool listing failed: {}", e);
                self.record_error(&connection.id, &message).await;
                return Err(ConnectError::ToolIntrospectionFailed(message));
            }
        };

        if descriptors.is_empty() {
            let message = format!(
                "{} returned no tools; refusing to mark the connection usable",
                connection.server.display_name
            );
            self.record_error(&connection.id, &message).await;
            return Err(ConnectError::ToolIntrospectionFailed(message));
        }

        let tools: Vec<ServerTool> = descriptors
            .into_iter()
            .map(|d| {
                let mut tool = ServerTool::new(connection.id, d.name);
                tool.description = d.description;
                tool.input_schema = d.input_schema;
                tool
            })
            .collect();

        // Replace, never merge: stale entries from a prior introspection
        // must not survive.
        self.tool_repo
            .replace_for_connection(&connection.id, &tools)
            .await?;

        self.connection_repo
            .set_status(&connection.id, &ConnectionStatus::Running)
            .await?;

        info!(
            "Connection {} is RUNNING with {} tools",
            connection.id,
            tools.len()
        );

        Ok(IntrospectionReport {
            connection_id: connection.id,
            tools,
        })
    }

    /// Record a failed introspection on the connection. The token stays
    /// persisted; retrying introspection alone is the remediation.
    async fn record_error(&self, connection_id: &Uuid, message: &str) {
        if let Err(e) = self
            .connection_repo
            .set_status(
                connection_id,
                &ConnectionStatus::Error {
                    message: message.to_string(),
                },
            )
            .await
        {
            warn!(
                "Failed to record introspection error on {}: {}",
                connection_id, e
            );
        }
    }
}
