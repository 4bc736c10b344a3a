//! Core domain entities.

mod api_key;
mod connection;
mod oauth_client;
mod oauth_token;
mod server_tool;

pub use api_key::ApiKey;
pub use connection::{Connection, ConnectionStatus, ResolvedServer, ServerOrigin, ToolTransport};
pub use oauth_client::OAuthClient;
pub use oauth_token::{OAuthToken, TokenPurpose};
pub use server_tool::ServerTool;
