//! Repository traits for data access
//!
//! These traits define the interface for data storage without specifying
//! the implementation (SQLite, in-memory, etc.)

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    ApiKey, Connection, ConnectionStatus, OAuthClient, OAuthToken, ServerTool, TokenPurpose,
};

/// Result type for repository operations
pub type RepoResult<T> = anyhow::Result<T>;

/// Connection repository trait
#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    /// Get a connection by ID
    async fn get(&self, id: &Uuid) -> RepoResult<Option<Connection>>;

    /// Create a connection on its own (manual flows that attach a client later)
    async fn create(&self, connection: &Connection) -> RepoResult<()>;

    /// Create a connection together with its OAuth client in one transaction.
    ///
    /// A caller must never observe a connection row without its client, so
    /// the two inserts commit as a unit.
    async fn create_with_client(
        &self,
        connection: &Connection,
        client: &OAuthClient,
    ) -> RepoResult<()>;

    /// Update a connection's status
    async fn set_status(&self, id: &Uuid, status: &ConnectionStatus) -> RepoResult<()>;

    /// List connections owned by an organization
    async fn list_for_organization(&self, organization_id: &Uuid) -> RepoResult<Vec<Connection>>;

    /// Delete a connection
    async fn delete(&self, id: &Uuid) -> RepoResult<()>;
}

/// OAuth client repository trait
///
/// Stores McpDock's registered clients WITH remote authorization servers.
/// Exactly one authoritative client per (organization, connection) pair;
/// save is an upsert on that pair.
#[async_trait]
pub trait OAuthClientRepository: Send + Sync {
    /// Get a client by ID
    async fn get(&self, id: &Uuid) -> RepoResult<Option<OAuthClient>>;

    /// Get the authoritative client for a (organization, connection) pair
    async fn get_for_connection(
        &self,
        organization_id: &Uuid,
        connection_id: &Uuid,
    ) -> RepoResult<Option<OAuthClient>>;

    /// Save or replace the client for its (organization, connection) pair
    async fn save(&self, client: &OAuthClient) -> RepoResult<()>;

    /// Delete the client for a (organization, connection) pair
    async fn delete(&self, organization_id: &Uuid, connection_id: &Uuid) -> RepoResult<()>;
}

/// OAuth token repository trait
///
/// At most one live token per (user, connection, purpose); save replaces.
#[async_trait]
pub trait OAuthTokenRepository: Send + Sync {
    /// Get the live token for a (user, connection, purpose) triple
    async fn get(
        &self,
        user_id: &Uuid,
        connection_id: &Uuid,
        purpose: &TokenPurpose,
    ) -> RepoResult<Option<OAuthToken>>;

    /// Save a token, replacing any prior token for the same triple
    async fn save(&self, token: &OAuthToken) -> RepoResult<()>;

    /// Delete all tokens for a connection (on disconnect/uninstall)
    async fn delete_for_connection(&self, connection_id: &Uuid) -> RepoResult<()>;

    /// List tokens held by a user
    async fn list_for_user(&self, user_id: &Uuid) -> RepoResult<Vec<OAuthToken>>;
}

/// Server tool repository trait
#[async_trait]
pub trait ServerToolRepository: Send + Sync {
    /// List the cached catalog for a connection
    async fn list_for_connection(&self, connection_id: &Uuid) -> RepoResult<Vec<ServerTool>>;

    /// Replace the cached catalog for a connection wholesale.
    ///
    /// Deletes prior entries and inserts the new set in one transaction so
    /// stale tools never coexist with a fresh catalog.
    async fn replace_for_connection(
        &self,
        connection_id: &Uuid,
        tools: &[ServerTool],
    ) -> RepoResult<()>;

    /// Delete the catalog for a connection
    async fn delete_for_connection(&self, connection_id: &Uuid) -> RepoResult<()>;
}

/// API key repository trait
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    /// Create a new key
    async fn create(&self, key: &ApiKey) -> RepoResult<()>;

    /// Look up a key by its exact opaque value
    async fn find_by_key(&self, key: &str) -> RepoResult<Option<ApiKey>>;

    /// Update a key's last-used timestamp
    async fn touch_last_used(&self, id: &Uuid) -> RepoResult<()>;

    /// Activate or deactivate a key
    async fn set_active(&self, id: &Uuid, active: bool) -> RepoResult<()>;

    /// List keys minted for a connection
    async fn list_for_connection(&self, connection_id: &Uuid) -> RepoResult<Vec<ApiKey>>;
}
