//! OAuthClient entity - McpDock's registered client with a remote
//! authorization server.
//!
//! One authoritative client per (organization, connection) pair. Created by
//! dynamic registration or by the manual-credential path; replaced (never
//! mutated) when registration is redone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A dynamically-registered (or manually supplied) OAuth client for one
/// (organization, connection) pair.
///
/// Carries the full endpoint set from discovery so the callback path can
/// exchange codes without re-discovering, and the registration-management
/// credentials (if the provider issued any) for later client maintenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClient {
    pub id: Uuid,

    pub organization_id: Uuid,
    pub connection_id: Uuid,

    /// Issuer identifier from discovery.
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub registration_endpoint: Option<String>,

    /// Client credentials. `client_secret` is None for public clients.
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,

    /// RFC 7592 management handle, if the provider issued one.
    #[serde(default)]
    pub registration_access_token: Option<String>,
    #[serde(default)]
    pub registration_client_uri: Option<String>,

    /// How the client authenticates at the token endpoint
    /// ("client_secret_basic", "client_secret_post", or "none").
    pub token_endpoint_auth_method: String,

    pub grant_types: Vec<String>,
    pub response_types: Vec<String>,
    pub redirect_uris: Vec<String>,

    /// Scope string granted at registration, if any.
    #[serde(default)]
    pub scope: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OAuthClient {
    /// Whether this client is a public client (no secret issued).
    pub fn is_public(&self) -> bool {
        self.client_secret.is_none()
    }

    /// Check if a redirect URI was registered for this client.
    pub fn allows_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == redirect_uri)
    }
}
