//! OAuth Discovery (OAuth Server Metadata / OpenID Connect Discovery)
//!
//! Fetches authorization server metadata from `.well-known` endpoints.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConnectError;

/// Authorization server metadata from discovery.
///
/// `issuer`, `authorization_endpoint`, and `token_endpoint` are mandatory;
/// a document missing any of them fails deserialization and the whole
/// discovery is treated as unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthServerMetadata {
    /// Issuer identifier
    pub issuer: String,

    /// Authorization endpoint URL
    pub authorization_endpoint: String,

    /// Token endpoint URL
    pub token_endpoint: String,

    /// Dynamic client registration endpoint (optional)
    #[serde(default)]
    pub registration_endpoint: Option<String>,

    /// Supported scopes
    #[serde(default)]
    pub scopes_supported: Vec<String>,

    /// Supported response types
    #[serde(default)]
    pub response_types_supported: Vec<String>,

    /// Supported grant types
    #[serde(default)]
    pub grant_types_supported: Vec<String>,

    /// Supported PKCE code challenge methods
    #[serde(default)]
    pub code_challenge_methods_supported: Vec<String>,

    /// Supported token endpoint auth methods
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

impl AuthServerMetadata {
    /// Check if S256 PKCE is advertised
    pub fn supports_pkce(&self) -> bool {
        self.code_challenge_methods_supported
            .contains(&"S256".to_string())
    }

    /// Check if a specific scope is supported (empty list = all allowed)
    pub fn supports_scope(&self, scope: &str) -> bool {
        self.scopes_supported.is_empty() || self.scopes_supported.contains(&scope.to_string())
    }
}

/// Discovery client for authorization server metadata.
pub struct MetadataDiscoverer {
    http_client: reqwest::Client,
}

impl MetadataDiscoverer {
    /// Create a new discoverer sharing the engine's HTTP client.
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Fetch metadata for an authorization server base URL.
    ///
    /// Tries OIDC discovery first, then falls back to OAuth Authorization
    /// Server metadata. Both missing means the provider is not a valid
    /// target; callers must not retry without operator intervention.
    pub async fn fetch(&self, base_url: &str) -> Result<AuthServerMetadata, ConnectError> {
        let base = base_url.trim_end_matches('/');

        let oidc_url = format!("{}/.well-known/openid-configuration", base);
        debug!("Trying OIDC discovery: {}", oidc_url);

        match self.fetch_metadata(&oidc_url).await {
            Ok(metadata) => {
                info!("OIDC discovery successful for {}", base);
                return Ok(metadata);
            }
            Err(e) => {
                debug!("OIDC discovery failed: {}, trying OAuth AS metadata", e);
            }
        }

        let oauth_url = format!("{}/.well-known/oauth-authorization-server", base);
        debug!("Trying OAuth AS discovery: {}", oauth_url);

        match self.fetch_metadata(&oauth_url).await {
            Ok(metadata) => {
                info!("OAuth AS discovery successful for {}", base);
                Ok(metadata)
            }
            Err(e) => Err(ConnectError::MetadataUnavailable(format!(
                "no valid metadata at OIDC or OAuth AS endpoints for {}: {}",
                base, e
            ))),
        }
    }

    /// Fetch metadata from a specific URL.
    async fn fetch_metadata(&self, url: &str) -> anyhow::Result<AuthServerMetadata> {
        let response = self
            .http_client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("discovery request failed: HTTP {}", response.status());
        }

        // Missing mandatory fields fail here, which is the point: a document
        // without authorization_endpoint/token_endpoint is no metadata at all.
        let metadata: AuthServerMetadata = response.json().await?;
        Ok(metadata)
    }
}
