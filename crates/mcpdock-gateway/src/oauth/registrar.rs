//! Dynamic Client Registration (RFC 7591)
//!
//! Registers McpDock as an OAuth client with a remote authorization server
//! at runtime, so no static client has to be pre-provisioned per provider.

use chrono::Utc;
use mcpdock_core::OAuthClient;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use super::AuthServerMetadata;
use crate::error::ConnectError;

/// Registration request body (RFC 7591 client metadata).
#[derive(Debug, Clone, Serialize)]
pub struct ClientRegistrationRequest {
    /// Human-readable name of the client
    pub client_name: String,
    /// Array of redirect URIs the client will use
    pub redirect_uris: Vec<String>,
    /// OAuth 2.0 grant types the client may use
    pub grant_types: Vec<String>,
    /// OAuth 2.0 response types the client may use
    pub response_types: Vec<String>,
    /// Requested token endpoint auth method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,
    /// Requested scope string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl ClientRegistrationRequest {
    /// Standard authorization-code registration for one redirect URI.
    pub fn authorization_code(
        client_name: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: Option<String>,
    ) -> Self {
        Self {
            client_name: client_name.into(),
            redirect_uris: vec![redirect_uri.into()],
            grant_types: vec![
                "authorization_code".to_string(),
                "refresh_token".to_string(),
            ],
            response_types: vec!["code".to_string()],
            token_endpoint_auth_method: None,
            scope,
        }
    }
}

/// Registration response (RFC 7591), as the provider returned it.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientRegistrationResponse {
    /// Unique client identifier
    pub client_id: String,
    /// Client secret (absent for public clients)
    #[serde(default)]
    pub client_secret: Option<String>,
    /// RFC 7592 management token, if issued
    #[serde(default)]
    pub registration_access_token: Option<String>,
    /// RFC 7592 management URL, if issued
    #[serde(default)]
    pub registration_client_uri: Option<String>,
    /// Echoed/adjusted redirect URIs
    #[serde(default)]
    pub redirect_uris: Option<Vec<String>>,
    /// Echoed/adjusted grant types
    #[serde(default)]
    pub grant_types: Option<Vec<String>>,
    /// Echoed/adjusted response types
    #[serde(default)]
    pub response_types: Option<Vec<String>>,
    /// Auth method the provider settled on
    #[serde(default)]
    pub token_endpoint_auth_method: Option<String>,
    /// Scope the provider granted
    #[serde(default)]
    pub scope: Option<String>,
}

/// Performs RFC 7591 registration against a discovered registration
/// endpoint and builds the persistable [`OAuthClient`].
pub struct DynamicClientRegistrar {
    http_client: reqwest::Client,
}

impl DynamicClientRegistrar {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Register a client with the provider described by `metadata`.
    ///
    /// Returns the built entity plus the raw registration response.
    /// Persistence is left to the caller so the connection row and the
    /// client row can commit as one transaction.
    pub async fn register(
        &self,
        metadata: &AuthServerMetadata,
        request: ClientRegistrationRequest,
        organization_id: Uuid,
        connection_id: Uuid,
    ) -> Result<(OAuthClient, ClientRegistrationResponse), ConnectError> {
        let registration_endpoint = metadata.registration_endpoint.as_deref().ok_or_else(|| {
            ConnectError::DcrFailed(format!(
                "{} does not advertise a registration endpoint",
                metadata.issuer
            ))
        })?;

        info!(
            "Registering client \"{}\" at {}",
            request.client_name, registration_endpoint
        );

        let response = self
            .http_client
            .post(registration_endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ConnectError::DcrFailed(format!("registration request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Registration rejected: HTTP {} - {}", status, body);
            return Err(ConnectError::DcrFailed(format!(
                "registration endpoint returned HTTP {}: {}",
                status, body
            )));
        }

        let registration: ClientRegistrationResponse = response
            .json()
            .await
            .map_err(|e| ConnectError::DcrFailed(format!("invalid registration response: {}", e)))?;

        info!(
            "Registered client_id {} with {}",
            registration.client_id, metadata.issuer
        );

        let client = Self::build_client(
            metadata,
            &request,
            &registration,
            organization_id,
            connection_id,
        );

        Ok((client, registration))
    }

    /// Build an [`OAuthClient`] from operator-supplied credentials.
    ///
    /// The manual fallback when a provider rejects registration: discovery
    /// still ran, registration is skipped.
    pub fn from_manual_credentials(
        metadata: &AuthServerMetadata,
        organization_id: Uuid,
        connection_id: Uuid,
        client_id: impl Into<String>,
        client_secret: Option<String>,
        redirect_uri: impl Into<String>,
        scope: Option<String>,
    ) -> OAuthClient {
        let now = Utc::now();
        let auth_method = if client_secret.is_some() {
            "client_secret_post"
        } else {
            "none"
        };

        OAuthClient {
            id: Uuid::new_v4(),
            organization_id,
            connection_id,
            issuer: metadata.issuer.clone(),
            authorization_endpoint: metadata.authorization_endpoint.clone(),
            token_endpoint: metadata.token_endpoint.clone(),
            registration_endpoint: metadata.registration_endpoint.clone(),
            client_id: client_id.into(),
            client_secret,
            registration_access_token: None,
            registration_client_uri: None,
            token_endpoint_auth_method: auth_method.to_string(),
            grant_types: vec!["authorization_code".to_string()],
            response_types: vec!["code".to_string()],
            redirect_uris: vec![redirect_uri.into()],
            scope,
            created_at: now,
            updated_at: now,
        }
    }

    fn build_client(
        metadata: &AuthServerMetadata,
        request: &ClientRegistrationRequest,
        registration: &ClientRegistrationResponse,
        organization_id: Uuid,
        connection_id: Uuid,
    ) -> OAuthClient {
        let now = Utc::now();

        // Providers may adjust what we asked for; their answer wins.
        let token_endpoint_auth_method = registration
            .token_endpoint_auth_method
            .clone()
            .unwrap_or_else(|| {
                if registration.client_secret.is_some() {
                    "client_secret_post".to_string()
                } else {
                    "none".to_string()
                }
            });

        OAuthClient {
            id: Uuid::new_v4(),
            organization_id,
            connection_id,
            issuer: metadata.issuer.clone(),
            authorization_endpoint: metadata.authorization_endpoint.clone(),
            token_endpoint: metadata.token_endpoint.clone(),
            registration_endpoint: metadata.registration_endpoint.clone(),
            client_id: registration.client_id.clone(),
            client_secret: registration.client_secret.clone(),
            registration_access_token: registration.registration_access_token.clone(),
            registration_client_uri: registration.registration_client_uri.clone(),
            token_endpoint_auth_method,
            grant_types: registration
                .grant_types
                .clone()
                .unwrap_or_else(|| request.grant_types.clone()),
            response_types: registration
                .response_types
                .clone()
                .unwrap_or_else(|| request.response_types.clone()),
            redirect_uris: registration
                .redirect_uris
                .clone()
                .unwrap_or_else(|| request.redirect_uris.clone()),
            scope: registration.scope.clone().or_else(|| request.scope.clone()),
            created_at: now,
            updated_at: now,
        }
    }
}
