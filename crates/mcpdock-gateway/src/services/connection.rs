//! Connection lifecycle orchestration.
//!
//! Wires discovery, registration, the PKCE flow, the state-token codec,
//! token exchange, and tool introspection into the operations callers see:
//! create a connection, start authorization, handle the callback, retry
//! introspection.
//!
//! The service is stateless across the browser redirect: everything needed
//! to resume at the callback rides inside the sealed state token, so no
//! lock, transaction, or in-memory map spans the user-interaction gap.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mcpdock_core::{
    Connection, ConnectionRepository, ConnectionStatus, EngineConfig, OAuthClient,
    OAuthClientRepository, OAuthToken, OAuthTokenRepository, ServerOrigin, ServerToolRepository,
    TokenPurpose, ToolTransport,
};
use mcpdock_core::{ApiKey, ApiKeyRepository};
use tracing::{info, warn};
use uuid::Uuid;

use crate::apikey::ApiKeyIssuer;
use crate::error::ConnectError;
use crate::introspect::{IntrospectionReport, ToolIntrospector};
use crate::oauth::{
    build_authorization_url, AuthorizationAttempt, CallbackParams, ClientRegistrationRequest,
    DynamicClientRegistrar, MetadataDiscoverer, PkceMaterial, StateTokenCodec, TokenExchanger,
};

/// What the caller needs to redirect the user's browser.
#[derive(Debug, Clone)]
pub struct AuthorizationRedirect {
    /// Full authorization-endpoint URL to navigate to
    pub authorization_url: String,
    /// When the embedded state token stops being redeemable
    pub state_expires_at: DateTime<Utc>,
}

/// Result of processing an authorization callback.
///
/// A persisted token with a failed introspection is a valid, recoverable
/// outcome - the connection carries the error status, not the API call.
#[derive(Debug)]
pub struct CallbackOutcome {
    pub connection_id: Uuid,
    pub status: ConnectionStatus,
    pub tool_count: usize,
    /// Present only when a key was minted by this callback (first time the
    /// connection reached RUNNING). The value is shown once and never again.
    pub api_key: Option<ApiKey>,
}

/// Orchestrates the OAuth connection lifecycle.
pub struct ConnectionService {
    config: EngineConfig,
    discoverer: MetadataDiscoverer,
    registrar: DynamicClientRegistrar,
    exchanger: TokenExchanger,
    introspector: ToolIntrospector,
    codec: StateTokenCodec,
    api_keys: ApiKeyIssuer,
    connection_repo: Arc<dyn ConnectionRepository>,
    client_repo: Arc<dyn OAuthClientRepository>,
    token_repo: Arc<dyn OAuthTokenRepository>,
    api_key_repo: Arc<dyn ApiKeyRepository>,
}

impl ConnectionService {
    pub fn new(
        config: EngineConfig,
        connection_repo: Arc<dyn ConnectionRepository>,
        client_repo: Arc<dyn OAuthClientRepository>,
        token_repo: Arc<dyn OAuthTokenRepository>,
        tool_repo: Arc<dyn ServerToolRepository>,
        api_key_repo: Arc<dyn ApiKeyRepository>,
    ) -> anyhow::Result<Self> {
        // Discovery/DCR/exchange share one short-timeout client; the
        // tool-listing call gets a longer window of its own.
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        let introspect_client = reqwest::Client::builder()
            .timeout(config.introspect_timeout)
            .build()?;

        let codec = StateTokenCodec::new(&config.state_key)?;
        let api_keys = ApiKeyIssuer::new(
            config.api_key_prefix.clone(),
            config.api_key_length,
            api_key_repo.clone(),
        );
        let introspector = ToolIntrospector::new(
            introspect_client,
            connection_repo.clone(),
            tool_repo,
        );

        Ok(Self {
            discoverer: MetadataDiscoverer::new(http_client.clone()),
            registrar: DynamicClientRegistrar::new(http_client.clone()),
            exchanger: TokenExchanger::new(http_client),
            introspector,
            codec,
            api_keys,
            config,
            connection_repo,
            client_repo,
            token_repo,
            api_key_repo,
        })
    }

    /// Create a connection via dynamic client registration.
    ///
    /// Discovery and DCR run up front; the connection row and its OAuth
    /// client commit as one transaction, so neither exists without the
    /// other. Errors here leave nothing persisted.
    pub async fn create_connection(
        &self,
        organization_id: Uuid,
        origin: &ServerOrigin,
        transport: ToolTransport,
        scope: Option<String>,
    ) -> Result<Connection, ConnectError> {
        let connection = Connection::new(organization_id, origin, transport);

        info!(
            "Creating connection {} to {} for organization {}",
            connection.id, connection.server.url, organization_id
        );

        let metadata = self.discoverer.fetch(&connection.server.url).await?;

        let request = ClientRegistrationRequest::authorization_code(
            self.config.client_name.clone(),
            self.config.redirect_uri(),
            scope,
        );

        let (client, _registration) = self
            .registrar
            .register(&metadata, request, organization_id, connection.id)
            .await?;

        self.connection_repo
            .create_with_client(&connection, &client)
            .await?;

        Ok(connection)
    }

    /// Create a connection with operator-supplied client credentials.
    ///
    /// The fallback when a provider refuses registration: only discovery
    /// runs, registration is skipped, and the supplied client id/secret are
    /// recorded alongside the discovered endpoints.
    pub async fn create_connection_manual(
        &self,
        organization_id: Uuid,
        origin: &ServerOrigin,
        transport: ToolTransport,
        client_id: String,
        client_secret: Option<String>,
        scope: Option<String>,
    ) -> Result<Connection, ConnectError> {
        let connection = Connection::new(organization_id, origin, transport);

        info!(
            "Creating connection {} to {} with manual credentials",
            connection.id, connection.server.url
        );

        let metadata = self.discoverer.fetch(&connection.server.url).await?;

        let client = DynamicClientRegistrar::from_manual_credentials(
            &metadata,
            organization_id,
            connection.id,
            client_id,
            client_secret,
            self.config.redirect_uri(),
            scope,
        );

        self.connection_repo
            .create_with_client(&connection, &client)
            .await?;

        Ok(connection)
    }

    /// Start an authorization attempt and return the browser redirect.
    ///
    /// Also the re-authentication entry point: the existing client is
    /// reused, and a connection that lost its client reports
    /// `CredentialNotFound` so the caller can redo registration.
    pub async fn begin_authorization(
        &self,
        connection_id: Uuid,
        user_id: Uuid,
        scopes: Vec<String>,
        integrated_target: Option<Uuid>,
    ) -> Result<AuthorizationRedirect, ConnectError> {
        let connection = self.require_connection(&connection_id).await?;
        let client = self
            .require_client(&connection.organization_id, &connection_id)
            .await?;

        // Caller-requested scopes win; fall back to what registration granted
        let scopes = if scopes.is_empty() {
            client
                .scope
                .as_deref()
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or_default()
        } else {
            scopes
        };

        let pkce = PkceMaterial::generate();
        let redirect_uri = self.config.redirect_uri();

        let attempt = AuthorizationAttempt::new(
            &pkce,
            connection.id,
            connection.organization_id,
            user_id,
            &redirect_uri,
            scopes.clone(),
            integrated_target,
            self.config.state_ttl,
        );
        let state_expires_at = attempt.expires_at;

        let state_token = self.codec.encode(&attempt)?;

        let authorization_url = build_authorization_url(
            &client,
            &pkce.challenge,
            &state_token,
            &scopes,
            &redirect_uri,
        )?;

        info!(
            "Authorization redirect ready for connection {} (state {})",
            connection.id,
            &pkce.state[..8.min(pkce.state.len())]
        );

        Ok(AuthorizationRedirect {
            authorization_url,
            state_expires_at,
        })
    }

    /// Process the provider's redirect back to us.
    ///
    /// Order of operations follows the flow's guarantees: state validation
    /// aborts with no mutation; tenancy is re-checked against the live
    /// connection; the exchange persists a token only on success; and a
    /// failed introspection after a successful exchange is recorded on the
    /// connection, not thrown - the token is valid and retrying
    /// introspection alone is the remediation.
    pub async fn handle_callback(
        &self,
        callback_url: &str,
        user_id: Uuid,
    ) -> Result<CallbackOutcome, ConnectError> {
        let params = CallbackParams::from_url(callback_url)?;

        // 1. Decode and validate the state token
        let attempt = self.codec.decode(&params.state, &user_id)?;

        info!(
            "Callback received for connection {} (state {})",
            attempt.connection_id,
            &attempt.state[..8.min(attempt.state.len())]
        );

        // 2. Re-resolve the connection and client; verify tenancy
        let connection = self.require_connection(&attempt.connection_id).await?;
        if connection.organization_id != attempt.organization_id {
            warn!(
                "Refusing cross-tenant redemption: connection {} belongs to {}, state says {}",
                connection.id, connection.organization_id, attempt.organization_id
            );
            return Err(ConnectError::OrganizationMismatch);
        }
        let client = self
            .require_client(&attempt.organization_id, &attempt.connection_id)
            .await?;

        // 3. Validate the authorization response
        if let Some(message) = params.error_message() {
            return Err(ConnectError::AuthorizationResponseInvalid(message));
        }
        let code = params.code.as_deref().ok_or_else(|| {
            ConnectError::AuthorizationResponseInvalid("missing authorization code".to_string())
        })?;
        if attempt.redirect_uri != self.config.redirect_uri() {
            return Err(ConnectError::AuthorizationResponseInvalid(
                "redirect URI does not match the authorization request".to_string(),
            ));
        }

        // 4. Exchange the code, presenting the verifier
        let token_response = self
            .exchanger
            .exchange(&client, code, &attempt.redirect_uri, &attempt.code_verifier)
            .await?;

        // 5. Persist the token, replacing any prior one for this
        //    (user, connection) pair
        let now = Utc::now();
        let token = OAuthToken {
            id: Uuid::new_v4(),
            user_id,
            organization_id: connection.organization_id,
            connection_id: connection.id,
            oauth_client_id: client.id,
            access_token: token_response.access_token.clone(),
            refresh_token: token_response.refresh_token.clone(),
            token_type: token_response.token_type.clone(),
            expires_at: token_response.expires_at(),
            scope: token_response.scope.clone(),
            purpose: TokenPurpose::ToolAccess,
            created_at: now,
            updated_at: now,
        };
        self.token_repo.save(&token).await?;

        // 6. Introspect tools; the introspector settles the final status
        match self
            .introspector
            .introspect(&connection, &token.access_token)
            .await
        {
            Ok(report) => {
                let api_key = self.mint_api_key_if_first_run(&connection.id, &user_id).await;
                Ok(CallbackOutcome {
                    connection_id: connection.id,
                    status: ConnectionStatus::Running,
                    tool_count: report.tool_count(),
                    api_key,
                })
            }
            Err(ConnectError::ToolIntrospectionFailed(message)) => {
                // Token stays persisted; the connection carries the error
                Ok(CallbackOutcome {
                    connection_id: connection.id,
                    status: ConnectionStatus::Error { message },
                    tool_count: 0,
                    api_key: None,
                })
            }
            Err(other) => Err(other),
        }
    }

    /// Re-run tool introspection with the persisted token.
    ///
    /// Enough on its own to move an ERROR connection to RUNNING once the
    /// server starts returning tools - no re-authorization involved.
    pub async fn retry_introspection(
        &self,
        connection_id: Uuid,
        user_id: Uuid,
    ) -> Result<IntrospectionReport, ConnectError> {
        let connection = self.require_connection(&connection_id).await?;

        let token = self
            .token_repo
            .get(&user_id, &connection_id, &TokenPurpose::ToolAccess)
            .await?
            .ok_or_else(|| {
                ConnectError::CredentialNotFound(format!(
                    "no token for connection {}; re-authentication required",
                    connection_id
                ))
            })?;

        let report = self
            .introspector
            .introspect(&connection, &token.access_token)
            .await?;

        self.mint_api_key_if_first_run(&connection_id, &user_id).await;

        Ok(report)
    }

    /// Administratively disable a connection.
    ///
    /// Distinct from the ERROR state the authorization path owns; tokens
    /// and the cached catalog stay in place for a later restart.
    pub async fn stop_connection(&self, connection_id: Uuid) -> Result<(), ConnectError> {
        let connection = self.require_connection(&connection_id).await?;
        self.connection_repo
            .set_status(&connection.id, &ConnectionStatus::Stopped)
            .await?;
        info!("Connection {} stopped", connection_id);
        Ok(())
    }

    /// Validate a presented proxy API key.
    pub async fn validate_api_key(&self, presented: &str) -> Result<Option<ApiKey>, ConnectError> {
        self.api_keys.validate(presented).await
    }

    /// The engine configuration this service was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn require_connection(&self, connection_id: &Uuid) -> Result<Connection, ConnectError> {
        self.connection_repo
            .get(connection_id)
            .await?
            .ok_or_else(|| {
                ConnectError::CredentialNotFound(format!("unknown connection {}", connection_id))
            })
    }

    async fn require_client(
        &self,
        organization_id: &Uuid,
        connection_id: &Uuid,
    ) -> Result<OAuthClient, ConnectError> {
        self.client_repo
            .get_for_connection(organization_id, connection_id)
            .await?
            .ok_or_else(|| {
                ConnectError::CredentialNotFound(format!(
                    "no registered client for connection {}",
                    connection_id
                ))
            })
    }

    /// Mint the connection's proxy key the first time it reaches RUNNING.
    /// Best-effort: a failed mint is logged, never fatal to the flow.
    async fn mint_api_key_if_first_run(
        &self,
        connection_id: &Uuid,
        user_id: &Uuid,
    ) -> Option<ApiKey> {
        match self.api_key_repo.list_for_connection(connection_id).await {
            Ok(existing) if existing.is_empty() => {
                match self.api_keys.issue(*connection_id, *user_id, None).await {
                    Ok(key) => {
                        info!("Minted proxy API key for connection {}", connection_id);
                        Some(key)
                    }
                    Err(e) => {
                        warn!(
                            "Failed to mint API key for connection {}: {}",
                            connection_id, e
                        );
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(e) => {
                warn!(
                    "Failed to check existing API keys for connection {}: {}",
                    connection_id, e
                );
                None
            }
        }
    }
}
