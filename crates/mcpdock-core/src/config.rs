//! Engine configuration.
//!
//! Everything the protocol engine needs from its deployment is collected in
//! one struct and passed into components at construction time. Components
//! never read the process environment themselves, so the engine is testable
//! without process-wide environment mutation.

use std::time::Duration;

use anyhow::{Context, Result};

/// Size of the state-token sealing key (32 bytes = AES-256).
pub const STATE_KEY_SIZE: usize = 32;

/// Default state-token lifetime.
pub const DEFAULT_STATE_TTL: Duration = Duration::from_secs(600);

/// Deployment configuration for the OAuth connection engine.
#[derive(Clone)]
pub struct EngineConfig {
    /// Base URL the callback route is mounted under
    /// (e.g., "https://dock.example.com"). The effective redirect URI is
    /// `<redirect_base_url>/oauth/callback`.
    pub redirect_base_url: String,

    /// Client name sent in dynamic registration requests.
    pub client_name: String,

    /// AES-256-GCM key sealing state tokens across the browser redirect.
    pub state_key: [u8; STATE_KEY_SIZE],

    /// How long a state token stays redeemable.
    pub state_ttl: Duration,

    /// Fixed prefix for issued API keys (e.g., "mdk_").
    pub api_key_prefix: String,

    /// Random-byte length of issued API keys.
    pub api_key_length: usize,

    /// Per-call timeout for discovery, registration, and token exchange.
    pub http_timeout: Duration,

    /// Timeout for the tool-listing call (third-party servers can be slow).
    pub introspect_timeout: Duration,
}

impl EngineConfig {
    /// Build a configuration with deployment-specific values and defaults
    /// for everything else.
    pub fn new(
        redirect_base_url: impl Into<String>,
        state_key: [u8; STATE_KEY_SIZE],
    ) -> Self {
        Self {
            redirect_base_url: redirect_base_url.into(),
            client_name: "McpDock".to_string(),
            state_key,
            state_ttl: DEFAULT_STATE_TTL,
            api_key_prefix: "mdk_".to_string(),
            api_key_length: 32,
            http_timeout: Duration::from_secs(8),
            introspect_timeout: Duration::from_secs(10),
        }
    }

    /// Load configuration from the environment (`.env` files honored).
    ///
    /// Required: `MCPDOCK_REDIRECT_BASE_URL`, `MCPDOCK_STATE_KEY`
    /// (hex-encoded 32 bytes). Optional overrides:
    /// `MCPDOCK_CLIENT_NAME`, `MCPDOCK_API_KEY_PREFIX`,
    /// `MCPDOCK_API_KEY_LENGTH`, `MCPDOCK_STATE_TTL_SECS`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let redirect_base_url = std::env::var("MCPDOCK_REDIRECT_BASE_URL")
            .context("MCPDOCK_REDIRECT_BASE_URL is not set")?;

        let key_hex =
            std::env::var("MCPDOCK_STATE_KEY").context("MCPDOCK_STATE_KEY is not set")?;
        let key_bytes = hex::decode(key_hex.trim())
            .context("MCPDOCK_STATE_KEY is not valid hex")?;
        let state_key: [u8; STATE_KEY_SIZE] = key_bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("MCPDOCK_STATE_KEY must be exactly 32 bytes"))?;

        let mut config = Self::new(redirect_base_url, state_key);

        if let Ok(name) = std::env::var("MCPDOCK_CLIENT_NAME") {
            config.client_name = name;
        }
        if let Ok(prefix) = std::env::var("MCPDOCK_API_KEY_PREFIX") {
            config.api_key_prefix = prefix;
        }
        if let Ok(len) = std::env::var("MCPDOCK_API_KEY_LENGTH") {
            config.api_key_length = len
                .parse()
                .context("MCPDOCK_API_KEY_LENGTH is not a number")?;
        }
        if let Ok(secs) = std::env::var("MCPDOCK_STATE_TTL_SECS") {
            let secs: u64 = secs
                .parse()
                .context("MCPDOCK_STATE_TTL_SECS is not a number")?;
            config.state_ttl = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// The redirect URI registered with providers and sent on every
    /// authorization request.
    pub fn redirect_uri(&self) -> String {
        format!(
            "{}/oauth/callback",
            self.redirect_base_url.trim_end_matches('/')
        )
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // state_key intentionally omitted
        f.debug_struct("EngineConfig")
            .field("redirect_base_url", &self.redirect_base_url)
            .field("client_name", &self.client_name)
            .field("state_ttl", &self.state_ttl)
            .field("api_key_prefix", &self.api_key_prefix)
            .field("api_key_length", &self.api_key_length)
            .field("http_timeout", &self.http_timeout)
            .field("introspect_timeout", &self.introspect_timeout)
            .finish()
    }
}
