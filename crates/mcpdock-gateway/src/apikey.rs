//! Opaque API key issuance and validation.
//!
//! Keys grant internal proxy access to a RUNNING connection and are
//! unrelated to the OAuth tokens obtained from remote providers. A key is
//! `<prefix><random bytes, base64url>`; the full value leaves the system
//! exactly once, in the issuance response.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use mcpdock_core::{ApiKey, ApiKeyRepository};
use rand::RngCore;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ConnectError;

/// Issues and validates opaque API keys.
///
/// Prefix and byte length are deployment configuration, not per-call
/// parameters.
pub struct ApiKeyIssuer {
    prefix: String,
    length: usize,
    repo: Arc<dyn ApiKeyRepository>,
}

impl ApiKeyIssuer {
    pub fn new(prefix: impl Into<String>, length: usize, repo: Arc<dyn ApiKeyRepository>) -> Self {
        Self {
            prefix: prefix.into(),
            length,
            repo,
        }
    }

    /// Mint and persist a key for a connection.
    ///
    /// The returned entity carries the full value; callers must surface it
    /// to the user in this response and never again.
    pub async fn issue(
        &self,
        connection_id: Uuid,
        owner_user_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ApiKey, ConnectError> {
        let mut key = ApiKey::new(connection_id, owner_user_id, self.generate_value());
        key.expires_at = expires_at;

        self.repo.create(&key).await?;

        debug!(
            "Issued API key {} for connection {}",
            key.id, connection_id
        );

        Ok(key)
    }

    /// Validate a presented key by exact-match lookup.
    ///
    /// Returns the key record when it exists, is active, and is not past
    /// its optional expiry. Validation updates the last-used timestamp as a
    /// side effect, but a failed update never fails the validation.
    pub async fn validate(&self, presented: &str) -> Result<Option<ApiKey>, ConnectError> {
        let Some(key) = self.repo.find_by_key(presented).await? else {
            return Ok(None);
        };

        if !key.is_usable() {
            return Ok(None);
        }

        if let Err(e) = self.repo.touch_last_used(&key.id).await {
            warn!("Failed to update last_used for key {}: {}", key.id, e);
        }

        Ok(Some(key))
    }

    /// Generate a fresh opaque value: fixed prefix + random bytes.
    fn generate_value(&self) -> String {
        let mut bytes = vec![0u8; self.length];
        rand::thread_rng().fill_bytes(&mut bytes);
        format!("{}{}", self.prefix, URL_SAFE_NO_PAD.encode(&bytes))
    }
}
