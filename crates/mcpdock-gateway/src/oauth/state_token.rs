//! Sealed state tokens for the authorization redirect.
//!
//! The entire in-flight flow context (PKCE material, target identifiers,
//! requester, scopes, expiry) rides through the remote provider and back as
//! the OAuth `state` parameter. AES-256-GCM seals the payload, so the token
//! is opaque to the browser carrying it and any altered byte fails the
//! integrity check on return. Nothing is held in server memory across the
//! redirect gap.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::PkceMaterial;
use crate::error::ConnectError;

/// Size of the AES-GCM nonce (12 bytes).
const NONCE_SIZE: usize = 12;

/// The in-flight authorization context. Exists only inside the sealed
/// token - never persisted to durable storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorizationAttempt {
    /// CSRF state value
    pub state: String,
    /// PKCE code verifier (presented at token exchange)
    pub code_verifier: String,
    /// PKCE code challenge (sent at the authorization step)
    pub code_challenge: String,
    /// Nonce
    pub nonce: String,

    /// Target connection
    pub connection_id: Uuid,
    /// Owning organization; re-validated against the connection on return
    pub organization_id: Uuid,
    /// The user who started the flow; must match the callback's user
    pub user_id: Uuid,

    /// Redirect URI sent on the authorization request
    pub redirect_uri: String,
    /// Requested scopes
    pub scopes: Vec<String>,

    /// Set when the result will be folded into a composite server rather
    /// than a standalone connection.
    #[serde(default)]
    pub integrated_target: Option<Uuid>,

    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthorizationAttempt {
    /// Build an attempt from fresh PKCE material, stamping issue and expiry
    /// times now.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pkce: &PkceMaterial,
        connection_id: Uuid,
        organization_id: Uuid,
        user_id: Uuid,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
        integrated_target: Option<Uuid>,
        ttl: Duration,
    ) -> Self {
        let issued_at = Utc::now();
        let expires_at = issued_at
            + ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::minutes(10));

        Self {
            state: pkce.state.clone(),
            code_verifier: pkce.verifier.clone(),
            code_challenge: pkce.challenge.clone(),
            nonce: pkce.nonce.clone(),
            connection_id,
            organization_id,
            user_id,
            redirect_uri: redirect_uri.into(),
            scopes,
            integrated_target,
            issued_at,
            expires_at,
        }
    }
}

/// Seals and opens [`AuthorizationAttempt`] payloads.
///
/// Token format: base64url(nonce || ciphertext || tag). The codec does not
/// enforce single-use; the authorization code itself is one-shot at the
/// provider.
pub struct StateTokenCodec {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl StateTokenCodec {
    /// Create a codec from the deployment's 32-byte sealing key.
    pub fn new(state_key: &[u8; 32]) -> anyhow::Result<Self> {
        let unbound_key = UnboundKey::new(&AES_256_GCM, state_key)
            .map_err(|_| anyhow::anyhow!("Failed to create state token key"))?;

        Ok(Self {
            key: LessSafeKey::new(unbound_key),
            rng: SystemRandom::new(),
        })
    }

    /// Seal an attempt into an opaque token string.
    pub fn encode(&self, attempt: &AuthorizationAttempt) -> Result<String, ConnectError> {
        let payload = serde_json::to_vec(attempt)
            .map_err(|e| ConnectError::Internal(anyhow::anyhow!("serialize attempt: {}", e)))?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| ConnectError::Internal(anyhow::anyhow!("nonce generation failed")))?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = payload;
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| ConnectError::Internal(anyhow::anyhow!("state token seal failed")))?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend_from_slice(&in_out);

        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Open a token presented at the callback and validate it against the
    /// authenticated user making the request.
    ///
    /// Validation order: integrity first, then expiry, then user binding -
    /// so a tampered token never reports anything but `InvalidStateToken`.
    pub fn decode(
        &self,
        token: &str,
        authenticated_user: &Uuid,
    ) -> Result<AuthorizationAttempt, ConnectError> {
        let sealed = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| ConnectError::InvalidStateToken)?;

        if sealed.len() < NONCE_SIZE + AES_256_GCM.tag_len() {
            return Err(ConnectError::InvalidStateToken);
        }

        let (nonce_bytes, encrypted) = sealed.split_at(NONCE_SIZE);
        let nonce_array: [u8; NONCE_SIZE] = nonce_bytes
            .try_into()
            .map_err(|_| ConnectError::InvalidStateToken)?;
        let nonce = Nonce::assume_unique_for_key(nonce_array);

        let mut in_out = Zeroizing::new(encrypted.to_vec());
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| ConnectError::InvalidStateToken)?;

        let attempt: AuthorizationAttempt =
            serde_json::from_slice(plaintext).map_err(|_| ConnectError::InvalidStateToken)?;

        if Utc::now() > attempt.expires_at {
            return Err(ConnectError::StateExpired);
        }

        if attempt.user_id != *authenticated_user {
            return Err(ConnectError::UserMismatch);
        }

        Ok(attempt)
    }
}
