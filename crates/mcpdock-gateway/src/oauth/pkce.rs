//! PKCE (Proof Key for Code Exchange)
//!
//! Implements RFC 7636 for the authorization code flow, plus the per-attempt
//! CSRF state and nonce values.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Per-attempt PKCE material: verifier/challenge pair plus the CSRF state
/// and nonce generated alongside them.
#[derive(Debug, Clone)]
pub struct PkceMaterial {
    /// The code verifier (kept secret, sent in token exchange)
    pub verifier: String,
    /// The code challenge (sent in authorization request)
    pub challenge: String,
    /// Challenge method (always S256 - "plain" is not supported)
    pub method: String,
    /// CSRF state value
    pub state: String,
    /// Nonce
    pub nonce: String,
}

impl PkceMaterial {
    /// Generate fresh material from the OS's cryptographically secure RNG.
    pub fn generate() -> Self {
        let verifier = random_urlsafe(32);

        // Challenge: SHA256(verifier) then base64-URL encode
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let hash = hasher.finalize();
        let challenge = URL_SAFE_NO_PAD.encode(hash);

        Self {
            verifier,
            challenge,
            method: "S256".to_string(),
            state: random_urlsafe(16),
            nonce: random_urlsafe(16),
        }
    }

    /// Verify that a verifier matches a challenge (S256).
    pub fn verify(verifier: &str, challenge: &str) -> bool {
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let computed = URL_SAFE_NO_PAD.encode(hasher.finalize());
        computed == challenge
    }
}

/// Base64-URL-encoded random bytes.
fn random_urlsafe(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(&bytes)
}
