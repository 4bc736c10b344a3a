//! Error taxonomy for the connection engine.
//!
//! The variants distinguish "the user must re-authenticate" from "the target
//! server (or its authorization server) has a problem", because the
//! remediation differs: retry the auth flow vs. contact the server's
//! operator.

use thiserror::Error;

/// Errors surfaced by the OAuth connection engine.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The well-known discovery document is missing or lacks the mandatory
    /// endpoints. Not retryable without operator intervention.
    #[error("authorization server metadata unavailable: {0}")]
    MetadataUnavailable(String),

    /// The registration endpoint rejected us or is absent. Distinct from
    /// `MetadataUnavailable` so callers can offer the manual-credential
    /// fallback.
    #[error("dynamic client registration failed: {0}")]
    DcrFailed(String),

    /// The state token is malformed or its integrity check failed.
    #[error("invalid state token")]
    InvalidStateToken,

    /// The state token is past its embedded expiry.
    #[error("state token expired")]
    StateExpired,

    /// The state token was issued for a different user than the one
    /// presenting it at the callback.
    #[error("state token was issued to a different user")]
    UserMismatch,

    /// The connection referenced by the state token belongs to a different
    /// organization than the token says. Blocks cross-tenant redemption.
    #[error("connection belongs to a different organization")]
    OrganizationMismatch,

    /// The provider's authorization response failed validation (error
    /// response, missing code, or redirect mismatch).
    #[error("authorization response invalid: {0}")]
    AuthorizationResponseInvalid(String),

    /// The token endpoint rejected the code exchange.
    #[error("token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Tool introspection failed, including the zero-tools case.
    #[error("tool introspection failed: {0}")]
    ToolIntrospectionFailed(String),

    /// Re-authentication or introspection was requested for a connection
    /// with no stored client or token.
    #[error("no stored credential: {0}")]
    CredentialNotFound(String),

    /// Storage or transport plumbing failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ConnectError {
    /// Whether the remediation is "run the authorization flow again".
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            Self::InvalidStateToken
                | Self::StateExpired
                | Self::UserMismatch
                | Self::AuthorizationResponseInvalid(_)
                | Self::TokenExchangeFailed(_)
                | Self::CredentialNotFound(_)
        )
    }

    /// Whether the remediation is "contact the target server's operator".
    pub fn is_target_server_problem(&self) -> bool {
        matches!(
            self,
            Self::MetadataUnavailable(_) | Self::DcrFailed(_) | Self::ToolIntrospectionFailed(_)
        )
    }
}
