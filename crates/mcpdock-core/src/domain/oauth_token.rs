//! OAuthToken entity - tokens obtained from a remote provider.
//!
//! One live row per (user, connection, purpose); re-authentication replaces
//! the row instead of accumulating duplicates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a token was minted for.
///
/// Today only backend tool access exists; the tag keeps future purposes
/// from colliding with it in the uniqueness rule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    ToolAccess,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolAccess => "tool_access",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tool_access" => Some(Self::ToolAccess),
            _ => None,
        }
    }
}

/// Access grant for one (user, connection) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    pub id: Uuid,

    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub connection_id: Uuid,

    /// The OAuthClient this token was issued through.
    pub oauth_client_id: Uuid,

    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Usually "Bearer".
    pub token_type: String,

    /// None means the provider issued a non-expiring token.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub scope: Option<String>,

    pub purpose: TokenPurpose,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OAuthToken {
    /// Check if the token is past its expiry. Tokens without an expiry never
    /// expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Value for the `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}
