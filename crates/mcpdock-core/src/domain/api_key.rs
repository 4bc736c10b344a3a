//! ApiKey entity - opaque bearer credential for internal proxy access.
//!
//! Independent of the OAuth tokens obtained from remote providers. The key
//! value is an opaque string: validated by exact-match lookup, never
//! re-derived.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque bearer credential granting proxy access to a running connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,

    pub connection_id: Uuid,
    pub owner_user_id: Uuid,

    /// The full opaque value (`<prefix><random>`). Returned to the caller
    /// exactly once, at issuance.
    pub key: String,

    pub active: bool,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn new(connection_id: Uuid, owner_user_id: Uuid, key: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            connection_id,
            owner_user_id,
            key: key.into(),
            active: true,
            expires_at: None,
            last_used_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// A key is usable when it is active and not past its optional expiry.
    pub fn is_usable(&self) -> bool {
        if !self.active {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => Utc::now() < expires_at,
            None => true,
        }
    }
}
