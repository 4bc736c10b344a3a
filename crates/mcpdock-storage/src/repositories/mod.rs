//! SQLite repository implementations.

mod api_key_repository;
mod connection_repository;
mod oauth_client_repository;
mod oauth_token_repository;
mod server_tool_repository;

pub use api_key_repository::SqliteApiKeyRepository;
pub use connection_repository::SqliteConnectionRepository;
pub use oauth_client_repository::SqliteOAuthClientRepository;
pub use oauth_token_repository::SqliteOAuthTokenRepository;
pub use server_tool_repository::SqliteServerToolRepository;

use chrono::{DateTime, Utc};

/// Parse a stored datetime string, tolerating both RFC 3339 and SQLite's
/// `datetime('now')` format.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return dt.and_utc();
    }
    Utc::now()
}

/// Parse an optional stored datetime string.
pub(crate) fn parse_optional_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.map(|dt| parse_datetime(&dt))
}
