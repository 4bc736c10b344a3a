//! SQLite implementation of OAuthTokenRepository with typed rows and
//! encryption.
//!
//! At most one live token per (user, connection, purpose); save replaces
//! the prior row instead of accumulating duplicates.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use mcpdock_core::{OAuthToken, OAuthTokenRepository, TokenPurpose};
use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{parse_datetime, parse_optional_datetime};
use crate::crypto::FieldEncryptor;
use crate::Database;

const TOKEN_COLUMNS: &str = "id, user_id, organization_id, connection_id, oauth_client_id, access_token, refresh_token, token_type, expires_at, scope, purpose, created_at, updated_at";

// Field contexts binding ciphertexts to their columns
const ACCESS_TOKEN_FIELD: &str = "oauth_tokens.access_token";
const REFRESH_TOKEN_FIELD: &str = "oauth_tokens.refresh_token";

/// Raw row data extracted from SQLite before decryption.
struct RawTokenRow {
    id: String,
    user_id: String,
    organization_id: String,
    connection_id: String,
    oauth_client_id: String,
    access_token: String,          // Encrypted
    refresh_token: Option<String>, // Encrypted
    token_type: String,
    expires_at: Option<String>,
    scope: Option<String>,
    purpose: String,
    created_at: String,
    updated_at: String,
}

fn extract_token_row(row: &rusqlite::Row) -> rusqlite::Result<RawTokenRow> {
    Ok(RawTokenRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        organization_id: row.get(2)?,
        connection_id: row.get(3)?,
        oauth_client_id: row.get(4)?,
        access_token: row.get(5)?,
        refresh_token: row.get(6)?,
        token_type: row.get(7)?,
        expires_at: row.get(8)?,
        scope: row.get(9)?,
        purpose: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// SQLite-backed OAuth token repository with field-level encryption.
///
/// Only the token values are encrypted; expiry/scope/purpose stay plaintext
/// for queryability.
pub struct SqliteOAuthTokenRepository {
    db: Arc<Mutex<Database>>,
    encryptor: Arc<FieldEncryptor>,
}

impl SqliteOAuthTokenRepository {
    pub fn new(db: Arc<Mutex<Database>>, encryptor: Arc<FieldEncryptor>) -> Self {
        Self { db, encryptor }
    }

    fn build_token(&self, row: RawTokenRow) -> Result<OAuthToken> {
        let access_token = self
            .encryptor
            .decrypt(ACCESS_TOKEN_FIELD, &row.access_token)?;
        let refresh_token = row
            .refresh_token
            .map(|t| self.encryptor.decrypt(REFRESH_TOKEN_FIELD, &t))
            .transpose()?;
        let purpose = TokenPurpose::parse(&row.purpose)
            .ok_or_else(|| anyhow::anyhow!("Unknown token purpose: {}", row.purpose))?;

        Ok(OAuthToken {
            id: row.id.parse().unwrap_or_else(|_| Uuid::new_v4()),
            user_id: row.user_id.parse().unwrap_or_else(|_| Uuid::new_v4()),
            organization_id: row.organization_id.parse().unwrap_or_else(|_| Uuid::new_v4()),
            connection_id: row.connection_id.parse().unwrap_or_else(|_| Uuid::new_v4()),
            oauth_client_id: row.oauth_client_id.parse().unwrap_or_else(|_| Uuid::new_v4()),
            access_token,
            refresh_token,
            token_type: row.token_type,
            expires_at: parse_optional_datetime(row.expires_at),
            scope: row.scope,
            purpose,
            created_at: parse_datetime(&row.created_at),
            updated_at: parse_datetime(&row.updated_at),
        })
    }
}

#[async_trait]
impl OAuthTokenRepository for SqliteOAuthTokenRepository {
    async fn get(
        &self,
        user_id: &Uuid,
        connection_id: &Uuid,
        purpose: &TokenPurpose,
    ) -> Result<Option<OAuthToken>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM oauth_tokens WHERE user_id = ?1 AND connection_id = ?2 AND purpose = ?3",
            TOKEN_COLUMNS
        ))?;

        let row = stmt
            .query_row(
                params![
                    user_id.to_string(),
                    connection_id.to_string(),
                    purpose.as_str()
                ],
                extract_token_row,
            )
            .optional()?;

        match row {
            Some(raw) => Ok(Some(self.build_token(raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, token: &OAuthToken) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let access_token = self
            .encryptor
            .encrypt(ACCESS_TOKEN_FIELD, &token.access_token)?;
        let refresh_token = token
            .refresh_token
            .as_deref()
            .map(|t| self.encryptor.encrypt(REFRESH_TOKEN_FIELD, t))
            .transpose()?;

        conn.execute(
            "INSERT INTO oauth_tokens (
                id, user_id, organization_id, connection_id, oauth_client_id,
                access_token, refresh_token, token_type, expires_at, scope, purpose,
                created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(user_id, connection_id, purpose) DO UPDATE SET
                id = excluded.id,
                organization_id = excluded.organization_id,
                oauth_client_id = excluded.oauth_client_id,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                token_type = excluded.token_type,
                expires_at = excluded.expires_at,
                scope = excluded.scope,
                updated_at = excluded.updated_at",
            params![
                token.id.to_string(),
                token.user_id.to_string(),
                token.organization_id.to_string(),
                token.connection_id.to_string(),
                token.oauth_client_id.to_string(),
                access_token,
                refresh_token,
                token.token_type,
                token.expires_at.map(|dt| dt.to_rfc3339()),
                token.scope,
                token.purpose.as_str(),
                token.created_at.to_rfc3339(),
                token.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    async fn delete_for_connection(&self, connection_id: &Uuid) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute(
            "DELETE FROM oauth_tokens WHERE connection_id = ?1",
            params![connection_id.to_string()],
        )?;

        Ok(())
    }

    async fn list_for_user(&self, user_id: &Uuid) -> Result<Vec<OAuthToken>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM oauth_tokens WHERE user_id = ?1 ORDER BY connection_id",
            TOKEN_COLUMNS
        ))?;

        let rows: Vec<_> = stmt
            .query_map(params![user_id.to_string()], extract_token_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(|r| self.build_token(r)).collect()
    }
}
