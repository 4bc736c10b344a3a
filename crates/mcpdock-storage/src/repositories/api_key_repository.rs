//! SQLite implementation of ApiKeyRepository.
//!
//! Keys are opaque values looked up by exact match; the `key` column is
//! unique. Values are stored verbatim, never re-derived.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use mcpdock_core::{ApiKey, ApiKeyRepository};
use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{parse_datetime, parse_optional_datetime};
use crate::Database;

const API_KEY_COLUMNS: &str =
    "id, connection_id, owner_user_id, key, active, expires_at, last_used_at, created_at";

fn extract_api_key_row(row: &rusqlite::Row) -> rusqlite::Result<ApiKeyRow> {
    Ok(ApiKeyRow {
        id: row.get(0)?,
        connection_id: row.get(1)?,
        owner_user_id: row.get(2)?,
        key: row.get(3)?,
        active: row.get(4)?,
        expires_at: row.get(5)?,
        last_used_at: row.get(6)?,
        created_at: row.get(7)?,
    })
}

struct ApiKeyRow {
    id: String,
    connection_id: String,
    owner_user_id: String,
    key: String,
    active: bool,
    expires_at: Option<String>,
    last_used_at: Option<String>,
    created_at: String,
}

fn build_api_key(row: ApiKeyRow) -> ApiKey {
    ApiKey {
        id: row.id.parse().unwrap_or_else(|_| Uuid::new_v4()),
        connection_id: row.connection_id.parse().unwrap_or_else(|_| Uuid::new_v4()),
        owner_user_id: row.owner_user_id.parse().unwrap_or_else(|_| Uuid::new_v4()),
        key: row.key,
        active: row.active,
        expires_at: parse_optional_datetime(row.expires_at),
        last_used_at: parse_optional_datetime(row.last_used_at),
        created_at: parse_datetime(&row.created_at),
    }
}

pub struct SqliteApiKeyRepository {
    db: Arc<Mutex<Database>>,
}

impl SqliteApiKeyRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ApiKeyRepository for SqliteApiKeyRepository {
    async fn create(&self, key: &ApiKey) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute(
            "INSERT INTO api_keys (id, connection_id, owner_user_id, key, active, expires_at, last_used_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                key.id.to_string(),
                key.connection_id.to_string(),
                key.owner_user_id.to_string(),
                key.key,
                key.active,
                key.expires_at.map(|dt| dt.to_rfc3339()),
                key.last_used_at.map(|dt| dt.to_rfc3339()),
                key.created_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<ApiKey>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM api_keys WHERE key = ?1",
            API_KEY_COLUMNS
        ))?;

        let row = stmt
            .query_row(params![key], extract_api_key_row)
            .optional()?;

        Ok(row.map(build_api_key))
    }

    async fn touch_last_used(&self, id: &Uuid) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute(
            "UPDATE api_keys SET last_used_at = ?1 WHERE id = ?2",
            params![chrono::Utc::now().to_rfc3339(), id.to_string()],
        )?;

        Ok(())
    }

    async fn set_active(&self, id: &Uuid, active: bool) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute(
            "UPDATE api_keys SET active = ?1 WHERE id = ?2",
            params![active, id.to_string()],
        )?;

        Ok(())
    }

    async fn list_for_connection(&self, connection_id: &Uuid) -> Result<Vec<ApiKey>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM api_keys WHERE connection_id = ?1 ORDER BY created_at",
            API_KEY_COLUMNS
        ))?;

        let rows: Vec<_> = stmt
            .query_map(params![connection_id.to_string()], extract_api_key_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows.into_iter().map(build_api_key).collect())
    }
}
