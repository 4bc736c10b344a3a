//! SQLite implementation of OAuthClientRepository.
//!
//! Stores McpDock's OAuth client registrations WITH remote authorization
//! servers. The (organization_id, connection_id) pair is unique, so saving
//! replaces the authoritative client for that pair.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use mcpdock_core::{OAuthClient, OAuthClientRepository};
use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::parse_datetime;
use crate::crypto::FieldEncryptor;
use crate::Database;

pub(crate) const CLIENT_COLUMNS: &str = "id, organization_id, connection_id, issuer, authorization_endpoint, token_endpoint, registration_endpoint, client_id, client_secret, registration_access_token, registration_client_uri, token_endpoint_auth_method, grant_types, response_types, redirect_uris, scope, created_at, updated_at";

// Field contexts binding ciphertexts to their columns
const CLIENT_SECRET_FIELD: &str = "oauth_clients.client_secret";
const REGISTRATION_TOKEN_FIELD: &str = "oauth_clients.registration_access_token";

/// Raw row data extracted from SQLite before decryption.
pub(crate) struct RawClientRow {
    id: String,
    organization_id: String,
    connection_id: String,
    issuer: String,
    authorization_endpoint: String,
    token_endpoint: String,
    registration_endpoint: Option<String>,
    client_id: String,
    client_secret: Option<String>, // Encrypted
    registration_access_token: Option<String>, // Encrypted
    registration_client_uri: Option<String>,
    token_endpoint_auth_method: String,
    grant_types: String,
    response_types: String,
    redirect_uris: String,
    scope: Option<String>,
    created_at: String,
    updated_at: String,
}

pub(crate) fn extract_client_row(row: &rusqlite::Row) -> rusqlite::Result<RawClientRow> {
    Ok(RawClientRow {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        connection_id: row.get(2)?,
        issuer: row.get(3)?,
        authorization_endpoint: row.get(4)?,
        token_endpoint: row.get(5)?,
        registration_endpoint: row.get(6)?,
        client_id: row.get(7)?,
        client_secret: row.get(8)?,
        registration_access_token: row.get(9)?,
        registration_client_uri: row.get(10)?,
        token_endpoint_auth_method: row.get(11)?,
        grant_types: row.get(12)?,
        response_types: row.get(13)?,
        redirect_uris: row.get(14)?,
        scope: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

pub(crate) fn build_client(encryptor: &FieldEncryptor, row: RawClientRow) -> Result<OAuthClient> {
    let client_secret = row
        .client_secret
        .map(|s| encryptor.decrypt(CLIENT_SECRET_FIELD, &s))
        .transpose()?;
    let registration_access_token = row
        .registration_access_token
        .map(|s| encryptor.decrypt(REGISTRATION_TOKEN_FIELD, &s))
        .transpose()?;

    Ok(OAuthClient {
        id: row.id.parse().unwrap_or_else(|_| Uuid::new_v4()),
        organization_id: row.organization_id.parse().unwrap_or_else(|_| Uuid::new_v4()),
        connection_id: row.connection_id.parse().unwrap_or_else(|_| Uuid::new_v4()),
        issuer: row.issuer,
        authorization_endpoint: row.authorization_endpoint,
        token_endpoint: row.token_endpoint,
        registration_endpoint: row.registration_endpoint,
        client_id: row.client_id,
        client_secret,
        registration_access_token,
        registration_client_uri: row.registration_client_uri,
        token_endpoint_auth_method: row.token_endpoint_auth_method,
        grant_types: serde_json::from_str(&row.grant_types).unwrap_or_default(),
        response_types: serde_json::from_str(&row.response_types).unwrap_or_default(),
        redirect_uris: serde_json::from_str(&row.redirect_uris).unwrap_or_default(),
        scope: row.scope,
        created_at: parse_datetime(&row.created_at),
        updated_at: parse_datetime(&row.updated_at),
    })
}

/// Insert or replace the client for its (organization, connection) pair.
///
/// Shared with the connection repository so a connection and its client can
/// commit in one transaction.
pub(crate) fn upsert_client_row(
    conn: &rusqlite::Connection,
    encryptor: &FieldEncryptor,
    client: &OAuthClient,
) -> Result<()> {
    let client_secret = client
        .client_secret
        .as_deref()
        .map(|s| encryptor.encrypt(CLIENT_SECRET_FIELD, s))
        .transpose()?;
    let registration_access_token = client
        .registration_access_token
        .as_deref()
        .map(|s| encryptor.encrypt(REGISTRATION_TOKEN_FIELD, s))
        .transpose()?;

    conn.execute(
        "INSERT INTO oauth_clients (
            id, organization_id, connection_id, issuer, authorization_endpoint, token_endpoint,
            registration_endpoint, client_id, client_secret, registration_access_token,
            registration_client_uri, token_endpoint_auth_method, grant_types, response_types,
            redirect_uris, scope, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
         ON CONFLICT(organization_id, connection_id) DO UPDATE SET
            id = excluded.id,
            issuer = excluded.issuer,
            authorization_endpoint = excluded.authorization_endpoint,
            token_endpoint = excluded.token_endpoint,
            registration_endpoint = excluded.registration_endpoint,
            client_id = excluded.client_id,
            client_secret = excluded.client_secret,
            registration_access_token = excluded.registration_access_token,
            registration_client_uri = excluded.registration_client_uri,
            token_endpoint_auth_method = excluded.token_endpoint_auth_method,
            grant_types = excluded.grant_types,
            response_types = excluded.response_types,
            redirect_uris = excluded.redirect_uris,
            scope = excluded.scope,
            updated_at = excluded.updated_at",
        params![
            client.id.to_string(),
            client.organization_id.to_string(),
            client.connection_id.to_string(),
            client.issuer,
            client.authorization_endpoint,
            client.token_endpoint,
            client.registration_endpoint,
            client.client_id,
            client_secret,
            registration_access_token,
            client.registration_client_uri,
            client.token_endpoint_auth_method,
            serde_json::to_string(&client.grant_types)?,
            serde_json::to_string(&client.response_types)?,
            serde_json::to_string(&client.redirect_uris)?,
            client.scope,
            client.created_at.to_rfc3339(),
            client.updated_at.to_rfc3339(),
        ],
    )?;

    Ok(())
}

/// SQLite-backed OAuth client repository with field-level encryption.
///
/// Only the client secret and registration access token are encrypted;
/// endpoint metadata stays plaintext for queryability.
pub struct SqliteOAuthClientRepository {
    db: Arc<Mutex<Database>>,
    encryptor: Arc<FieldEncryptor>,
}

impl SqliteOAuthClientRepository {
    pub fn new(db: Arc<Mutex<Database>>, encryptor: Arc<FieldEncryptor>) -> Self {
        Self { db, encryptor }
    }
}

#[async_trait]
impl OAuthClientRepository for SqliteOAuthClientRepository {
    async fn get(&self, id: &Uuid) -> Result<Option<OAuthClient>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM oauth_clients WHERE id = ?1",
            CLIENT_COLUMNS
        ))?;

        let row = stmt
            .query_row(params![id.to_string()], extract_client_row)
            .optional()?;

        match row {
            Some(raw) => Ok(Some(build_client(&self.encryptor, raw)?)),
            None => Ok(None),
        }
    }

    async fn get_for_connection(
        &self,
        organization_id: &Uuid,
        connection_id: &Uuid,
    ) -> Result<Option<OAuthClient>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM oauth_clients WHERE organization_id = ?1 AND connection_id = ?2",
            CLIENT_COLUMNS
        ))?;

        let row = stmt
            .query_row(
                params![organization_id.to_string(), connection_id.to_string()],
                extract_client_row,
            )
            .optional()?;

        match row {
            Some(raw) => Ok(Some(build_client(&self.encryptor, raw)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, client: &OAuthClient) -> Result<()> {
        let db = self.db.lock().await;
        upsert_client_row(db.connection(), &self.encryptor, client)
    }

    async fn delete(&self, organization_id: &Uuid, connection_id: &Uuid) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute(
            "DELETE FROM oauth_clients WHERE organization_id = ?1 AND connection_id = ?2",
            params![organization_id.to_string(), connection_id.to_string()],
        )?;

        Ok(())
    }
}
