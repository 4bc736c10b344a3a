//! SQLite implementation of ConnectionRepository.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use mcpdock_core::{
    Connection as DomainConnection, ConnectionRepository, ConnectionStatus, OAuthClient,
    ResolvedServer, ToolTransport,
};
use rusqlite::{params, OptionalExtension};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::oauth_client_repository::upsert_client_row;
use super::parse_datetime;
use crate::crypto::FieldEncryptor;
use crate::Database;

const CONNECTION_COLUMNS: &str = "id, organization_id, server_url, display_name, template_id, transport, status, status_message, created_at, updated_at";

struct RawConnectionRow {
    id: String,
    organization_id: String,
    server_url: String,
    display_name: String,
    template_id: Option<String>,
    transport: String,
    status: String,
    status_message: Option<String>,
    created_at: String,
    updated_at: String,
}

fn extract_connection_row(row: &rusqlite::Row) -> rusqlite::Result<RawConnectionRow> {
    Ok(RawConnectionRow {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        server_url: row.get(2)?,
        display_name: row.get(3)?,
        template_id: row.get(4)?,
        transport: row.get(5)?,
        status: row.get(6)?,
        status_message: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn build_connection(row: RawConnectionRow) -> Result<DomainConnection> {
    let status = match row.status.as_str() {
        "pending" => ConnectionStatus::Pending,
        "running" => ConnectionStatus::Running,
        "error" => ConnectionStatus::Error {
            message: row.status_message.unwrap_or_default(),
        },
        "stopped" => ConnectionStatus::Stopped,
        other => anyhow::bail!("Unknown connection status: {}", other),
    };

    let transport = ToolTransport::parse(&row.transport)
        .ok_or_else(|| anyhow::anyhow!("Unknown tool transport: {}", row.transport))?;

    Ok(DomainConnection {
        id: row.id.parse().unwrap_or_else(|_| Uuid::new_v4()),
        organization_id: row.organization_id.parse().unwrap_or_else(|_| Uuid::new_v4()),
        server: ResolvedServer {
            url: row.server_url,
            display_name: row.display_name,
            template_id: row.template_id.and_then(|t| t.parse().ok()),
        },
        transport,
        status,
        created_at: parse_datetime(&row.created_at),
        updated_at: parse_datetime(&row.updated_at),
    })
}

fn insert_connection_row(
    conn: &rusqlite::Connection,
    connection: &DomainConnection,
) -> Result<()> {
    let status_message = match &connection.status {
        ConnectionStatus::Error { message } => Some(message.clone()),
        _ => None,
    };

    conn.execute(
        "INSERT INTO connections (
            id, organization_id, server_url, display_name, template_id, transport,
            status, status_message, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            connection.id.to_string(),
            connection.organization_id.to_string(),
            connection.server.url,
            connection.server.display_name,
            connection.server.template_id.map(|t| t.to_string()),
            connection.transport.as_str(),
            connection.status.as_str(),
            status_message,
            connection.created_at.to_rfc3339(),
            connection.updated_at.to_rfc3339(),
        ],
    )?;

    Ok(())
}

/// SQLite-backed connection repository.
///
/// Holds the field encryptor so `create_with_client` can write the
/// connection row and its OAuth client row in a single transaction.
pub struct SqliteConnectionRepository {
    db: Arc<Mutex<Database>>,
    encryptor: Arc<FieldEncryptor>,
}

impl SqliteConnectionRepository {
    pub fn new(db: Arc<Mutex<Database>>, encryptor: Arc<FieldEncryptor>) -> Self {
        Self { db, encryptor }
    }
}

#[async_trait]
impl ConnectionRepository for SqliteConnectionRepository {
    async fn get(&self, id: &Uuid) -> Result<Option<DomainConnection>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM connections WHERE id = ?1",
            CONNECTION_COLUMNS
        ))?;

        let row = stmt
            .query_row(params![id.to_string()], extract_connection_row)
            .optional()?;

        match row {
            Some(raw) => Ok(Some(build_connection(raw)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, connection: &DomainConnection) -> Result<()> {
        let db = self.db.lock().await;
        insert_connection_row(db.connection(), connection)
    }

    async fn create_with_client(
        &self,
        connection: &DomainConnection,
        client: &OAuthClient,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let encryptor = self.encryptor.clone();

        db.transaction(|conn| {
            insert_connection_row(conn, connection)?;
            upsert_client_row(conn, &encryptor, client)?;
            Ok(())
        })
    }

    async fn set_status(&self, id: &Uuid, status: &ConnectionStatus) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let status_message = match status {
            ConnectionStatus::Error { message } => Some(message.clone()),
            _ => None,
        };

        conn.execute(
            "UPDATE connections SET status = ?1, status_message = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                status.as_str(),
                status_message,
                chrono::Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )?;

        Ok(())
    }

    async fn list_for_organization(
        &self,
        organization_id: &Uuid,
    ) -> Result<Vec<DomainConnection>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM connections WHERE organization_id = ?1 ORDER BY created_at",
            CONNECTION_COLUMNS
        ))?;

        let rows: Vec<_> = stmt
            .query_map(params![organization_id.to_string()], extract_connection_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(build_connection).collect()
    }

    async fn delete(&self, id: &Uuid) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute(
            "DELETE FROM connections WHERE id = ?1",
            params![id.to_string()],
        )?;

        Ok(())
    }
}
