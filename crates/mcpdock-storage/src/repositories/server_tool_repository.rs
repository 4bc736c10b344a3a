//! SQLite implementation of ServerToolRepository.
//!
//! The catalog for a connection is replaced wholesale on every successful
//! introspection; delete + insert run in one transaction.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use mcpdock_core::{ServerTool, ServerToolRepository};
use rusqlite::params;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::parse_datetime;
use crate::Database;

pub struct SqliteServerToolRepository {
    db: Arc<Mutex<Database>>,
}

impl SqliteServerToolRepository {
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ServerToolRepository for SqliteServerToolRepository {
    async fn list_for_connection(&self, connection_id: &Uuid) -> Result<Vec<ServerTool>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let mut stmt = conn.prepare(
            "SELECT id, connection_id, name, description, input_schema, discovered_at
             FROM server_tools
             WHERE connection_id = ?1
             ORDER BY name",
        )?;

        let rows = stmt.query_map(params![connection_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut tools = Vec::new();
        for row in rows {
            let (id, connection_id, name, description, input_schema, discovered_at) = row?;

            tools.push(ServerTool {
                id: id.parse().unwrap_or_else(|_| Uuid::new_v4()),
                connection_id: connection_id.parse().unwrap_or_else(|_| Uuid::new_v4()),
                name,
                description,
                input_schema: input_schema.and_then(|s| serde_json::from_str(&s).ok()),
                discovered_at: parse_datetime(&discovered_at),
            });
        }

        Ok(tools)
    }

    async fn replace_for_connection(
        &self,
        connection_id: &Uuid,
        tools: &[ServerTool],
    ) -> Result<()> {
        let db = self.db.lock().await;

        db.transaction(|conn| {
            conn.execute(
                "DELETE FROM server_tools WHERE connection_id = ?1",
                params![connection_id.to_string()],
            )?;

            for tool in tools {
                let input_schema = tool
                    .input_schema
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;

                conn.execute(
                    "INSERT INTO server_tools (id, connection_id, name, description, input_schema, discovered_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        tool.id.to_string(),
                        connection_id.to_string(),
                        tool.name,
                        tool.description,
                        input_schema,
                        tool.discovered_at.to_rfc3339(),
                    ],
                )?;
            }

            Ok(())
        })
    }

    async fn delete_for_connection(&self, connection_id: &Uuid) -> Result<()> {
        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute(
            "DELETE FROM server_tools WHERE connection_id = ?1",
            params![connection_id.to_string()],
        )?;

        Ok(())
    }
}
