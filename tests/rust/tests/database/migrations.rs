//! Migration behavior across database reopens.

use mcpdock_storage::Database;
use tempfile::TempDir;

#[test]
fn test_schema_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("mcpdock.db");

    let db = Database::open(&db_path).unwrap();
    db.connection()
        .execute(
            "INSERT INTO organizations (id, name, created_at, updated_at) VALUES ('org_1', 'Acme', datetime('now'), datetime('now'))",
            [],
        )
        .unwrap();
    drop(db);

    // Reopen: migrations must be a no-op and data intact
    let db = Database::open(&db_path).unwrap();
    let name: String = db
        .connection()
        .query_row(
            "SELECT name FROM organizations WHERE id = 'org_1'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(name, "Acme");

    let applied: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(applied, 1);
}

#[test]
fn test_expected_tables_exist() {
    let db = Database::open_in_memory().unwrap();

    for table in [
        "organizations",
        "connections",
        "oauth_clients",
        "oauth_tokens",
        "server_tools",
        "api_keys",
    ] {
        let exists: bool = db
            .connection()
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .unwrap();
        assert!(exists, "table {} should exist", table);
    }
}
