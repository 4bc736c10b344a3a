//! Shared test utilities and fixtures for McpDock integration tests.


use std::sync::Arc;

use mcpdock_core::{
    ApiKeyRepository, ConnectionRepository, EngineConfig, OAuthClientRepository,
    OAuthTokenRepository, ServerToolRepository,
};
use mcpdock_gateway::ConnectionService;
use mcpdock_storage::{
    Database, FieldEncryptor, SqliteApiKeyRepository, SqliteConnectionRepository,
    SqliteOAuthClientRepository, SqliteOAuthTokenRepository, SqliteServerToolRepository,
};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Fixed state-token key for tests.
pub const TEST_STATE_KEY: [u8; 32] = [7u8; 32];

/// Initialize test logging once (`RUST_LOG` honored).
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Engine configuration pointed at a test redirect base.
pub fn test_config(redirect_base_url: &str) -> EngineConfig {
    EngineConfig::new(redirect_base_url, TEST_STATE_KEY)
}

/// SQLite-backed repositories over one in-memory database, plus the
/// service wired on top of them.
pub struct TestHarness {
    pub db: Arc<Mutex<Database>>,
    pub connection_repo: Arc<dyn ConnectionRepository>,
    pub client_repo: Arc<dyn OAuthClientRepository>,
    pub token_repo: Arc<dyn OAuthTokenRepository>,
    pub tool_repo: Arc<dyn ServerToolRepository>,
    pub api_key_repo: Arc<dyn ApiKeyRepository>,
    pub service: Arc<ConnectionService>,
}

impl TestHarness {
    /// Build a harness with the given engine configuration.
    pub fn new(config: EngineConfig) -> Self {
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let key = mcpdock_storage::generate_master_key().unwrap();
        let encryptor = Arc::new(FieldEncryptor::new(&key).unwrap());

        let connection_repo: Arc<dyn ConnectionRepository> = Arc::new(
            SqliteConnectionRepository::new(db.clone(), encryptor.clone()),
        );
        let client_repo: Arc<dyn OAuthClientRepository> = Arc::new(
            SqliteOAuthClientRepository::new(db.clone(), encryptor.clone()),
        );
        let token_repo: Arc<dyn OAuthTokenRepository> =
            Arc::new(SqliteOAuthTokenRepository::new(db.clone(), encryptor));
        let tool_repo: Arc<dyn ServerToolRepository> =
            Arc::new(SqliteServerToolRepository::new(db.clone()));
        let api_key_repo: Arc<dyn ApiKeyRepository> =
            Arc::new(SqliteApiKeyRepository::new(db.clone()));

        let service = Arc::new(
            ConnectionService::new(
                config,
                connection_repo.clone(),
                client_repo.clone(),
                token_repo.clone(),
                tool_repo.clone(),
                api_key_repo.clone(),
            )
            .unwrap(),
        );

        Self {
            db,
            connection_repo,
            client_repo,
            token_repo,
            tool_repo,
            api_key_repo,
            service,
        }
    }

    /// Insert an organization row (connections reference it).
    pub async fn create_organization(&self) -> Uuid {
        let organization_id = Uuid::new_v4();
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "INSERT INTO organizations (id, name, created_at, updated_at) VALUES (?, 'Test Org', datetime('now'), datetime('now'))",
                [organization_id.to_string()],
            )
            .unwrap();
        organization_id
    }
}

/// Wiremock helpers for a fake provider (authorization server + tool
/// server on one mock host).
pub mod provider {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Discovery document for a mock server, with or without a
    /// registration endpoint.
    pub fn discovery_document(base: &str, with_registration: bool) -> serde_json::Value {
        let mut doc = json!({
            "issuer": base,
            "authorization_endpoint": format!("{}/authorize", base),
            "token_endpoint": format!("{}/token", base),
            "scopes_supported": ["mcp"],
            "response_types_supported": ["code"],
            "grant_types_supported": ["authorization_code", "refresh_token"],
            "code_challenge_methods_supported": ["S256"]
        });
        if with_registration {
            doc["registration_endpoint"] = json!(format!("{}/register", base));
        }
        doc
    }

    /// Serve OIDC discovery.
    pub async fn mount_discovery(server: &MockServer, with_registration: bool) {
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(discovery_document(&server.uri(), with_registration)),
            )
            .mount(server)
            .await;
    }

    /// Serve a successful RFC 7591 registration.
    pub async fn mount_registration(server: &MockServer, client_id: &str) {
        Mock::given(method("POST"))
            .and(path("/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "client_id": client_id,
                "client_secret": "registered_secret",
                "registration_access_token": "reg_mgmt_token",
                "registration_client_uri": format!("{}/register/{}", server.uri(), client_id),
                "redirect_uris": ["https://dock.test/oauth/callback"],
                "grant_types": ["authorization_code", "refresh_token"],
                "response_types": ["code"],
                "token_endpoint_auth_method": "client_secret_post",
                "scope": "mcp"
            })))
            .mount(server)
            .await;
    }

    /// Serve a successful token exchange.
    pub async fn mount_token(server: &MockServer, access_token: &str) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": access_token,
                "token_type": "Bearer",
                "refresh_token": "refresh_xyz",
                "expires_in": 3600,
                "scope": "mcp"
            })))
            .mount(server)
            .await;
    }

    /// Serve a plain-HTTP `tools/list` response at the server root.
    pub async fn mount_tools_http(server: &MockServer, tools: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": "1",
                "result": { "tools": tools }
            })))
            .mount(server)
            .await;
    }

    /// Serve an SSE-framed `tools/list` response at the server root.
    pub async fn mount_tools_sse(server: &MockServer, tools: serde_json::Value) {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": "1",
            "result": { "tools": tools }
        });
        let body = format!("event: message\ndata: {}\n\n", payload);
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(server)
            .await;
    }

    /// A small two-tool catalog.
    pub fn sample_tools() -> serde_json::Value {
        json!([
            {
                "name": "search_docs",
                "description": "Search the documentation",
                "inputSchema": {"type": "object", "properties": {"query": {"type": "string"}}}
            },
            {
                "name": "read_page",
                "description": "Read a documentation page",
                "inputSchema": {"type": "object", "properties": {"url": {"type": "string"}}}
            }
        ])
    }
}
