//! Tool-listing transport and introspection status tests.

use std::sync::Arc;

use mcpdock_core::{
    Connection, ConnectionRepository, ConnectionStatus, ServerOrigin, ServerTool,
    ServerToolRepository, ToolTransport,
};
use mcpdock_gateway::{ConnectError, ToolIntrospector, ToolListingClient};
use serde_json::json;
use tests::mocks::{MockConnectionRepository, MockServerToolRepository};
use tests::provider;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_connection(url: &str, transport: ToolTransport) -> Connection {
    Connection::new(
        Uuid::new_v4(),
        &ServerOrigin::Custom {
            url: url.to_string(),
            name: "Example Tools".to_string(),
        },
        transport,
    )
}

fn introspector(
    connection_repo: Arc<MockConnectionRepository>,
    tool_repo: Arc<MockServerToolRepository>,
) -> ToolIntrospector {
    ToolIntrospector::new(reqwest::Client::new(), connection_repo, tool_repo)
}

// =============================================================================
// Transport clients
// =============================================================================

#[tokio::test]
async fn test_http_listing_sends_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("authorization", "Bearer at_secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": "1",
            "result": { "tools": provider::sample_tools() }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ToolListingClient::new(reqwest::Client::new(), ToolTransport::Http);
    let tools = client.list_tools(&server.uri(), "at_secret").await.unwrap();

    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0].name, "search_docs");
    assert!(tools[0].input_schema.is_some());
}

#[tokio::test]
async fn test_sse_listing_parses_event_frames() {
    let server = MockServer::start().await;
    provider::mount_tools_sse(&server, provider::sample_tools()).await;

    let client = ToolListingClient::new(reqwest::Client::new(), ToolTransport::Sse);
    let tools = client.list_tools(&server.uri(), "at_secret").await.unwrap();

    assert_eq!(tools.len(), 2);
    assert_eq!(tools[1].name, "read_page");
}

#[tokio::test]
async fn test_sse_listing_skips_notification_frames() {
    let server = MockServer::start().await;

    // A progress notification precedes the actual response
    let body = format!(
        "data: {}\n\ndata: {}\n\n",
        json!({"jsonrpc": "2.0", "method": "notifications/progress", "params": {}}),
        json!({"jsonrpc": "2.0", "id": "1", "result": {"tools": [{"name": "ping"}]}}),
    );
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let client = ToolListingClient::new(reqwest::Client::new(), ToolTransport::Sse);
    let tools = client.list_tools(&server.uri(), "at").await.unwrap();

    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "ping");
}

#[tokio::test]
async fn test_unauthorized_listing_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_token"))
        .mount(&server)
        .await;

    let client = ToolListingClient::new(reqwest::Client::new(), ToolTransport::Http);
    let result = client.list_tools(&server.uri(), "expired").await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_rpc_error_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": "1",
            "error": {"code": -32601, "message": "method not found"}
        })))
        .mount(&server)
        .await;

    let client = ToolListingClient::new(reqwest::Client::new(), ToolTransport::Http);
    let result = client.list_tools(&server.uri(), "at").await;

    let err = result.unwrap_err().to_string();
    assert!(err.contains("method not found"));
}

// =============================================================================
// Introspector status transitions
// =============================================================================

#[tokio::test]
async fn test_zero_tools_flips_connection_to_error() {
    let server = MockServer::start().await;
    provider::mount_tools_http(&server, json!([])).await;

    let connection = test_connection(&server.uri(), ToolTransport::Http);
    let connection_repo =
        Arc::new(MockConnectionRepository::new().with_connection(connection.clone()));
    let tool_repo = Arc::new(MockServerToolRepository::new());

    let result = introspector(connection_repo.clone(), tool_repo.clone())
        .introspect(&connection, "at")
        .await;

    assert!(matches!(
        result,
        Err(ConnectError::ToolIntrospectionFailed(_))
    ));

    let stored = connection_repo.get(&connection.id).await.unwrap().unwrap();
    assert!(matches!(stored.status, ConnectionStatus::Error { .. }));

    // No catalog was written
    assert!(tool_repo
        .list_for_connection(&connection.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_successful_introspection_reaches_running() {
    let server = MockServer::start().await;
    provider::mount_tools_http(&server, provider::sample_tools()).await;

    let connection = test_connection(&server.uri(), ToolTransport::Http);
    let connection_repo =
        Arc::new(MockConnectionRepository::new().with_connection(connection.clone()));
    let tool_repo = Arc::new(MockServerToolRepository::new());

    let report = introspector(connection_repo.clone(), tool_repo.clone())
        .introspect(&connection, "at")
        .await
        .unwrap();

    assert_eq!(report.tool_count(), 2);

    let stored = connection_repo.get(&connection.id).await.unwrap().unwrap();
    assert!(stored.status.is_running());

    let catalog = tool_repo.list_for_connection(&connection.id).await.unwrap();
    assert_eq!(catalog.len(), 2);
}

#[tokio::test]
async fn test_reintrospection_replaces_catalog_wholesale() {
    let server = MockServer::start().await;
    provider::mount_tools_http(&server, json!([{"name": "new_tool"}])).await;

    let connection = test_connection(&server.uri(), ToolTransport::Http);
    let connection_repo =
        Arc::new(MockConnectionRepository::new().with_connection(connection.clone()));
    let tool_repo = Arc::new(MockServerToolRepository::new());

    // A stale catalog from an earlier introspection
    let stale = vec![
        ServerTool::new(connection.id, "old_tool_a"),
        ServerTool::new(connection.id, "old_tool_b"),
    ];
    tool_repo
        .replace_for_connection(&connection.id, &stale)
        .await
        .unwrap();

    introspector(connection_repo, tool_repo.clone())
        .introspect(&connection, "at")
        .await
        .unwrap();

    let catalog = tool_repo.list_for_connection(&connection.id).await.unwrap();
    let names: Vec<&str> = catalog.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["new_tool"]);
}

#[tokio::test]
async fn test_unreachable_server_records_error_status() {
    let connection = test_connection("http://127.0.0.1:1", ToolTransport::Http);
    let connection_repo =
        Arc::new(MockConnectionRepository::new().with_connection(connection.clone()));
    let tool_repo = Arc::new(MockServerToolRepository::new());

    let result = introspector(connection_repo.clone(), tool_repo)
        .introspect(&connection, "at")
        .await;

    assert!(matches!(
        result,
        Err(ConnectError::ToolIntrospectionFailed(_))
    ));

    let stored = connection_repo.get(&connection.id).await.unwrap().unwrap();
    assert!(matches!(stored.status, ConnectionStatus::Error { .. }));
}
