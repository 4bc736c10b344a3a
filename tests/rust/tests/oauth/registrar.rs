//! Dynamic client registration tests: success, failure modes, and the
//! atomicity of connection + client creation.

use mcpdock_core::{
    ConnectionRepository, ConnectionStatus, OAuthClientRepository, ServerOrigin, ToolTransport,
};
use mcpdock_gateway::ConnectError;
use serde_json::json;
use tests::{provider, test_config, TestHarness};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn custom_origin(url: &str) -> ServerOrigin {
    ServerOrigin::Custom {
        url: url.to_string(),
        name: "Example Tools".to_string(),
    }
}

#[tokio::test]
async fn test_create_connection_registers_and_persists_atomically() {
    let server = MockServer::start().await;
    provider::mount_discovery(&server, true).await;
    provider::mount_registration(&server, "dyn_client_1").await;

    let harness = TestHarness::new(test_config("https://dock.test"));
    let organization_id = harness.create_organization().await;

    let connection = harness
        .service
        .create_connection(
            organization_id,
            &custom_origin(&server.uri()),
            ToolTransport::Http,
            Some("mcp".to_string()),
        )
        .await
        .unwrap();

    assert_eq!(connection.status, ConnectionStatus::Pending);

    // Both rows exist
    let stored = harness
        .connection_repo
        .get(&connection.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.server.url, server.uri());

    let client = harness
        .client_repo
        .get_for_connection(&organization_id, &connection.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(client.client_id, "dyn_client_1");
    assert_eq!(client.client_secret.as_deref(), Some("registered_secret"));
    assert_eq!(client.token_endpoint_auth_method, "client_secret_post");
    assert_eq!(
        client.registration_access_token.as_deref(),
        Some("reg_mgmt_token")
    );
    assert_eq!(client.token_endpoint, format!("{}/token", server.uri()));
}

#[tokio::test]
async fn test_registration_sends_rfc7591_body() {
    let server = MockServer::start().await;
    provider::mount_discovery(&server, true).await;

    Mock::given(method("POST"))
        .and(path("/register"))
        .and(body_partial_json(json!({
            "grant_types": ["authorization_code", "refresh_token"],
            "response_types": ["code"],
            "redirect_uris": ["https://dock.test/oauth/callback"]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "client_id": "dyn_client_2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let harness = TestHarness::new(test_config("https://dock.test"));
    let organization_id = harness.create_organization().await;

    harness
        .service
        .create_connection(
            organization_id,
            &custom_origin(&server.uri()),
            ToolTransport::Http,
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_public_client_defaults_to_no_auth_method() {
    let server = MockServer::start().await;
    provider::mount_discovery(&server, true).await;

    // Provider issues no secret and no auth method
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "client_id": "public_client"
        })))
        .mount(&server)
        .await;

    let harness = TestHarness::new(test_config("https://dock.test"));
    let organization_id = harness.create_organization().await;

    let connection = harness
        .service
        .create_connection(
            organization_id,
            &custom_origin(&server.uri()),
            ToolTransport::Http,
            None,
        )
        .await
        .unwrap();

    let client = harness
        .client_repo
        .get_for_connection(&organization_id, &connection.id)
        .await
        .unwrap()
        .unwrap();
    assert!(client.is_public());
    assert_eq!(client.token_endpoint_auth_method, "none");
}

#[tokio::test]
async fn test_rejected_registration_is_dcr_failed_with_nothing_persisted() {
    let server = MockServer::start().await;
    provider::mount_discovery(&server, true).await;

    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": "invalid_client_metadata"
        })))
        .mount(&server)
        .await;

    let harness = TestHarness::new(test_config("https://dock.test"));
    let organization_id = harness.create_organization().await;

    let result = harness
        .service
        .create_connection(
            organization_id,
            &custom_origin(&server.uri()),
            ToolTransport::Http,
            None,
        )
        .await;

    assert!(matches!(result, Err(ConnectError::DcrFailed(_))));

    // Request-level failure: no partial persistence
    let connections = harness
        .connection_repo
        .list_for_organization(&organization_id)
        .await
        .unwrap();
    assert!(connections.is_empty());
}

#[tokio::test]
async fn test_absent_registration_endpoint_is_dcr_failed_not_metadata() {
    let server = MockServer::start().await;
    provider::mount_discovery(&server, false).await;

    let harness = TestHarness::new(test_config("https://dock.test"));
    let organization_id = harness.create_organization().await;

    let result = harness
        .service
        .create_connection(
            organization_id,
            &custom_origin(&server.uri()),
            ToolTransport::Http,
            None,
        )
        .await;

    // Distinct from MetadataUnavailable so the caller can offer the
    // manual-credential fallback
    assert!(matches!(result, Err(ConnectError::DcrFailed(_))));
}

#[tokio::test]
async fn test_manual_credential_fallback_skips_registration() {
    let server = MockServer::start().await;
    provider::mount_discovery(&server, false).await;

    let harness = TestHarness::new(test_config("https://dock.test"));
    let organization_id = harness.create_organization().await;

    let connection = harness
        .service
        .create_connection_manual(
            organization_id,
            &custom_origin(&server.uri()),
            ToolTransport::Sse,
            "operator_client".to_string(),
            Some("operator_secret".to_string()),
            Some("mcp".to_string()),
        )
        .await
        .unwrap();

    let client = harness
        .client_repo
        .get_for_connection(&organization_id, &connection.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(client.client_id, "operator_client");
    assert_eq!(client.token_endpoint_auth_method, "client_secret_post");
    // Discovery still ran and recorded the endpoint set
    assert_eq!(client.token_endpoint, format!("{}/token", server.uri()));
}

#[tokio::test]
async fn test_unreachable_provider_is_metadata_unavailable() {
    let harness = TestHarness::new(test_config("https://dock.test"));
    let organization_id = harness.create_organization().await;

    // Nothing is listening on this port
    let result = harness
        .service
        .create_connection(
            organization_id,
            &custom_origin("http://127.0.0.1:1"),
            ToolTransport::Http,
            None,
        )
        .await;

    assert!(matches!(result, Err(ConnectError::MetadataUnavailable(_))));
}
