//! Callback route tests: the axum endpoint wired over the service.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use mcpdock_core::{ConnectionRepository, ServerOrigin, ToolTransport};
use mcpdock_gateway::{callback_router, AuthenticatedUser};
use tests::{provider, test_config, TestHarness};
use tower::ServiceExt;
use url::Url;
use uuid::Uuid;
use wiremock::MockServer;

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn state_of(authorization_url: &str) -> String {
    Url::parse(authorization_url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

#[tokio::test]
async fn test_callback_route_completes_authorization() {
    let server = MockServer::start().await;
    provider::mount_discovery(&server, true).await;
    provider::mount_registration(&server, "route_client").await;
    provider::mount_token(&server, "route_token").await;
    provider::mount_tools_http(&server, provider::sample_tools()).await;

    let harness = TestHarness::new(test_config("https://dock.test"));
    let organization_id = harness.create_organization().await;
    let user_id = Uuid::new_v4();

    let connection = harness
        .service
        .create_connection(
            organization_id,
            &ServerOrigin::Custom {
                url: server.uri(),
                name: "Example".to_string(),
            },
            ToolTransport::Http,
            None,
        )
        .await
        .unwrap();

    let redirect = harness
        .service
        .begin_authorization(connection.id, user_id, vec![], None)
        .await
        .unwrap();
    let state = state_of(&redirect.authorization_url);

    // The session middleware of the host app supplies the user identity
    let app = callback_router(harness.service.clone())
        .layer(axum::Extension(AuthenticatedUser(user_id)));

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/oauth/callback?code=auth_code_1&state={}", state))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("Authorization Complete"));

    let stored = harness
        .connection_repo
        .get(&connection.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.status.is_running());
}

#[tokio::test]
async fn test_callback_route_without_session_is_unauthorized() {
    let harness = TestHarness::new(test_config("https://dock.test"));
    let app = callback_router(harness.service.clone());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/oauth/callback?code=x&state=y")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_callback_route_reports_reauthentication_hint() {
    let harness = TestHarness::new(test_config("https://dock.test"));
    let user_id = Uuid::new_v4();

    let app = callback_router(harness.service.clone())
        .layer(axum::Extension(AuthenticatedUser(user_id)));

    // Garbage state: terminal for the attempt
    let response = app
        .oneshot(
            Request::builder()
                .uri("/oauth/callback?code=x&state=not-a-real-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_string(response).await;
    assert!(body.contains("authorization again"));
}
