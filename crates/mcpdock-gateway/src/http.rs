//! Callback HTTP route.
//!
//! The one piece of HTTP surface the engine owns: the redirect URI the
//! provider sends the user's browser back to. The route holds no flow state
//! of its own - everything needed to resume lives in the `state` query
//! parameter.
//!
//! The authenticated user comes from the host application's session layer,
//! injected as a request extension; it is never taken from the provider.

use std::sync::Arc;

use axum::{
    extract::{Extension, RawQuery, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::ConnectionService;
use mcpdock_core::ConnectionStatus;

/// The caller's identity, inserted by the host application's session
/// middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub Uuid);

/// Build the callback router, to be mounted under the deployment's
/// redirect base URL.
pub fn callback_router(service: Arc<ConnectionService>) -> Router {
    Router::new()
        .route("/oauth/callback", get(oauth_callback))
        .with_state(service)
}

async fn oauth_callback(
    State(service): State<Arc<ConnectionService>>,
    user: Option<Extension<AuthenticatedUser>>,
    RawQuery(query): RawQuery,
) -> (StatusCode, Html<String>) {
    let Some(Extension(AuthenticatedUser(user_id))) = user else {
        warn!("Callback received without an authenticated session");
        return (
            StatusCode::UNAUTHORIZED,
            error_page("You must be signed in to complete authorization."),
        );
    };

    let callback_url = format!(
        "{}?{}",
        service.config().redirect_uri(),
        query.unwrap_or_default()
    );

    match service.handle_callback(&callback_url, user_id).await {
        Ok(outcome) => match outcome.status {
            ConnectionStatus::Running => {
                info!(
                    "Connection {} authorized with {} tools",
                    outcome.connection_id, outcome.tool_count
                );
                (StatusCode::OK, success_page(outcome.tool_count))
            }
            ConnectionStatus::Error { message } => (
                StatusCode::OK,
                error_page(&format!(
                    "Authorization succeeded, but the server's tools could not be read: {}. \
                     Retry tool discovery from the connection page.",
                    message
                )),
            ),
            _ => (StatusCode::OK, success_page(outcome.tool_count)),
        },
        Err(e) => {
            warn!("Callback processing failed: {}", e);
            let hint = if e.requires_reauthentication() {
                "Start the authorization again from the connection page."
            } else {
                "The target server appears to have a problem; contact its operator."
            };
            (
                StatusCode::BAD_REQUEST,
                error_page(&format!("{}. {}", e, hint)),
            )
        }
    }
}

fn success_page(tool_count: usize) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Authorization Complete</title>
</head>
<body>
    <h1>Authorization Complete</h1>
    <p>The connection is ready with {} tools. You can close this window.</p>
    <script>setTimeout(function() {{ window.close(); }}, 2000);</script>
</body>
</html>"#,
        tool_count
    ))
}

fn error_page(message: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Authorization Failed</title>
</head>
<body>
    <h1>Authorization Failed</h1>
    <p>{}</p>
</body>
</html>"#,
        html_escape(message)
    ))
}

/// Minimal escaping for text interpolated into the error page.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
