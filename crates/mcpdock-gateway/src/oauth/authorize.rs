//! Authorization URL construction.

use mcpdock_core::OAuthClient;
use tracing::debug;
use url::Url;

use crate::error::ConnectError;

/// Build the provider's authorization-endpoint URL for one attempt.
///
/// `state_token` is the sealed attempt context; it rides as the OAuth
/// `state` parameter. Deterministic, no network call.
pub fn build_authorization_url(
    client: &OAuthClient,
    code_challenge: &str,
    state_token: &str,
    scopes: &[String],
    redirect_uri: &str,
) -> Result<String, ConnectError> {
    let mut url = Url::parse(&client.authorization_endpoint).map_err(|e| {
        ConnectError::Internal(anyhow::anyhow!(
            "invalid authorization endpoint {}: {}",
            client.authorization_endpoint,
            e
        ))
    })?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("response_type", "code");
        query.append_pair("client_id", &client.client_id);
        query.append_pair("redirect_uri", redirect_uri);
        query.append_pair("scope", &scopes.join(" "));
        query.append_pair("state", state_token);

        // PKCE parameters (S256 only)
        query.append_pair("code_challenge", code_challenge);
        query.append_pair("code_challenge_method", "S256");
    }

    debug!("Built authorization URL for client {}", client.client_id);

    Ok(url.to_string())
}
