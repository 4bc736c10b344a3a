//! Authorization callback parsing and code-for-token exchange.

use chrono::{DateTime, Duration, Utc};
use mcpdock_core::OAuthClient;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, warn};
use url::Url;

use crate::error::ConnectError;

/// Query parameters delivered to the redirect URI.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackParams {
    /// Authorization code (missing if the provider reported an error)
    #[serde(default)]
    pub code: Option<String>,
    /// The opaque state string we sent (the sealed attempt context)
    pub state: String,
    /// Error code (if authorization failed)
    #[serde(default)]
    pub error: Option<String>,
    /// Error description
    #[serde(default)]
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Parse a full callback URL.
    ///
    /// A callback without a `state` parameter cannot be attributed to any
    /// attempt, so it is rejected as an invalid state token.
    pub fn from_url(callback_url: &str) -> Result<Self, ConnectError> {
        let url = Url::parse(callback_url).map_err(|_| ConnectError::InvalidStateToken)?;

        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut error_description = None;

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => error_description = Some(value.into_owned()),
                _ => {}
            }
        }

        let state = state.ok_or(ConnectError::InvalidStateToken)?;

        Ok(Self {
            code,
            state,
            error,
            error_description,
        })
    }

    /// Whether the provider reported a failed authorization.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Provider error message, if present.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| match &self.error_description {
            Some(desc) => format!("{}: {}", e, desc),
            None => e.clone(),
        })
    }
}

/// Raw token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    /// Absolute expiry computed from `expires_in`, if the provider sent one.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs))
    }
}

/// Exchanges an authorization code for tokens at the provider's token
/// endpoint, proving possession with the PKCE code verifier.
pub struct TokenExchanger {
    http_client: reqwest::Client,
}

impl TokenExchanger {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// POST the code exchange.
    ///
    /// Client authentication follows the registered
    /// `token_endpoint_auth_method`: secret in the form body
    /// (`client_secret_post`), HTTP basic (`client_secret_basic`), or none
    /// for public clients. The code verifier - never the challenge - proves
    /// possession of the original request.
    pub async fn exchange(
        &self,
        client: &OAuthClient,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, ConnectError> {
        info!("Exchanging authorization code at {}", client.token_endpoint);

        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", redirect_uri);
        params.insert("client_id", &client.client_id);
        params.insert("code_verifier", code_verifier);

        let mut request = self.http_client.post(&client.token_endpoint);

        match (
            client.token_endpoint_auth_method.as_str(),
            client.client_secret.as_deref(),
        ) {
            ("client_secret_basic", Some(secret)) => {
                request = request.basic_auth(&client.client_id, Some(secret));
            }
            (_, Some(secret)) => {
                // client_secret_post, or an unrecognized method with a
                // secret on hand
                params.insert("client_secret", secret);
            }
            (_, None) => {}
        }

        let response = request
            .form(&params)
            .send()
            .await
            .map_err(|e| ConnectError::TokenExchangeFailed(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Token exchange rejected: HTTP {} - {}", status, body);
            return Err(ConnectError::TokenExchangeFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            ConnectError::TokenExchangeFailed(format!("invalid token response: {}", e))
        })?;

        info!("Token exchange successful");

        Ok(token)
    }
}
