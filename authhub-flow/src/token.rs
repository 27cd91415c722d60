use std::time::Duration;

use authhub_core::{ProviderProfile, TokenError, TokenSet};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;

/// Performs authorization-code and refresh-token grants against a profile's token endpoint.
///
/// Grants are never retried. Codes are single-use and some providers burn them even on error.
#[derive(Debug, Clone)]
pub struct TokenClient {
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    id_token: Option<String>,
    expires_in: Option<Value>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenClient {
    /// Build a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TokenError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TokenError::Transport(e.to_string()))?;
        Ok(Self { http })
    }

    /// Wrap an existing client. Its timeout settings apply.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_authorization_code(
        &self,
        profile: &ProviderProfile,
        code: &str,
    ) -> Result<TokenSet, TokenError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", profile.client_id.as_str()),
            ("client_secret", profile.client_secret.as_str()),
            ("redirect_uri", profile.redirect_uri.as_str()),
        ];
        self.request_tokens(profile, &params).await
    }

    /// Obtain a fresh access token with a refresh token.
    pub async fn refresh_access_token(
        &self,
        profile: &ProviderProfile,
        refresh_token: &str,
    ) -> Result<TokenSet, TokenError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", profile.client_id.as_str()),
            ("client_secret", profile.client_secret.as_str()),
        ];
        self.request_tokens(profile, &params).await
    }

    async fn request_tokens(
        &self,
        profile: &ProviderProfile,
        params: &[(&str, &str)],
    ) -> Result<TokenSet, TokenError> {
        let response = self
            .http
            .post(profile.token_endpoint.clone())
            .header(ACCEPT, "application/json")
            .form(params)
            .send()
            .await
            .map_err(|e| {
                log::error!("{}: token endpoint unreachable: {e}", profile.kind);
                TokenError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            log::error!("{}: failed to read token response: {e}", profile.kind);
            TokenError::Transport(e.to_string())
        })?;

        let parsed: TokenEndpointResponse = serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "{}: token endpoint returned {status} with an unparseable body: {e}",
                profile.kind
            );
            TokenError::Transport(format!("token endpoint returned {status}"))
        })?;

        match parsed.access_token.filter(|t| !t.is_empty()) {
            Some(access_token) if status.is_success() => Ok(TokenSet {
                access_token,
                refresh_token: parsed.refresh_token.filter(|t| !t.is_empty()),
                id_token: parsed.id_token.filter(|t| !t.is_empty()),
                expires_in: parsed.expires_in.as_ref().and_then(seconds),
            }),
            _ => {
                let message = parsed
                    .error_description
                    .or(parsed.error)
                    .unwrap_or_else(|| {
                        if status.is_success() {
                            "Access token not found in response".to_string()
                        } else {
                            format!("token endpoint returned {status}")
                        }
                    });
                log::warn!("{}: token grant rejected ({status}): {message}", profile.kind);
                Err(TokenError::Provider(message))
            }
        }
    }
}

// Some providers send `expires_in` as a string.
fn seconds(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
