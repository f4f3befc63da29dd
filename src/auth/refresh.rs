// Token endpoint exchanges

use reqwest::Client;
use std::time::Duration;

use super::types::{ProviderErrorBody, TokenResponse};
use crate::config::AuthConfig;
use crate::error::{AuthError, Result};

/// Confidential-client exchanges against the identity provider's token endpoint
#[derive(Debug, Clone)]
pub struct RefreshClient {
    client: Client,
    token_endpoint: String,
    client_id: Option<String>,
    client_secret: Option<String>,
    scope: String,
}

impl RefreshClient {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        // The only timeout on a refresh is the transport's own
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| AuthError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            token_endpoint: config.token_endpoint.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: config.scopes.join(" "),
        })
    }

    /// Trade a refresh token for a new access token
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let (client_id, client_secret) = self.client_credentials()?;

        tracing::info!(
            "Refreshing access token via {} (client_id={}...)",
            self.token_endpoint,
            id_prefix(client_id)
        );

        let form = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("scope", self.scope.as_str()),
        ];

        self.post_form(&form).await
    }

    /// Trade an authorization code from the consent redirect for a first token set
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse> {
        let (client_id, client_secret) = self.client_credentials()?;

        tracing::info!("Exchanging authorization code via {}", self.token_endpoint);

        let form = [
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("scope", self.scope.as_str()),
        ];

        self.post_form(&form).await
    }

    fn client_credentials(&self) -> Result<(&str, &str)> {
        let client_id = self
            .client_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::Config("MS_CLIENT_ID is not configured".to_string()))?;
        let client_secret = self
            .client_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::Config("MS_CLIENT_SECRET is not configured".to_string()))?;
        Ok((client_id, client_secret))
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .client
            .post(&self.token_endpoint)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::Network(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Network(format!("Failed to read token response: {}", e)))?;

        if !status.is_success() {
            let err = provider_error(status.as_u16(), &body);
            tracing::error!("Token endpoint rejected request: {}", err);
            return Err(err);
        }

        let data: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            AuthError::Protocol(format!("Failed to parse token response: {}", e))
        })?;

        if data.access_token.is_empty() {
            return Err(AuthError::Protocol(
                "Token response does not contain access_token".to_string(),
            ));
        }

        tracing::info!(
            "Token endpoint issued access token (expires_in={}s, refresh rotated: {})",
            data.expires_in,
            data.refresh_token.is_some()
        );

        Ok(data)
    }
}

/// First 8 characters of a client id, for logs
fn id_prefix(client_id: &str) -> String {
    client_id.chars().take(8).collect()
}

/// Build a provider error from a non-2xx body, preferring the OAuth
/// `error_description` and falling back to the raw text
fn provider_error(status: u16, body: &str) -> AuthError {
    let parsed: ProviderErrorBody = serde_json::from_str(body).unwrap_or_default();

    let description = parsed
        .error_description
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body.trim().to_string()
            }
        });

    AuthError::Provider {
        status,
        error: parsed.error.unwrap_or_else(|| "unknown_error".to_string()),
        description,
    }
}
