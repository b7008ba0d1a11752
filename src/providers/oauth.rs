//! Google OAuth 2.0 authorization-code flow.

use std::time::Duration;

use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::GoogleConfig;
use crate::error::ProviderError;

const PROVIDER: &str = "google";

/// Gmail scopes requested at consent.
pub const GMAIL_SCOPES: [&str; 4] = [
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.send",
    "https://www.googleapis.com/auth/gmail.compose",
    "https://www.googleapis.com/auth/gmail.modify",
];

/// Tokens returned by the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    /// Only present on the first consent or when `prompt=consent` is used.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth client for the Gmail connection.
pub struct GoogleOAuth {
    client: Client,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    auth_url: String,
    token_url: String,
}

impl GoogleOAuth {
    pub fn new(config: &GoogleConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
        }
    }

    /// Consent URL the browser is redirected to.
    pub fn auth_url(&self) -> Result<String, ProviderError> {
        let scope = GMAIL_SCOPES.join(" ");
        let url = Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| ProviderError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: format!("Invalid auth URL: {e}"),
        })?;
        Ok(url.into())
    }

    /// Trade an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, ProviderError> {
        let tokens = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .await?;
        info!(
            has_refresh = tokens.refresh_token.is_some(),
            "OAuth code exchanged"
        );
        Ok(tokens)
    }

    /// Obtain a new access token from a refresh token.
    pub async fn refresh(&self, refresh_token: &SecretString) -> Result<TokenSet, ProviderError> {
        let tokens = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
            ])
            .await?;
        info!("OAuth access token refreshed");
        Ok(tokens)
    }

    async fn token_request(&self, grant: &[(&str, &str)]) -> Result<TokenSet, ProviderError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ];
        form.extend_from_slice(grant);

        let response = self.client.post(&self.token_url).form(&form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<TokenErrorBody>(&text) {
                Ok(body) => match body.error_description {
                    Some(desc) => format!("{}: {}", body.error, desc),
                    None => body.error,
                },
                Err(_) => format!("HTTP {status}"),
            };
            warn!(status = %status, reason = %reason, "OAuth token request rejected");

            // invalid_grant means the code or refresh token is dead.
            if status.is_client_error() {
                return Err(ProviderError::NotAuthenticated {
                    provider: "gmail".to_string(),
                });
            }
            return Err(ProviderError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason,
            });
        }

        response
            .json::<TokenSet>()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })
    }
}
