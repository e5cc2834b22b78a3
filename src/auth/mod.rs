//! OAuth2 token exchange against the provider's authorization server.
//!
//! Provider-side refusals (`invalid_client`, `invalid_grant`, ...) come back
//! as a [`TokenExchangeResult`] with `success == false`. Only a failure of
//! the transport itself is returned as an error.

mod token;

use anyhow::{Context, Result};
use base64::{Engine as _, engine::general_purpose};
use log::{debug, warn};
use std::sync::Arc;
use url::form_urlencoded;

use crate::http::{RequestOptions, Transport, join_url};

pub(crate) use token::default_token_type;
pub use token::{ProviderError, TokenBundle, TokenCredentials, TokenExchangeResult};

/// Default base URL of the authorization server.
pub const AUTH_API_URL: &str = "https://auth.smartcar.com/oauth/";

/// Application registration used for token exchanges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub user_agent: Option<String>,
}

impl AuthConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            auth_url: AUTH_API_URL.to_string(),
            user_agent: None,
        }
    }

    pub fn with_auth_url(mut self, auth_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

enum Grant<'a> {
    AuthorizationCode(&'a str),
    RefreshToken(&'a str),
}

impl Grant<'_> {
    fn grant_type(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode(_) => "authorization_code",
            Grant::RefreshToken(_) => "refresh_token",
        }
    }
}

/// Exchanges authorization grants for token bundles.
pub struct AuthClient<T: Transport> {
    config: AuthConfig,
    transport: Arc<T>,
}

impl<T: Transport> AuthClient<T> {
    pub fn new(config: AuthConfig, transport: Arc<T>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// `Basic base64(client_id:client_secret)`.
    pub fn authorization_header(&self) -> String {
        let pair = format!("{}:{}", self.config.client_id, self.config.client_secret);
        format!("Basic {}", general_purpose::STANDARD.encode(pair))
    }

    /// Exchanges an authorization code obtained from the consent flow.
    #[tracing::instrument(skip(self, code))]
    pub async fn exchange_authorization_code(&self, code: &str) -> Result<TokenExchangeResult> {
        self.exchange(Grant::AuthorizationCode(code)).await
    }

    /// Exchanges a refresh token for a new token bundle.
    #[tracing::instrument(skip(self, refresh_token))]
    pub async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenExchangeResult> {
        self.exchange(Grant::RefreshToken(refresh_token)).await
    }

    fn form_body(&self, grant: &Grant<'_>) -> String {
        let mut form = form_urlencoded::Serializer::new(String::new());
        form.append_pair("grant_type", grant.grant_type());
        match grant {
            Grant::AuthorizationCode(code) => form.append_pair("code", code),
            Grant::RefreshToken(token) => form.append_pair("refresh_token", token),
        };
        form.append_pair("redirect_uri", &self.config.redirect_uri);
        form.finish()
    }

    async fn exchange(&self, grant: Grant<'_>) -> Result<TokenExchangeResult> {
        let url = join_url(&self.config.auth_url, "token");
        debug!("Requesting {} token from {}...", grant.grant_type(), url);

        let mut options = RequestOptions::post(self.form_body(&grant))
            .with_header("Authorization", self.authorization_header())
            .with_header("Content-Type", "application/x-www-form-urlencoded");
        if let Some(user_agent) = &self.config.user_agent {
            options = options.with_user_agent(user_agent.as_str());
        }

        let raw = self
            .transport
            .perform(&url, options)
            .await
            .context("Failed to reach the authorization server")?;

        if raw.is_ok() {
            return Ok(match serde_json::from_str::<TokenBundle>(&raw.body) {
                Ok(bundle) => TokenExchangeResult {
                    success: true,
                    status_code: raw.status_code,
                    status_message: raw.status_message,
                    credentials: TokenCredentials::Issued(bundle),
                },
                Err(e) => {
                    warn!("Token exchange returned an unreadable token bundle: {}", e);
                    TokenExchangeResult {
                        success: false,
                        status_code: raw.status_code,
                        status_message: raw.status_message,
                        credentials: TokenCredentials::Rejected(ProviderError {
                            error: "invalid_response".to_string(),
                            error_description: Some(e.to_string()),
                        }),
                    }
                }
            });
        }

        let provider_error = serde_json::from_str::<ProviderError>(&raw.body).unwrap_or_default();
        warn!(
            "API error: {} {} {} {}",
            raw.status_code,
            raw.status_message,
            provider_error.error,
            provider_error.error_description.as_deref().unwrap_or_default()
        );

        Ok(TokenExchangeResult {
            success: false,
            status_code: raw.status_code,
            status_message: raw.status_message,
            credentials: TokenCredentials::Rejected(provider_error),
        })
    }
}
