//! reqwest-backed transport.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use reqwest::header::USER_AGENT;
use std::time::Duration;

use super::transport::{Method, RawHttpResult, RequestOptions, Transport, TransportError};

/// Default timeout applied to every request issued by [`ReqwestTransport::build`].
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Transport that hands requests to a reqwest `Client`.
///
/// Status codes are never turned into errors here: any response with a
/// status line is returned as a [`RawHttpResult`] for the caller to classify.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Wraps an existing reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client with the given user agent and request timeout.
    pub fn build(user_agent: &str, timeout: Option<Duration>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, options), fields(method = %options.method))]
    async fn perform(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<RawHttpResult, TransportError> {
        debug!("{} {}...", options.method, url);

        let mut request = match options.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };

        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(user_agent) = &options.user_agent {
            request = request.header(USER_AGENT, user_agent.as_str());
        }
        if !options.body.is_empty() {
            request = request.body(options.body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_send_error(url, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| TransportError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        debug!("{} answered {} ({} bytes)", url, status, body.len());

        Ok(RawHttpResult {
            status_code: status.as_u16(),
            status_message: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

fn classify_send_error(url: &str, error: reqwest::Error) -> TransportError {
    let url = url.to_string();
    if error.is_timeout() {
        TransportError::Timeout { url }
    } else if error.is_connect() {
        TransportError::Connect {
            url,
            message: error.to_string(),
        }
    } else {
        TransportError::Request {
            url,
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_perform_get_success() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/vehicles")
            .match_header("authorization", "Bearer token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"vehicles": ["v1"]}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new(Client::new());
        let options = RequestOptions::get().with_header("Authorization", "Bearer token");
        let result = transport
            .perform(&format!("{}/vehicles", url), options)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.status_code, 200);
        assert_eq!(result.status_message, "OK");
        assert_eq!(result.body, r#"{"vehicles": ["v1"]}"#);
    }

    #[tokio::test]
    async fn test_perform_non_ok_status_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("GET", "/vehicles/missing")
            .with_status(404)
            .with_body(r#"{"type": "RESOURCE_NOT_FOUND"}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new(Client::new());
        let result = transport
            .perform(&format!("{}/vehicles/missing", url), RequestOptions::get())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.status_code, 404);
        assert_eq!(result.status_message, "Not Found");
        assert!(!result.is_ok());
    }

    #[tokio::test]
    async fn test_perform_post_sends_body_and_user_agent() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();

        let mock = server
            .mock("POST", "/token")
            .match_header("user-agent", "fleet-app")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body("grant_type=refresh_token&refresh_token=abc")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let transport = ReqwestTransport::build("telematics-client", None).unwrap();
        let options = RequestOptions::post("grant_type=refresh_token&refresh_token=abc")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_user_agent("fleet-app");
        let result = transport
            .perform(&format!("{}/token", url), options)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_perform_connection_refused() {
        let transport = ReqwestTransport::new(Client::new());
        let err = transport
            .perform("http://127.0.0.1:1/vehicles", RequestOptions::get())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransportError::Connect { .. } | TransportError::Request { .. }
        ));
    }
}
