//! Transport abstraction for outgoing HTTP calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP method used by the API and token endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// Everything needed to issue a single request, apart from the URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    /// Header names are matched case-insensitively; insertion order is kept.
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub user_agent: Option<String>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            body: body.into(),
            ..Self::default()
        }
    }

    /// Returns the value of a header, ignoring the case of its name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header, replacing any existing value with the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Sets a header only if the caller has not already provided one.
    pub fn with_default_header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if self.header(&name).is_some() {
            return self;
        }
        self.with_header(name, value)
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// An HTTP answer as seen by the client, regardless of its status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawHttpResult {
    pub status_code: u16,
    /// Canonical reason phrase, e.g. "OK" or "Not Found".
    pub status_message: String,
    pub body: String,
}

impl RawHttpResult {
    pub fn new(status_code: u16, status_message: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status_code,
            status_message: status_message.into(),
            body: body.into(),
        }
    }

    /// The provider signals success through the "OK" reason phrase only.
    pub fn is_ok(&self) -> bool {
        self.status_message == "OK"
    }
}

/// Failures below the HTTP layer: no status line was ever received.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to connect to {url}: {message}")]
    Connect { url: String, message: String },
    #[error("Request to {url} timed out")]
    Timeout { url: String },
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("Failed to read response body from {url}: {message}")]
    Body { url: String, message: String },
}

/// Performs HTTP requests on behalf of the auth and API clients.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<RawHttpResult, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_default_header_keeps_caller_value() {
        let options = RequestOptions::get()
            .with_header("authorization", "Custom abc")
            .with_default_header("Authorization", "Bearer xyz");

        assert_eq!(options.header("AUTHORIZATION"), Some("Custom abc"));
        assert_eq!(options.headers.len(), 1);
    }

    #[test]
    fn test_with_header_overrides_case_insensitively() {
        let options = RequestOptions::post("{}")
            .with_header("content-type", "text/plain")
            .with_header("Content-Type", "application/json");

        assert_eq!(options.header("content-type"), Some("application/json"));
        assert_eq!(options.headers.len(), 1);
        assert_eq!(options.method, Method::Post);
    }

    #[test]
    fn test_raw_result_is_ok_uses_reason_phrase() {
        assert!(RawHttpResult::new(200, "OK", "").is_ok());
        assert!(!RawHttpResult::new(200, "", "").is_ok());
        assert!(!RawHttpResult::new(401, "Unauthorized", "").is_ok());
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::Timeout {
            url: "https://api.example.com".to_string(),
        };
        assert_eq!(err.to_string(), "Request to https://api.example.com timed out");
    }
}
