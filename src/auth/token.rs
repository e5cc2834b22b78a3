//! Token exchange payloads.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub(crate) fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Accepts a lifetime sent as an integer, a float or a numeric string.
/// Fractional seconds are truncated.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let seconds = match &value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    };
    seconds.ok_or_else(|| de::Error::custom(format!("invalid token lifetime: {}", value)))
}

/// Tokens issued by a successful exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime of `access_token`, in seconds.
    #[serde(deserialize_with = "lenient_seconds")]
    pub expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_expires_in: Option<i64>,
    /// Any other fields the provider returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Error fields reported by the provider when it refuses an exchange,
/// e.g. `invalid_client` or `invalid_grant`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderError {
    #[serde(default)]
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenCredentials {
    Issued(TokenBundle),
    Rejected(ProviderError),
}

/// Outcome of a token exchange that reached the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenExchangeResult {
    pub success: bool,
    pub status_code: u16,
    pub status_message: String,
    pub credentials: TokenCredentials,
}

impl TokenExchangeResult {
    pub fn bundle(&self) -> Option<&TokenBundle> {
        match &self.credentials {
            TokenCredentials::Issued(bundle) => Some(bundle),
            TokenCredentials::Rejected(_) => None,
        }
    }

    pub fn provider_error(&self) -> Option<&ProviderError> {
        match &self.credentials {
            TokenCredentials::Rejected(error) => Some(error),
            TokenCredentials::Issued(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_bundle_keeps_extra_fields() {
        let bundle: TokenBundle = serde_json::from_str(
            r#"{
                "access_token": "access",
                "refresh_token": "refresh",
                "expires_in": 7200,
                "scope": "read_vehicle_info"
            }"#,
        )
        .unwrap();

        assert_eq!(bundle.token_type, "Bearer");
        assert_eq!(bundle.expires_in, 7200);
        assert_eq!(bundle.refresh_expires_in, None);
        assert_eq!(
            bundle.extra.get("scope"),
            Some(&Value::String("read_vehicle_info".into()))
        );
    }

    #[test]
    fn test_token_bundle_accepts_string_and_float_lifetimes() {
        let parse = |expires_in: &str| -> serde_json::Result<TokenBundle> {
            serde_json::from_str(&format!(
                r#"{{"access_token": "a", "refresh_token": "r", "expires_in": {}}}"#,
                expires_in
            ))
        };

        assert_eq!(parse(r#""7200""#).unwrap().expires_in, 7200);
        assert_eq!(parse("7200.0").unwrap().expires_in, 7200);
        assert_eq!(parse(r#"" 3600.9 ""#).unwrap().expires_in, 3600);
        assert!(parse(r#""soon""#).is_err());
        assert!(parse("null").is_err());
    }

    #[test]
    fn test_issued_credentials_with_string_lifetime() {
        let credentials: TokenCredentials = serde_json::from_str(
            r#"{"access_token": "a", "refresh_token": "r", "expires_in": "7200"}"#,
        )
        .unwrap();
        match credentials {
            TokenCredentials::Issued(bundle) => assert_eq!(bundle.expires_in, 7200),
            other => panic!("Expected issued tokens, got {:?}", other),
        }
    }

    #[test]
    fn test_provider_error_tolerates_missing_fields() {
        let error: ProviderError = serde_json::from_str(r#"{"error": "invalid_grant"}"#).unwrap();
        assert_eq!(error.error, "invalid_grant");
        assert_eq!(error.error_description, None);
    }
}
