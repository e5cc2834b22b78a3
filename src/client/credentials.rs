use serde::{Deserialize, Serialize};

use crate::auth::{TokenBundle, default_token_type};

fn default_expiration() -> i64 {
    -1
}

/// Live credentials of one client session.
///
/// `expiration` is the validity deadline of `access_token` in seconds since
/// the Unix epoch. The default `-1` means the token is already expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default = "default_expiration")]
    pub expiration: i64,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            refresh_token: String::new(),
            token_type: default_token_type(),
            expiration: default_expiration(),
        }
    }
}

impl Credentials {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expiration: i64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expiration,
            ..Self::default()
        }
    }

    /// Credentials for a freshly issued bundle.
    pub fn from_bundle(bundle: &TokenBundle, now: i64) -> Self {
        Self {
            token_type: bundle.token_type.clone(),
            ..Self::default().refreshed(bundle, now)
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expiration
    }

    /// `Authorization` header value, e.g. `Bearer <token>`.
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// Replaces both tokens and the expiration as one unit.
    pub(crate) fn refreshed(&self, bundle: &TokenBundle, now: i64) -> Self {
        Self {
            access_token: bundle.access_token.clone(),
            refresh_token: bundle.refresh_token.clone(),
            token_type: self.token_type.clone(),
            expiration: now.saturating_add(bundle.expires_in),
        }
    }
}
