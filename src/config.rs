//! Settings for a host application, resolved from explicit overrides, then
//! environment variables, then defaults.

use anyhow::{Context, Result, anyhow};
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::{AUTH_API_URL, AuthClient, AuthConfig};
use crate::client::{API_URL, ApiClient, ClientOptions, Credentials, RefreshFailurePolicy};
use crate::http::ReqwestTransport;
use crate::runtime::Runtime;

pub const ENV_CLIENT_ID: &str = "TELEMATICS_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "TELEMATICS_CLIENT_SECRET";
pub const ENV_REDIRECT_URI: &str = "TELEMATICS_REDIRECT_URI";
pub const ENV_AUTH_URL: &str = "TELEMATICS_AUTH_URL";
pub const ENV_API_URL: &str = "TELEMATICS_API_URL";
pub const ENV_CREDENTIALS: &str = "TELEMATICS_CREDENTIALS";

pub const USER_AGENT: &str = concat!("telematics-client/", env!("CARGO_PKG_VERSION"));

/// Values given explicitly, e.g. on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub auth_url: Option<String>,
    pub api_url: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub abort_on_refresh_failure: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub api_url: String,
    pub credentials_path: PathBuf,
    pub refresh_failure: RefreshFailurePolicy,
}

impl Settings {
    pub fn resolve<R: Runtime>(runtime: &R, overrides: Overrides) -> Result<Self> {
        let lookup = |value: Option<String>, key: &str| value.or_else(|| runtime.env_var(key).ok());

        let client_id = lookup(overrides.client_id, ENV_CLIENT_ID).ok_or_else(|| {
            anyhow!("Missing client id: pass --client-id or set {}", ENV_CLIENT_ID)
        })?;
        let client_secret = lookup(overrides.client_secret, ENV_CLIENT_SECRET).ok_or_else(|| {
            anyhow!("Missing client secret: pass --client-secret or set {}", ENV_CLIENT_SECRET)
        })?;

        let credentials_path = match lookup(
            overrides.credentials_path.map(|p| p.to_string_lossy().into_owned()),
            ENV_CREDENTIALS,
        ) {
            Some(path) => PathBuf::from(path),
            None => default_credentials_path(runtime)?,
        };
        debug!("Using credentials file {}", credentials_path.display());

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri: lookup(overrides.redirect_uri, ENV_REDIRECT_URI).unwrap_or_default(),
            auth_url: lookup(overrides.auth_url, ENV_AUTH_URL)
                .unwrap_or_else(|| AUTH_API_URL.to_string()),
            api_url: lookup(overrides.api_url, ENV_API_URL).unwrap_or_else(|| API_URL.to_string()),
            credentials_path,
            refresh_failure: if overrides.abort_on_refresh_failure {
                RefreshFailurePolicy::Abort
            } else {
                RefreshFailurePolicy::Proceed
            },
        })
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(&self.client_id, &self.client_secret, &self.redirect_uri)
            .with_auth_url(&self.auth_url)
            .with_user_agent(USER_AGENT)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            api_url: self.api_url.clone(),
            refresh_failure: self.refresh_failure,
            user_agent: Some(USER_AGENT.to_string()),
            ..ClientOptions::default()
        }
    }

    /// Reads stored credentials; a missing file yields expired defaults.
    pub fn load_credentials<R: Runtime>(&self, runtime: &R) -> Result<Credentials> {
        if !runtime.exists(&self.credentials_path) {
            debug!(
                "No credentials file at {}, starting with empty credentials",
                self.credentials_path.display()
            );
            return Ok(Credentials::default());
        }
        let content = runtime.read_to_string(&self.credentials_path)?;
        serde_json::from_str(&content).with_context(|| {
            format!(
                "Failed to parse credentials file {}",
                self.credentials_path.display()
            )
        })
    }

    pub fn save_credentials<R: Runtime>(&self, runtime: &R, credentials: &Credentials) -> Result<()> {
        let json = serde_json::to_string_pretty(credentials)?;
        runtime.write(&self.credentials_path, json.as_bytes())?;
        debug!("Saved credentials to {}", self.credentials_path.display());
        Ok(())
    }

    pub fn auth_client(&self, transport: Arc<ReqwestTransport>) -> AuthClient<ReqwestTransport> {
        AuthClient::new(self.auth_config(), transport)
    }

    /// Wires a reqwest-backed API client for these settings.
    pub fn api_client<R: Runtime>(
        &self,
        runtime: R,
        credentials: Credentials,
    ) -> Result<ApiClient<ReqwestTransport, R>> {
        let transport = Arc::new(ReqwestTransport::build(USER_AGENT, None)?);
        let auth = self.auth_client(Arc::clone(&transport));
        Ok(ApiClient::with_options(
            transport,
            auth,
            runtime,
            credentials,
            self.client_options(),
        ))
    }
}

fn default_credentials_path<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    runtime
        .config_dir()
        .map(|dir| dir.join("telematics").join("credentials.json"))
        .ok_or_else(|| {
            anyhow!(
                "Could not determine config directory: pass --credentials or set {}",
                ENV_CREDENTIALS
            )
        })
}
