//! Authenticated access to the vehicle data API.
//!
//! Every data call first checks whether the access token is still valid and
//! refreshes it through the [`AuthClient`] when it is not. Failed calls are
//! reported through [`Response::is_successful`] and events, never as errors;
//! the only error a data call returns is a transport failure while
//! refreshing the token.

mod credentials;

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::AuthClient;
use crate::events::{Event, EventKind, ListenerPolicy, Listeners};
use crate::http::{RawHttpResult, RequestOptions, Transport, join_url};
use crate::response::Response;
use crate::runtime::Runtime;

pub use credentials::Credentials;

/// Default base URL of the vehicle data API.
pub const API_URL: &str = "https://api.smartcar.com/v2.0/";

/// What to do with a data call when the token refresh before it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshFailurePolicy {
    /// Send the call anyway with the expired token.
    #[default]
    Proceed,
    /// Skip the call and return [`Response::empty`].
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub api_url: String,
    pub listener_policy: ListenerPolicy,
    pub refresh_failure: RefreshFailurePolicy,
    pub user_agent: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_url: API_URL.to_string(),
            listener_policy: ListenerPolicy::default(),
            refresh_failure: RefreshFailurePolicy::default(),
            user_agent: None,
        }
    }
}

/// Result of the freshness check run before each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    NotNeeded,
    Refreshed,
    Failed,
}

#[derive(Serialize)]
struct BatchRequest {
    path: String,
}

#[derive(Serialize)]
struct BatchBody {
    requests: Vec<BatchRequest>,
}

/// Client for the vehicle data API.
///
/// Operations take `&mut self`: a refresh replaces the credentials, so one
/// instance must not serve concurrent calls.
pub struct ApiClient<T: Transport, R: Runtime> {
    transport: Arc<T>,
    auth: AuthClient<T>,
    runtime: R,
    credentials: Credentials,
    listeners: Listeners,
    options: ClientOptions,
}

impl<T: Transport, R: Runtime> ApiClient<T, R> {
    pub fn new(transport: Arc<T>, auth: AuthClient<T>, runtime: R, credentials: Credentials) -> Self {
        Self::with_options(transport, auth, runtime, credentials, ClientOptions::default())
    }

    pub fn with_options(
        transport: Arc<T>,
        auth: AuthClient<T>,
        runtime: R,
        credentials: Credentials,
        options: ClientOptions,
    ) -> Self {
        Self {
            transport,
            auth,
            runtime,
            credentials,
            listeners: Listeners::new(options.listener_policy),
            options,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Registers a listener by event name, ignoring case.
    ///
    /// Returns `Ok(false)` when the listener was ignored because one is
    /// already registered and the policy is [`ListenerPolicy::FirstWins`].
    pub fn add_listener<F>(&mut self, event_name: &str, listener: F) -> Result<bool>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let kind = event_name.parse::<EventKind>()?;
        Ok(self.on(kind, listener))
    }

    pub fn on<F>(&mut self, kind: EventKind, listener: F) -> bool
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.listeners.add(kind, Box::new(listener))
    }

    /// Refreshes the access token if it has expired.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_fresh_credentials(&mut self) -> Result<RefreshOutcome> {
        let now = self.runtime.now();
        if !self.credentials.is_expired(now) {
            return Ok(RefreshOutcome::NotNeeded);
        }

        debug!(
            "Access token expired at {} (now {}), refreshing...",
            self.credentials.expiration, now
        );
        self.refresh().await
    }

    /// Exchanges the refresh token for new credentials, regardless of expiry.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&mut self) -> Result<RefreshOutcome> {
        let result = self
            .auth
            .exchange_refresh_token(&self.credentials.refresh_token)
            .await
            .context("Failed to refresh access token")?;

        if result.success {
            if let Some(bundle) = result.bundle() {
                self.credentials = self.credentials.refreshed(bundle, self.runtime.now());
                info!(
                    "Access token refreshed, valid until {}",
                    self.credentials.expiration
                );
                self.listeners
                    .dispatch(&Event::AccessTokenChanged(bundle.clone()));
                return Ok(RefreshOutcome::Refreshed);
            }
        }

        warn!(
            "Token refresh failed with {} {}; the user needs to authorize again",
            result.status_code, result.status_message
        );
        self.listeners.dispatch(&Event::RefreshTokenExpired(result));
        Ok(RefreshOutcome::Failed)
    }

    /// `GET vehicles`
    pub async fn vehicles(&mut self) -> Result<Response> {
        self.request("vehicles", RequestOptions::get()).await
    }

    /// `GET vehicles/{id}`
    pub async fn vehicle_info(&mut self, id: &str) -> Result<Response> {
        self.request(&format!("vehicles/{}", id), RequestOptions::get())
            .await
    }

    /// `GET vehicles/{id}/location`
    pub async fn vehicle_location(&mut self, id: &str) -> Result<Response> {
        self.request(&format!("vehicles/{}/location", id), RequestOptions::get())
            .await
    }

    /// `POST vehicles/{id}/batch` with one sub-request per path. Read the
    /// answer through [`Response::batch_results`].
    pub async fn batch<S: AsRef<str>>(&mut self, id: &str, paths: &[S]) -> Result<Response> {
        let body = BatchBody {
            requests: paths
                .iter()
                .map(|path| BatchRequest {
                    path: normalize_path(path.as_ref()),
                })
                .collect(),
        };
        let body = serde_json::to_string(&body).context("Failed to encode batch request")?;
        let options = RequestOptions::post(body).with_header("Content-Type", "application/json");

        self.request(&format!("vehicles/{}/batch", id), options)
            .await
    }

    /// Issues an authenticated call to `endpoint`, relative to the API URL.
    ///
    /// An `Authorization` header supplied in `options` is kept as is.
    #[tracing::instrument(skip(self, options))]
    pub async fn request(&mut self, endpoint: &str, options: RequestOptions) -> Result<Response> {
        let outcome = self.ensure_fresh_credentials().await?;
        if outcome == RefreshOutcome::Failed
            && self.options.refresh_failure == RefreshFailurePolicy::Abort
        {
            warn!("Skipping request to {}: token refresh failed", endpoint);
            return Ok(Response::empty());
        }

        let mut options =
            options.with_default_header("Authorization", self.credentials.authorization_value());
        if options.user_agent.is_none() {
            options.user_agent = self.options.user_agent.clone();
        }

        let url = join_url(&self.options.api_url, endpoint);
        debug!("{} {}", options.method, url);

        match self.transport.perform(&url, options).await {
            Ok(raw) => Ok(self.parse_response(raw)),
            Err(e) => {
                error!("{}", e);
                Ok(Response::empty())
            }
        }
    }

    fn parse_response(&self, raw: RawHttpResult) -> Response {
        let response = Response::from_raw(&raw);

        if !response.is_successful() {
            error!("{}", response.error().unwrap_or_default());
            self.listeners.dispatch(&Event::RequestFailed(raw));
        }

        let denied = response.permissions_denied();
        if !denied.is_empty() {
            warn!("Permissions need to be granted again for {:?}", denied);
            self.listeners
                .dispatch(&Event::AuthorizationDenied(denied));
        }

        response
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
