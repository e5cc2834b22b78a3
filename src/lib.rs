pub mod auth;
pub mod client;
pub mod config;
pub mod events;
pub mod http;
pub mod response;
pub mod runtime;

pub use auth::{AuthClient, AuthConfig, TokenBundle, TokenExchangeResult};
pub use client::{ApiClient, ClientOptions, Credentials, RefreshFailurePolicy, RefreshOutcome};
pub use events::{Event, EventKind, ListenerPolicy};
pub use http::{RawHttpResult, RequestOptions, ReqwestTransport, Transport, TransportError};
pub use response::{BatchResults, Response};
