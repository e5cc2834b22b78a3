//! HTTP transport seam: request/response value types and the reqwest-backed
//! implementation used outside of tests.

mod client;
mod transport;

pub use client::ReqwestTransport;
pub use transport::{Method, RawHttpResult, RequestOptions, Transport, TransportError};

#[cfg(test)]
pub use transport::MockTransport;

/// Appends an endpoint to a base URL, inserting a single `/` between them.
pub fn join_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        assert_eq!(
            join_url("https://api.smartcar.com/v2.0/", "vehicles"),
            "https://api.smartcar.com/v2.0/vehicles"
        );
        assert_eq!(
            join_url("http://127.0.0.1:1234", "/vehicles/1/batch"),
            "http://127.0.0.1:1234/vehicles/1/batch"
        );
    }
}
