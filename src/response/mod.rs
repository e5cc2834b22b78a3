//! Classification of API answers.
//!
//! A [`Response`] wraps one raw HTTP result and answers the questions the
//! client cares about: did the call succeed, is it a batch, and did any part
//! of it report a permission that the end user has to grant again.

mod batch;

use log::debug;
use serde_json::{Map, Value};

use crate::http::RawHttpResult;

pub use batch::BatchResults;

const PERMISSION_ERROR_TYPE: &str = "PERMISSION";
const REAUTHENTICATE_RESOLUTION: &str = "REAUTHENTICATE";

/// One entry of a batch answer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubResponse<'a> {
    pub path: &'a str,
    pub code: Option<u16>,
    pub body: &'a Value,
}

/// Whether the payload answers a single request or bundles several.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape<'a> {
    Single(&'a Value),
    Batch(Vec<SubResponse<'a>>),
}

/// Immutable view over one API answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status_code: Option<u16>,
    successful: bool,
    error: Option<String>,
    body: Value,
}

impl Response {
    pub fn from_raw(raw: &RawHttpResult) -> Self {
        let body = parse_body(&raw.body);
        let successful = raw.is_ok();
        let error = (!successful).then(|| format_error(raw, &body));

        Self {
            status_code: Some(raw.status_code),
            successful,
            error,
            body,
        }
    }

    /// Placeholder for a call that never produced an HTTP answer.
    pub fn empty() -> Self {
        Self {
            status_code: None,
            successful: false,
            error: Some("API error: no response received".to_string()),
            body: Value::Object(Map::new()),
        }
    }

    pub fn is_successful(&self) -> bool {
        self.successful
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Parsed JSON body; an empty object when the body was missing or not JSON.
    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn is_batch(&self) -> bool {
        self.body.get("responses").is_some_and(Value::is_array)
    }

    pub fn shape(&self) -> ResponseShape<'_> {
        match self.body.get("responses").and_then(Value::as_array) {
            Some(responses) => ResponseShape::Batch(responses.iter().map(sub_response).collect()),
            None => ResponseShape::Single(&self.body),
        }
    }

    /// Sub-response bodies keyed by path with the leading slash removed.
    /// Empty unless the response is a batch.
    pub fn batch_results(&self) -> BatchResults {
        let mut results = BatchResults::default();
        if let ResponseShape::Batch(responses) = self.shape() {
            for response in responses {
                let path = response.path.strip_prefix('/').unwrap_or(response.path);
                results.insert(path.to_string(), response.body.clone());
            }
        }
        results
    }

    /// Returns `body[property]` when present, otherwise the whole body.
    pub fn result(&self, property: &str) -> &Value {
        if property.is_empty() {
            return &self.body;
        }
        self.body.get(property).unwrap_or(&self.body)
    }

    /// Distinct paths whose sub-response asks the user to re-authorize, in
    /// first-seen order. A single (non-batch) response reports an empty path.
    pub fn permissions_denied(&self) -> Vec<String> {
        let mut denied: Vec<String> = Vec::new();
        for response in self.sub_responses() {
            if requires_reauthentication(response.body)
                && !denied.iter().any(|p| p == response.path)
            {
                denied.push(response.path.to_string());
            }
        }
        denied
    }

    pub fn needs_reauthentication(&self) -> bool {
        !self.permissions_denied().is_empty()
    }

    fn sub_responses(&self) -> Vec<SubResponse<'_>> {
        match self.shape() {
            ResponseShape::Batch(responses) => responses,
            ResponseShape::Single(body) => vec![SubResponse {
                path: "",
                code: self.status_code,
                body,
            }],
        }
    }
}

fn parse_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Null) => Value::Object(Map::new()),
        Ok(value) => value,
        Err(e) => {
            debug!("Response body is not JSON: {}", e);
            Value::Object(Map::new())
        }
    }
}

fn sub_response(value: &Value) -> SubResponse<'_> {
    static NULL: Value = Value::Null;
    SubResponse {
        path: value.get("path").and_then(Value::as_str).unwrap_or_default(),
        code: value
            .get("code")
            .and_then(Value::as_u64)
            .and_then(|c| u16::try_from(c).ok()),
        body: value.get("body").unwrap_or(&NULL),
    }
}

fn requires_reauthentication(body: &Value) -> bool {
    let error_type = body.get("type").and_then(Value::as_str);
    let resolution = body.pointer("/resolution/type").and_then(Value::as_str);
    error_type == Some(PERMISSION_ERROR_TYPE) && resolution == Some(REAUTHENTICATE_RESOLUTION)
}

fn format_error(raw: &RawHttpResult, body: &Value) -> String {
    format!(
        "API error: {} {} - Data: {} {} {}",
        raw.status_code,
        raw.status_message,
        field(body, "statusCode"),
        field(body, "type"),
        field(body, "description"),
    )
}

fn field(body: &Value, key: &str) -> String {
    match body.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(body: &str) -> Response {
        Response::from_raw(&RawHttpResult::new(200, "OK", body))
    }

    #[test]
    fn test_success_requires_ok_reason() {
        assert!(ok("{}").is_successful());
        assert!(ok("{}").error().is_none());

        let created = Response::from_raw(&RawHttpResult::new(201, "Created", "{}"));
        assert!(!created.is_successful());
    }

    #[test]
    fn test_error_message_includes_provider_fields() {
        let response = Response::from_raw(&RawHttpResult::new(
            403,
            "Forbidden",
            r#"{"statusCode": 403, "type": "PERMISSION", "description": "Missing scope"}"#,
        ));

        assert!(!response.is_successful());
        assert_eq!(
            response.error(),
            Some("API error: 403 Forbidden - Data: 403 PERMISSION Missing scope")
        );
        assert_eq!(response.status_code(), Some(403));
    }

    #[test]
    fn test_error_message_without_body() {
        let response = Response::from_raw(&RawHttpResult::new(502, "Bad Gateway", "<html>"));
        assert_eq!(response.error(), Some("API error: 502 Bad Gateway - Data:   "));
        assert_eq!(response.body(), &json!({}));
    }

    #[test]
    fn test_batch_results() {
        let response = ok(
            r#"{"responses":[{"path":"/odometer","body":{"distance":1}},{"path":"/location","body":{"lat":1,"lon":2}}]}"#,
        );

        assert!(response.is_batch());
        let results = response.batch_results();
        assert_eq!(results.len(), 2);
        assert_eq!(results.get("odometer"), Some(&json!({"distance": 1})));
        assert_eq!(results.get("location"), Some(&json!({"lat": 1, "lon": 2})));
        assert_eq!(results.paths().collect::<Vec<_>>(), vec!["odometer", "location"]);
    }

    #[test]
    fn test_batch_results_empty_for_single_response() {
        let response = ok(r#"{"id": "v1", "make": "TESLA"}"#);
        assert!(!response.is_batch());
        assert!(response.batch_results().is_empty());
        assert_eq!(response.shape(), ResponseShape::Single(response.body()));
    }

    #[test]
    fn test_shape_reads_sub_response_codes() {
        let response = ok(
            r#"{"responses":[{"path":"/fuel","code":409,"body":{"type":"VEHICLE_STATE"}}]}"#,
        );

        match response.shape() {
            ResponseShape::Batch(responses) => {
                assert_eq!(responses.len(), 1);
                assert_eq!(responses[0].path, "/fuel");
                assert_eq!(responses[0].code, Some(409));
            }
            other => panic!("Expected batch shape, got {:?}", other),
        }
    }

    #[test]
    fn test_reauthentication_detected_once_per_path() {
        let response = ok(r#"{"responses":[
            {"path":"/odometer","code":403,"body":{"type":"PERMISSION","resolution":{"type":"REAUTHENTICATE"}}},
            {"path":"/location","code":200,"body":{"lat":1,"lon":2}},
            {"path":"/odometer","code":403,"body":{"type":"PERMISSION","resolution":{"type":"REAUTHENTICATE"}}}
        ]}"#);

        assert!(response.needs_reauthentication());
        assert_eq!(response.permissions_denied(), vec!["/odometer".to_string()]);
    }

    #[test]
    fn test_permission_without_reauthenticate_resolution() {
        let response = ok(r#"{"responses":[
            {"path":"/odometer","body":{"type":"PERMISSION","resolution":{"type":"CONTACT_SUPPORT"}}},
            {"path":"/fuel","body":{"type":"PERMISSION"}}
        ]}"#);

        assert!(!response.needs_reauthentication());
        assert!(response.permissions_denied().is_empty());
    }

    #[test]
    fn test_reauthenticate_requires_permission_type() {
        let response = ok(r#"{"type":"RATE_LIMIT","resolution":{"type":"REAUTHENTICATE"}}"#);
        assert!(!response.needs_reauthentication());
    }

    #[test]
    fn test_single_response_reauthentication_has_empty_path() {
        let response = Response::from_raw(&RawHttpResult::new(
            403,
            "Forbidden",
            r#"{"type":"PERMISSION","resolution":{"type":"REAUTHENTICATE"}}"#,
        ));

        assert!(!response.is_successful());
        assert!(response.needs_reauthentication());
        assert_eq!(response.permissions_denied(), vec![String::new()]);
    }

    #[test]
    fn test_result_unwraps_property() {
        let response = ok(r#"{"data": {"latitude": 37.4, "longitude": -122.1}, "meta": {}}"#);

        assert_eq!(
            response.result("data"),
            &json!({"latitude": 37.4, "longitude": -122.1})
        );
        assert_eq!(response.result("missing"), response.body());
        assert_eq!(response.result(""), response.body());
        assert_eq!(response.result("data"), response.result("data"));
    }

    #[test]
    fn test_empty_response() {
        let response = Response::empty();

        assert!(!response.is_successful());
        assert!(response.error().is_some());
        assert_eq!(response.status_code(), None);
        assert!(response.batch_results().is_empty());
        assert_eq!(response.result("data"), &json!({}));
        assert!(!response.needs_reauthentication());
    }
}
