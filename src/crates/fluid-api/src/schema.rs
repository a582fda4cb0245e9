//! Request and response data model.
//!
//! [`ApiRequest`] is the schema the inference service must conform to; it is
//! validated strictly before any execution is attempted. [`ApiResponse`] is
//! the structured result of one executed request. Field names on both are a
//! compatibility contract for serialized output.

use crate::error::{FluidError, Result};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use url::Url;

/// HTTP verbs accepted by the request schema.
pub const SUPPORTED_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// A single natural-language instruction plus optional context.
///
/// Immutable once created; owned by the caller and passed by value into the
/// pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// The instruction, e.g. "Get a random cat fact from https://catfact.ninja/fact".
    pub task: String,

    /// Optional reference text describing the target API.
    pub documentation: Option<String>,

    /// Optional hints about the expected request shape.
    pub schema_hint: Option<String>,
}

impl TaskDescriptor {
    /// Create a descriptor from an instruction.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            documentation: None,
            schema_hint: None,
        }
    }

    /// Attach API documentation text.
    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    /// Attach a schema hint.
    pub fn with_schema_hint(mut self, hint: impl Into<String>) -> Self {
        self.schema_hint = Some(hint.into());
        self
    }
}

/// A validated, executable HTTP request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRequest {
    /// HTTP verb; must be one of [`SUPPORTED_METHODS`].
    pub method: String,

    /// Absolute http(s) URI.
    pub url: String,

    /// Request headers. Missing headers deserialize to an empty map, never a
    /// null-like state.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Structured payload; `Null` means no body is sent.
    #[serde(default)]
    pub body: Value,
}

impl ApiRequest {
    /// Create a bodyless request with no headers.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            body: Value::Null,
        }
    }

    /// Strictly validate the request against the schema invariants.
    ///
    /// The method must be a recognized verb and the URL must parse as an
    /// absolute http(s) URI. Violations are never coerced.
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_METHODS.contains(&self.method.as_str()) {
            return Err(self.violation(
                "method",
                format!(
                    "`{}` is not one of {}",
                    self.method,
                    SUPPORTED_METHODS.join("/")
                ),
            ));
        }

        if self.url.is_empty() {
            return Err(self.violation("url", "url must not be empty".to_string()));
        }
        let parsed = Url::parse(&self.url)
            .map_err(|e| self.violation("url", format!("not an absolute URI: {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(self.violation(
                "url",
                format!("unsupported scheme `{}`", parsed.scheme()),
            ));
        }

        Ok(())
    }

    /// The validated verb as a [`reqwest::Method`].
    pub fn http_method(&self) -> Result<Method> {
        match self.method.as_str() {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "PATCH" => Ok(Method::PATCH),
            "DELETE" => Ok(Method::DELETE),
            other => Err(self.violation("method", format!("`{other}` is not a recognized verb"))),
        }
    }

    fn violation(&self, field: &str, message: String) -> FluidError {
        FluidError::Validation {
            field: field.to_string(),
            message,
            raw: serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

/// Response body in either decoded or verbatim form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    /// Decoded structured payload (`raw = false`).
    Json(Value),
    /// Verbatim response text (`raw = true`, or decode fallback).
    Text(String),
}

impl ResponseBody {
    /// The decoded payload, if this body was decoded.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    /// The verbatim text, if this body was kept raw.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Json(_) => None,
            ResponseBody::Text(text) => Some(text),
        }
    }
}

/// Structured result of one executed request.
///
/// Serialized field names (`request`, `response`, `status_code`,
/// `elapsed_time`, `metadata`) are the compatibility contract other tools
/// depend on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    /// The request that produced this response, for traceability.
    pub request: ApiRequest,

    /// Response body, decoded or raw depending on mode.
    pub response: ResponseBody,

    /// Transport-level HTTP status. 4xx/5xx is a normal response here, not
    /// an error.
    pub status_code: u16,

    /// Wall-clock seconds spent on the network call only.
    pub elapsed_time: f64,

    /// Content type, content length, response headers, retry count, decode
    /// fallback notes.
    pub metadata: HashMap<String, Value>,
}

impl ApiResponse {
    /// Serialize to pretty-printed JSON for logging or transport.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_accepts_all_supported_methods() {
        for method in SUPPORTED_METHODS {
            let request = ApiRequest::new(method, "https://api.example.com/v1/things");
            assert!(request.validate().is_ok(), "{method} should be accepted");
            assert!(request.http_method().is_ok());
        }
    }

    #[test]
    fn test_validate_rejects_unknown_method() {
        let request = ApiRequest::new("FETCH", "https://api.example.com");
        match request.validate() {
            Err(FluidError::Validation { field, .. }) => assert_eq!(field, "method"),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_lowercase_method() {
        // The schema is strict: verbs are not case-coerced.
        let request = ApiRequest::new("get", "https://api.example.com");
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_and_empty_urls() {
        let relative = ApiRequest::new("GET", "/v1/things");
        match relative.validate() {
            Err(FluidError::Validation { field, .. }) => assert_eq!(field, "url"),
            other => panic!("expected validation failure, got {other:?}"),
        }

        let empty = ApiRequest::new("GET", "");
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_http_scheme() {
        let request = ApiRequest::new("GET", "ftp://files.example.com/data");
        match request.validate() {
            Err(FluidError::Validation { field, .. }) => assert_eq!(field, "url"),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_request_defaults_are_empty_not_null() {
        let request: ApiRequest =
            serde_json::from_value(json!({"method": "GET", "url": "https://a.example"})).unwrap();
        assert!(request.headers.is_empty());
        assert!(request.body.is_null());
    }

    #[test]
    fn test_request_round_trip_is_lossless() {
        let original: ApiRequest = serde_json::from_value(json!({
            "method": "POST",
            "url": "https://api.example.com/v1/users",
            "headers": {"Content-Type": "application/json"},
            "body": {"name": "Ada"}
        }))
        .unwrap();
        original.validate().unwrap();

        let round_tripped: ApiRequest =
            serde_json::from_value(serde_json::to_value(&original).unwrap()).unwrap();
        assert_eq!(round_tripped.method, original.method);
        assert_eq!(round_tripped.url, original.url);
        assert_eq!(round_tripped.headers, original.headers);
        assert_eq!(round_tripped.body, original.body);
    }

    #[test]
    fn test_response_serialization_contract() {
        let response = ApiResponse {
            request: ApiRequest::new("GET", "https://catfact.ninja/fact"),
            response: ResponseBody::Json(json!({"fact": "cats sleep a lot"})),
            status_code: 200,
            elapsed_time: 0.25,
            metadata: HashMap::new(),
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status_code"], 200);
        assert_eq!(value["elapsed_time"], 0.25);
        assert_eq!(value["request"]["method"], "GET");
        assert_eq!(value["response"]["fact"], "cats sleep a lot");
        assert!(value.get("metadata").is_some());

        let pretty = response.to_json_pretty().unwrap();
        assert!(pretty.contains("\"status_code\""));
    }

    #[test]
    fn test_response_body_accessors() {
        let json_body = ResponseBody::Json(json!({"ok": true}));
        assert!(json_body.as_json().is_some());
        assert!(json_body.as_text().is_none());

        let text_body = ResponseBody::Text("plain".to_string());
        assert_eq!(text_body.as_text(), Some("plain"));
        assert!(text_body.as_json().is_none());
    }
}
