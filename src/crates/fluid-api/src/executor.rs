//! Request executor: issues a validated request over HTTP(S) and normalizes
//! the result.

use crate::error::{FluidError, Result};
use crate::schema::{ApiRequest, ApiResponse, ResponseBody};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

/// Executes validated requests over a reused HTTP client.
///
/// The client and its connection pool are safe to reuse across sequential
/// calls; unsynchronized concurrent reuse of one pipeline instance is not
/// part of the contract.
#[derive(Clone)]
pub struct RequestExecutor {
    client: Client,
}

impl RequestExecutor {
    /// Create an executor with a default client.
    pub fn new() -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    /// Create an executor over a preconfigured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Execute the request and normalize the outcome.
    ///
    /// Wall-clock time is measured around the network exchange only. A
    /// completed exchange with a 4xx/5xx status is a normal [`ApiResponse`]
    /// so callers can inspect it; only network-level failures are errors
    /// ([`FluidError::Transport`], retryable). If `raw` is false the body is
    /// decoded as JSON, falling back to verbatim text with the failure
    /// recorded under `metadata["decode_error"]`.
    pub async fn execute(&self, request: &ApiRequest, raw: bool) -> Result<ApiResponse> {
        request.validate()?;
        let method = request.http_method()?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.body.is_null() {
            builder = builder.json(&request.body);
        }

        let started = Instant::now();
        let response = builder.send().await.map_err(|e| classify(e, request))?;

        let status_code = response.status().as_u16();
        let mut metadata = response_metadata(&response);
        let text = response.text().await?;
        let elapsed_time = started.elapsed().as_secs_f64();

        let body = if raw {
            ResponseBody::Text(text)
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => ResponseBody::Json(value),
                Err(e) => {
                    // Fallback is recorded, not hidden.
                    metadata.insert("decode_error".to_string(), Value::String(e.to_string()));
                    ResponseBody::Text(text)
                }
            }
        };

        debug!(status = status_code, elapsed_time, "request executed");

        Ok(ApiResponse {
            request: request.clone(),
            response: body,
            status_code,
            elapsed_time,
            metadata,
        })
    }
}

/// Header names/values the schema accepted but the HTTP layer rejects are
/// schema violations; everything else at this layer is transport.
fn classify(err: reqwest::Error, request: &ApiRequest) -> FluidError {
    if err.is_builder() {
        FluidError::Validation {
            field: "headers".to_string(),
            message: err.to_string(),
            raw: serde_json::to_string(request).unwrap_or_default(),
        }
    } else {
        FluidError::Transport(err)
    }
}

fn response_metadata(response: &reqwest::Response) -> HashMap<String, Value> {
    let mut metadata = HashMap::new();

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| Value::String(v.to_string()))
        .unwrap_or(Value::Null);
    metadata.insert("content_type".to_string(), content_type);

    let content_length = response
        .content_length()
        .map(|len| Value::from(len))
        .unwrap_or(Value::Null);
    metadata.insert("content_length".to_string(), content_length);

    let headers: serde_json::Map<String, Value> = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
            )
        })
        .collect();
    metadata.insert("headers".to_string(), Value::Object(headers));

    metadata
}
