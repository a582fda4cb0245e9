//! Task interpreter: drives the inference service and enforces the request
//! schema on its output.
//!
//! Interpretation never performs the HTTP call itself; a task that fails
//! validation here results in zero execution requests.

use crate::error::{FluidError, Result};
use crate::inference::InferenceService;
use crate::schema::{ApiRequest, TaskDescriptor};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Turns a task descriptor into a validated [`ApiRequest`].
pub struct TaskInterpreter {
    inference: Arc<dyn InferenceService>,
}

impl TaskInterpreter {
    /// Create an interpreter over the given inference handle.
    pub fn new(inference: Arc<dyn InferenceService>) -> Self {
        Self { inference }
    }

    /// Interpret the task into a request.
    ///
    /// A backend reply that is not JSON at all is [`FluidError::Inference`]
    /// (retryable: a fresh inference round may produce parseable output). A
    /// JSON object violating the schema is [`FluidError::Validation`] (fatal)
    /// carrying the offending field and the raw reply. No partial repair is
    /// attempted beyond the documented defaults: missing headers become an
    /// empty map, a missing body stays null.
    pub async fn interpret(&self, task: &TaskDescriptor) -> Result<ApiRequest> {
        let reply = self.inference.generate(task).await?;
        debug!(bytes = reply.len(), "parsing inference output");

        let stripped = strip_code_fences(&reply);
        let value: Value = serde_json::from_str(stripped).map_err(|e| {
            FluidError::Inference(format!("inference output is not valid JSON: {e}"))
        })?;

        let request = request_from_value(&value, &reply)?;
        request.validate().map_err(|err| attach_raw(err, &reply))?;
        Ok(request)
    }
}

/// Extract the request fields from the parsed reply, naming the offending
/// field on any schema violation.
fn request_from_value(value: &Value, raw: &str) -> Result<ApiRequest> {
    let object = value
        .as_object()
        .ok_or_else(|| violation("request", "inference output is not a JSON object", raw))?;

    let method = object
        .get("method")
        .ok_or_else(|| violation("method", "required field is missing", raw))?
        .as_str()
        .ok_or_else(|| violation("method", "must be a string", raw))?
        .to_string();

    let url = object
        .get("url")
        .ok_or_else(|| violation("url", "required field is missing", raw))?
        .as_str()
        .ok_or_else(|| violation("url", "must be a string", raw))?
        .to_string();

    let mut headers = HashMap::new();
    match object.get("headers") {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (name, header_value) in map {
                let header_value = header_value
                    .as_str()
                    .ok_or_else(|| violation("headers", "header values must be strings", raw))?;
                headers.insert(name.clone(), header_value.to_string());
            }
        }
        Some(_) => return Err(violation("headers", "must be an object", raw)),
    }

    let body = object.get("body").cloned().unwrap_or(Value::Null);

    Ok(ApiRequest {
        method,
        url,
        headers,
        body,
    })
}

/// Strip a surrounding markdown code fence, if present.
fn strip_code_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening fence line.
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn violation(field: &str, message: &str, raw: &str) -> FluidError {
    FluidError::Validation {
        field: field.to_string(),
        message: message.to_string(),
        raw: raw.to_string(),
    }
}

fn attach_raw(err: FluidError, raw: &str) -> FluidError {
    match err {
        FluidError::Validation { field, message, .. } => FluidError::Validation {
            field,
            message,
            raw: raw.to_string(),
        },
        other => other,
    }
}
