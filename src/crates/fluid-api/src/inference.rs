//! Inference service port and its chat-completions implementation.
//!
//! The inference backend is the only component that understands natural
//! language. It is treated as an untrusted oracle: whatever it returns goes
//! through the same strict validator as directly-supplied input (see
//! [`crate::interpreter`]).

use crate::config::InferenceConfig;
use crate::error::{FluidError, Result};
use crate::schema::TaskDescriptor;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// System prompt constraining the backend to emit a request-schema JSON object.
pub const REQUEST_SYS_PROMPT: &str = r#"You are an intelligent API agent. Your sole task is to interpret user instructions and generate a JSON object that defines an API request.
The JSON must strictly follow this structure:

{
    "method": "HTTP_METHOD", // GET, POST, PUT, PATCH, DELETE
    "url": "API_ENDPOINT_URL", // Fully qualified API URL
    "headers": {
        "Content-Type": "application/json",
        "Authorization": "Bearer <token>" // Optional
    },
    "body": {
        "key1": "value1" // Key-value pairs for POST, PUT, or PATCH requests
    }
}

Guidelines:
1. Always use HTTP methods appropriate for the task: GET for fetching data, POST for creating data, PUT or PATCH for updating data, DELETE for deleting data.
2. Include a valid, fully qualified API URL in the "url" field.
3. Populate the "headers" field with standard headers such as "Content-Type", and "Authorization" if necessary.
4. For GET requests, leave the "body" field as an empty object: {}.
5. Provide accurate key-value pairs in the "body" for other methods.
6. Do not include any additional text, comments, or explanations outside of the JSON response.
7. Ensure the JSON is valid and properly formatted.

Example Task: "Generate an API request to fetch weather data for New York from https://api.weather.com/v3/weather."
Example Output:
{
    "method": "GET",
    "url": "https://api.weather.com/v3/weather",
    "headers": {
        "Content-Type": "application/json"
    },
    "body": {}
}
Your response must always be a valid JSON object."#;

/// Text-to-structure oracle producing a candidate request from natural
/// language.
///
/// Implementations are network-bound and non-deterministic; callers must not
/// trust the output as pre-validated.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Generate a best-effort request-schema instance for the task.
    ///
    /// Returns the backend's textual reply. Backend unreachability, timeouts,
    /// and malformed backend responses are [`FluidError::Inference`]
    /// (retryable); rejected credentials are [`FluidError::Auth`] (fatal).
    async fn generate(&self, task: &TaskDescriptor) -> Result<String>;
}

/// Chat-completions client for OpenAI-compatible inference backends.
#[derive(Clone)]
pub struct OpenAiInference {
    config: InferenceConfig,
    client: Client,
}

impl OpenAiInference {
    /// Create a client for the given backend configuration.
    pub fn new(config: InferenceConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    /// Build the chat messages for a task: schema prompt plus documentation
    /// and hints in the system turn, the instruction in the user turn.
    fn build_messages(&self, task: &TaskDescriptor) -> Vec<ChatMessage> {
        let mut system = REQUEST_SYS_PROMPT.to_string();
        if let Some(documentation) = &task.documentation {
            system.push_str("\n\nAPI Documentation:\n");
            system.push_str(documentation);
        }
        if let Some(hint) = &task.schema_hint {
            system.push_str("\n\nSchema hints:\n");
            system.push_str(hint);
        }

        vec![
            ChatMessage {
                role: "system".to_string(),
                content: system,
            },
            ChatMessage {
                role: "user".to_string(),
                content: task.task.clone(),
            },
        ]
    }
}

#[async_trait]
impl InferenceService for OpenAiInference {
    async fn generate(&self, task: &TaskDescriptor) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let req_body = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: self.build_messages(task),
            temperature: Some(0.0),
            stream: false,
        };

        debug!(model = %self.config.model, "requesting request generation");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&req_body)
            .send()
            .await
            .map_err(|e| FluidError::Inference(format!("inference backend unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => FluidError::Auth(error_text),
                _ => FluidError::Inference(format!("inference backend error {status}: {error_text}")),
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| FluidError::Inference(format!("malformed backend response: {e}")))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| FluidError::Inference("backend returned an empty completion".to_string()))?;

        debug!(bytes = content.len(), "received candidate request");
        Ok(content)
    }
}

// Chat-completions wire types.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
