//! Configuration for the pipeline and its inference backend.

use crate::error::{FluidError, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the inference backend credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default inference backend base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model used for request generation.
pub const DEFAULT_MODEL: &str = "gpt-4.1";

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Configuration for the inference backend connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// API key for authentication.
    pub api_key: String,

    /// Base URL for the API.
    pub base_url: String,

    /// Model name/identifier.
    pub model: String,

    /// Request timeout duration.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl InferenceConfig {
    /// Create a new inference configuration.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            timeout: default_timeout(),
        }
    }

    /// Create configuration from the [`API_KEY_ENV`] environment variable.
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| FluidError::Config(format!("environment variable {API_KEY_ENV} not set")))?;
        Ok(Self::new(api_key, model))
    }

    /// Set the backend base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Options for a pipeline instance.
#[derive(Debug, Clone)]
pub struct FluidConfig {
    /// Model used for request generation.
    pub model: String,

    /// Reference text describing the target API, injected into every task.
    pub documentation: Option<String>,

    /// Return response bodies verbatim instead of decoding them.
    pub raw: bool,

    /// Emit step-level diagnostics at info level. No behavioral change.
    pub verbose: bool,

    /// Retry policy applied around each full interpret+execute attempt.
    pub retry: RetryPolicy,
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            documentation: None,
            raw: false,
            verbose: false,
            retry: RetryPolicy::default(),
        }
    }
}

impl FluidConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the inference model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Attach API documentation used for every task.
    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }

    /// Return response bodies verbatim.
    pub fn with_raw(mut self, raw: bool) -> Self {
        self.raw = raw;
        self
    }

    /// Enable step-level diagnostics.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
