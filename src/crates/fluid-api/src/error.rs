//! Error types for the request pipeline.

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, FluidError>;

/// Errors that can occur while generating, validating, or executing a request.
///
/// Variants are split into two classes checked by the retry controller:
/// retryable (transient, eligible for automatic re-attempt) and fatal
/// (propagated immediately). [`FluidError::ExhaustedRetries`] is a terminal
/// wrapper produced only when the attempt budget is spent.
#[derive(Debug, Error)]
pub enum FluidError {
    /// Generated request does not conform to the request schema. Fatal.
    ///
    /// Carries the offending field and the raw inference output that
    /// produced it.
    #[error("validation failed for field `{field}`: {message}")]
    Validation {
        field: String,
        message: String,
        raw: String,
    },

    /// Inference backend unreachable, timed out, or returned output that
    /// could not be parsed. Retryable.
    #[error("inference failed: {0}")]
    Inference(String),

    /// Network-level failure executing the HTTP request (DNS, connection
    /// refused, TLS, timeout). Retryable. A 4xx/5xx status on a completed
    /// exchange is not a transport failure.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Inference backend rejected the credential. Fatal.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Missing or invalid configuration (e.g. API key not set). Fatal.
    #[error("configuration error: {0}")]
    Config(String),

    /// Retry budget spent; wraps the last underlying failure.
    #[error("retries exhausted after {attempts} attempts: {source}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        source: Box<FluidError>,
    },
}

impl FluidError {
    /// Check if this error is transient and eligible for retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FluidError::Inference(_) | FluidError::Transport(_))
    }

    /// Check if this error aborts the retry loop immediately.
    pub fn is_fatal(&self) -> bool {
        !self.is_retryable()
    }

    /// Total attempts made, if this is an exhausted-retries wrapper.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            FluidError::ExhaustedRetries { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let validation = FluidError::Validation {
            field: "method".to_string(),
            message: "unrecognized verb".to_string(),
            raw: "{}".to_string(),
        };
        assert!(validation.is_fatal());
        assert!(!validation.is_retryable());

        assert!(FluidError::Inference("timeout".to_string()).is_retryable());
        assert!(FluidError::Auth("bad key".to_string()).is_fatal());
        assert!(FluidError::Config("no key".to_string()).is_fatal());
    }

    #[test]
    fn test_exhausted_carries_attempts() {
        let err = FluidError::ExhaustedRetries {
            attempts: 3,
            source: Box::new(FluidError::Inference("unreachable".to_string())),
        };
        assert_eq!(err.attempts(), Some(3));
        assert!(err.is_fatal());
        assert!(err.to_string().contains("3 attempts"));
    }
}
