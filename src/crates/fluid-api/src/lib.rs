//! fluid-api: natural-language API requests.
//!
//! This crate converts a free-text description of a desired HTTP call into a
//! validated, executable request, executes it, and returns a structured
//! result, with retry and batch-processing support.
//!
//! The pipeline has four stages:
//! - **Interpretation** — an inference backend turns the task text (plus any
//!   supplied API documentation) into a candidate request, which is strictly
//!   validated against the request schema ([`interpreter`]).
//! - **Execution** — the validated request is issued over HTTP(S) and the
//!   response normalized into an [`ApiResponse`] ([`executor`]).
//! - **Retry** — the full attempt runs under a bounded backoff loop that
//!   distinguishes retryable failures from fatal ones ([`retry`]).
//! - **Batching** — independent tasks run sequentially with per-task failure
//!   isolation ([`batch`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use fluid_api::{FluidApi, FluidConfig};
//!
//! #[tokio::main]
//! async fn main() -> fluid_api::Result<()> {
//!     // Reads OPENAI_API_KEY from the environment.
//!     let api = FluidApi::new(FluidConfig::new())?;
//!
//!     let response = api
//!         .generate_and_execute("Get a random cat fact from https://catfact.ninja/fact")
//!         .await?;
//!     println!("{}", response.to_json_pretty().unwrap());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Idempotency under retry
//!
//! The retry controller re-runs the whole attempt, including the HTTP call.
//! Retrying a non-idempotent method (a POST with side effects) may duplicate
//! the remote effect; no request deduplication is performed. Callers are
//! responsible for choosing policies accordingly.

pub mod batch;
pub mod config;
pub mod error;
pub mod executor;
pub mod inference;
pub mod interpreter;
pub mod pipeline;
pub mod retry;
pub mod schema;

// Re-export commonly used types
pub use batch::{BatchOutcome, CancelToken, TaskOutcome};
pub use config::{FluidConfig, InferenceConfig};
pub use error::{FluidError, Result};
pub use executor::RequestExecutor;
pub use inference::{InferenceService, OpenAiInference};
pub use interpreter::TaskInterpreter;
pub use pipeline::{generate_and_execute, run_batch, FluidApi};
pub use retry::{with_retry, BackoffStrategy, RetryPolicy};
pub use schema::{ApiRequest, ApiResponse, ResponseBody, TaskDescriptor};
