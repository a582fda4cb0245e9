//! The pipeline instance: caller-owned composition of interpreter, executor,
//! and retry controller.
//!
//! A [`FluidApi`] owns its inference handle and HTTP client for the life of
//! the instance: create once, reuse across many sequential calls, tear down
//! by dropping. The inference handle is created lazily on the first call.
//! Sequential reuse is the contract; callers needing unsynchronized
//! concurrency should hold one instance per concurrent caller.

use crate::batch::{BatchOutcome, CancelToken, TaskOutcome};
use crate::config::{FluidConfig, InferenceConfig};
use crate::error::{FluidError, Result};
use crate::executor::RequestExecutor;
use crate::inference::{InferenceService, OpenAiInference};
use crate::interpreter::TaskInterpreter;
use crate::retry::with_retry;
use crate::schema::{ApiResponse, TaskDescriptor};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Generation-validate-execute-retry pipeline over one inference handle and
/// one HTTP client.
pub struct FluidApi {
    config: FluidConfig,
    inference_config: Option<InferenceConfig>,
    inference: OnceCell<Arc<dyn InferenceService>>,
    executor: RequestExecutor,
}

impl FluidApi {
    /// Create a pipeline instance, reading the backend credential from the
    /// environment (see [`crate::config::API_KEY_ENV`]).
    pub fn new(config: FluidConfig) -> Result<Self> {
        let inference_config = InferenceConfig::from_env(&config.model)?;
        Ok(Self {
            inference_config: Some(inference_config),
            inference: OnceCell::new(),
            executor: RequestExecutor::new()?,
            config,
        })
    }

    /// Create a pipeline instance with an explicit backend configuration.
    pub fn with_inference_config(config: FluidConfig, inference_config: InferenceConfig) -> Result<Self> {
        Ok(Self {
            inference_config: Some(inference_config),
            inference: OnceCell::new(),
            executor: RequestExecutor::new()?,
            config,
        })
    }

    /// Create a pipeline instance over an injected inference service.
    pub fn with_inference(config: FluidConfig, inference: Arc<dyn InferenceService>) -> Result<Self> {
        Ok(Self {
            inference_config: None,
            inference: OnceCell::new_with(Some(inference)),
            executor: RequestExecutor::new()?,
            config,
        })
    }

    /// The inference handle, created lazily on first use and reused after.
    async fn inference(&self) -> Result<Arc<dyn InferenceService>> {
        self.inference
            .get_or_try_init(|| async {
                let backend = self.inference_config.clone().ok_or_else(|| {
                    FluidError::Config("no inference backend configured".to_string())
                })?;
                debug!(model = %backend.model, "initializing inference handle");
                let client = OpenAiInference::new(backend)?;
                Ok(Arc::new(client) as Arc<dyn InferenceService>)
            })
            .await
            .map(Arc::clone)
    }

    /// Generate, validate, and execute a request for one task.
    ///
    /// The full attempt (interpretation and execution) runs under the
    /// configured retry policy; the total attempt count is stamped into the
    /// response metadata under `attempts`.
    pub async fn generate_and_execute(&self, task: &str) -> Result<ApiResponse> {
        let mut descriptor = TaskDescriptor::new(task);
        descriptor.documentation = self.config.documentation.clone();

        if self.config.verbose {
            info!(task, "task received");
        }

        let (mut response, attempts) = with_retry(&self.config.retry, || {
            let descriptor = descriptor.clone();
            async move {
                let inference = self.inference().await?;
                let request = TaskInterpreter::new(inference).interpret(&descriptor).await?;
                if self.config.verbose {
                    info!(method = %request.method, url = %request.url, "request generated");
                }
                self.executor.execute(&request, self.config.raw).await
            }
        })
        .await?;

        response
            .metadata
            .insert("attempts".to_string(), Value::from(attempts));

        if self.config.verbose {
            info!(status = response.status_code, attempts, "task completed");
        }
        Ok(response)
    }

    /// Run tasks strictly in input order, isolating per-task failures.
    ///
    /// Every input task gets a slot in the outcome; a failure on one task
    /// never prevents later tasks from running and never discards earlier
    /// results.
    pub async fn run_batch(&self, tasks: &[String]) -> BatchOutcome {
        self.run_batch_inner(tasks, None).await
    }

    /// Like [`FluidApi::run_batch`], but cancellable at task granularity.
    ///
    /// Cancellation is observed only between tasks; the outcome holds the
    /// slots recorded before the cancellation point.
    pub async fn run_batch_with_cancel(&self, tasks: &[String], cancel: &CancelToken) -> BatchOutcome {
        self.run_batch_inner(tasks, Some(cancel)).await
    }

    async fn run_batch_inner(&self, tasks: &[String], cancel: Option<&CancelToken>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        info!(total = tasks.len(), "starting batch");

        for (index, task) in tasks.iter().enumerate() {
            if cancel.is_some_and(|token| token.is_cancelled()) {
                info!(completed = index, total = tasks.len(), "batch cancelled");
                break;
            }

            debug!(current = index + 1, total = tasks.len(), "processing task");
            let result = self.generate_and_execute(task).await;
            if let Err(err) = &result {
                info!(current = index + 1, error = %err, "task failed, continuing batch");
            }
            outcome.push(TaskOutcome {
                task: task.clone(),
                result,
            });
        }

        info!(
            successes = outcome.successes(),
            failures = outcome.failures(),
            "batch completed"
        );
        outcome
    }

    /// Blocking variant of [`FluidApi::generate_and_execute`].
    ///
    /// Spins a current-thread runtime; must not be called from within an
    /// async context.
    pub fn generate_and_execute_blocking(&self, task: &str) -> Result<ApiResponse> {
        blocking_runtime()?.block_on(self.generate_and_execute(task))
    }

    /// Blocking variant of [`FluidApi::run_batch`].
    pub fn run_batch_blocking(&self, tasks: &[String]) -> Result<BatchOutcome> {
        Ok(blocking_runtime()?.block_on(self.run_batch(tasks)))
    }
}

fn blocking_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| FluidError::Config(format!("failed to start runtime: {e}")))
}

/// One-shot convenience: build a pipeline from `config` and run a single task.
pub async fn generate_and_execute(task: &str, config: FluidConfig) -> Result<ApiResponse> {
    FluidApi::new(config)?.generate_and_execute(task).await
}

/// One-shot convenience: build a pipeline from `config` and run a batch.
///
/// The outer `Result` covers pipeline construction only (e.g. a missing
/// credential); per-task failures live in the outcome slots.
pub async fn run_batch(tasks: &[String], config: FluidConfig) -> Result<BatchOutcome> {
    Ok(FluidApi::new(config)?.run_batch(tasks).await)
}
