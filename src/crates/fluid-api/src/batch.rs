//! Batch outcome types and cancellation.
//!
//! A batch runs its tasks strictly in input order, one at a time; failures
//! are captured per slot and never abort sibling tasks. The sequential
//! design favors deterministic, debuggable ordering over throughput.

use crate::error::{FluidError, Result};
use crate::schema::ApiResponse;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Result slot for one task in a batch.
#[derive(Debug)]
pub struct TaskOutcome {
    /// The originating task text.
    pub task: String,

    /// Success or the captured failure for this task.
    pub result: Result<ApiResponse>,
}

impl TaskOutcome {
    /// Whether this task produced a response.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The response, if the task succeeded.
    pub fn response(&self) -> Option<&ApiResponse> {
        self.result.as_ref().ok()
    }

    /// The captured failure, if the task failed.
    pub fn error(&self) -> Option<&FluidError> {
        self.result.as_ref().err()
    }
}

/// Complete, order-preserving record of per-task results for a batch run.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    outcomes: Vec<TaskOutcome>,
}

impl BatchOutcome {
    pub(crate) fn push(&mut self, outcome: TaskOutcome) {
        self.outcomes.push(outcome)
    }

    /// Number of tasks that ran.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Outcomes in original task order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter()
    }

    /// Outcome for the task at `index`, in original order.
    pub fn get(&self, index: usize) -> Option<&TaskOutcome> {
        self.outcomes.get(index)
    }

    /// Count of successful tasks.
    pub fn successes(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Count of failed tasks.
    pub fn failures(&self) -> usize {
        self.outcomes.len() - self.successes()
    }

    /// Serialize every slot: successes carry the full response record,
    /// failures carry the error text.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.outcomes
                .iter()
                .map(|outcome| match &outcome.result {
                    Ok(response) => json!({
                        "task": outcome.task,
                        "result": response,
                        "error": Value::Null,
                    }),
                    Err(err) => json!({
                        "task": outcome.task,
                        "result": Value::Null,
                        "error": err.to_string(),
                    }),
                })
                .collect(),
        )
    }
}

impl IntoIterator for BatchOutcome {
    type Item = TaskOutcome;
    type IntoIter = std::vec::IntoIter<TaskOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}

/// Cancellation handle for an in-flight batch.
///
/// Cancellation is observed only between tasks, never mid-task, so a
/// partially retried HTTP call is never left in an undefined state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the batch after the current task.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            info!("batch cancellation requested");
        }
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ApiRequest, ResponseBody};
    use std::collections::HashMap;

    fn success_outcome(task: &str) -> TaskOutcome {
        TaskOutcome {
            task: task.to_string(),
            result: Ok(ApiResponse {
                request: ApiRequest::new("GET", "https://a.example/x"),
                response: ResponseBody::Json(json!({"ok": true})),
                status_code: 200,
                elapsed_time: 0.1,
                metadata: HashMap::new(),
            }),
        }
    }

    fn failure_outcome(task: &str) -> TaskOutcome {
        TaskOutcome {
            task: task.to_string(),
            result: Err(FluidError::Validation {
                field: "url".to_string(),
                message: "required field is missing".to_string(),
                raw: "{}".to_string(),
            }),
        }
    }

    #[test]
    fn test_outcome_accounting_preserves_order() {
        let mut batch = BatchOutcome::default();
        batch.push(success_outcome("one"));
        batch.push(failure_outcome("two"));
        batch.push(success_outcome("three"));

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.successes(), 2);
        assert_eq!(batch.failures(), 1);

        let tasks: Vec<&str> = batch.iter().map(|o| o.task.as_str()).collect();
        assert_eq!(tasks, ["one", "two", "three"]);
        assert!(batch.get(0).unwrap().is_success());
        assert!(!batch.get(1).unwrap().is_success());
        assert!(batch.get(1).unwrap().error().is_some());
    }

    #[test]
    fn test_to_json_keeps_failed_slots() {
        let mut batch = BatchOutcome::default();
        batch.push(success_outcome("one"));
        batch.push(failure_outcome("two"));

        let value = batch.to_json();
        let slots = value.as_array().unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0]["result"]["status_code"], 200);
        assert!(slots[0]["error"].is_null());
        assert!(slots[1]["result"].is_null());
        assert!(slots[1]["error"].as_str().unwrap().contains("url"));
    }

    #[test]
    fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
