//! Run results: status, produced variables, and structured errors
//!
//! The caller always receives a `RunResult` with whatever variables were
//! produced plus the structured error list, never a bare error with no
//! partial state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::model::ModelId;

/// Lifecycle state of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Classification of a task failure for the structured error list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transient provider failure that survived all retries
    Transient,
    /// Provider rejected the call outright (auth, malformed request)
    Persistent,
    /// Rate-limit tokens did not become available within the wait budget
    RateLimit,
    /// Circuit breaker rejected the call without provider contact
    CircuitOpen,
    /// The run deadline expired
    Timeout,
    /// Template substitution failed
    Template,
    /// The referenced variable's producing task failed
    UpstreamFailed,
    /// The workflow spec failed schema validation
    Schema,
    /// The task named a model the registry does not know
    UnknownModel,
    Internal,
}

/// One attempted entry of a fallback chain, for observability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub model: ModelId,
    /// Provider calls made against this entry (0 if rejected before contact)
    pub calls: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Record of one executed task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskExecution {
    /// The task's output variable, which doubles as its name
    pub task: String,

    /// Model the task asked for
    pub requested_model: ModelId,

    /// Model that actually served the call, after fallback traversal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub served_by: Option<ModelId>,

    pub success: bool,

    /// Every fallback-chain entry that was attempted
    pub attempts: Vec<AttemptRecord>,

    pub latency_ms: u64,
}

/// One entry of the structured error list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFailure {
    pub task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelId>,
    pub error_kind: ErrorKind,
    pub message: String,
}

/// Outcome of one end-to-end workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub status: RunStatus,

    /// Variables produced by the run (including seeds), complete on success,
    /// partial on failure
    pub variables: HashMap<String, String>,

    /// Per-task execution records, in completion order
    pub tasks: Vec<TaskExecution>,

    /// Structured failures, empty on a clean run
    pub errors: Vec<TaskFailure>,

    pub total_latency_ms: u64,
}

impl RunResult {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Record for a task by its output-variable name
    pub fn task(&self, name: &str) -> Option<&TaskExecution> {
        self.tasks.iter().find(|t| t.task == name)
    }

    pub fn executed_task_count(&self) -> usize {
        self.tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str) -> ModelId {
        ModelId::new(id).unwrap()
    }

    #[test]
    fn test_task_lookup() {
        let result = RunResult {
            run_id: Uuid::new_v4(),
            status: RunStatus::Completed,
            variables: HashMap::new(),
            tasks: vec![TaskExecution {
                task: "benefits".to_string(),
                requested_model: model("thinking"),
                served_by: Some(model("backup")),
                success: true,
                attempts: vec![],
                latency_ms: 12,
            }],
            errors: vec![],
            total_latency_ms: 12,
        };

        assert!(result.is_completed());
        let task = result.task("benefits").unwrap();
        assert_eq!(task.served_by.as_ref().unwrap().as_str(), "backup");
        assert!(result.task("missing").is_none());
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::CircuitOpen).unwrap();
        assert_eq!(json, "\"circuit_open\"");

        let json = serde_json::to_string(&ErrorKind::UpstreamFailed).unwrap();
        assert_eq!(json, "\"upstream_failed\"");
    }
}
