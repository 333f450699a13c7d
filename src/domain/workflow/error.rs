//! Workflow error types

use thiserror::Error;

/// Errors that can occur while validating or executing a workflow
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("Unresolved variable '{name}' in prompt template")]
    MissingVariable { name: String },

    #[error("Variable '{variable}' is unavailable: upstream task '{task}' failed")]
    UpstreamFailed { variable: String, task: String },

    #[error("Task '{task}' failed: {message}")]
    TaskExecution { task: String, message: String },

    #[error("Run exceeded its deadline of {timeout_ms}ms")]
    RunTimeout { timeout_ms: u64 },

    #[error("Run admission unavailable: {0}")]
    Admission(String),
}

impl WorkflowError {
    pub fn schema_validation(message: impl Into<String>) -> Self {
        Self::SchemaValidation(message.into())
    }

    pub fn missing_variable(name: impl Into<String>) -> Self {
        Self::MissingVariable { name: name.into() }
    }

    pub fn upstream_failed(variable: impl Into<String>, task: impl Into<String>) -> Self {
        Self::UpstreamFailed {
            variable: variable.into(),
            task: task.into(),
        }
    }

    pub fn task_execution(task: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TaskExecution {
            task: task.into(),
            message: message.into(),
        }
    }

    pub fn run_timeout(timeout_ms: u64) -> Self {
        Self::RunTimeout { timeout_ms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WorkflowError::missing_variable("benefits");
        assert_eq!(
            err.to_string(),
            "Unresolved variable 'benefits' in prompt template"
        );

        let err = WorkflowError::upstream_failed("summary", "summarize");
        assert_eq!(
            err.to_string(),
            "Variable 'summary' is unavailable: upstream task 'summarize' failed"
        );

        let err = WorkflowError::run_timeout(300_000);
        assert_eq!(err.to_string(), "Run exceeded its deadline of 300000ms");
    }
}
