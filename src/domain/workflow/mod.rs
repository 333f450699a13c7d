//! Workflow domain: specs, execution context, results, and errors

mod context;
mod entity;
mod error;
mod result;

pub use context::{placeholder_names, ExecutionContext};
pub use entity::{Stage, StageKind, TaskConfig, TaskSpec, WorkflowSpec};
pub use error::WorkflowError;
pub use result::{
    AttemptRecord, ErrorKind, RunResult, RunStatus, TaskExecution, TaskFailure,
};
