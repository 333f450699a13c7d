//! Workflow scheduler
//!
//! Drives the stages of a validated `WorkflowSpec` against the task executor
//! and a run-scoped `ExecutionContext`. Stages run strictly in list order.
//! Sequential stages substitute each task's prompt against the live context
//! immediately before dispatch; parallel stages substitute every prompt
//! against the context as it stood at stage entry, dispatch concurrently,
//! and hold a hard barrier: nothing is written back until every sibling has
//! reached a terminal state, and stage N+1 never starts before stage N's
//! barrier is satisfied.
//!
//! The caller always gets a `RunResult` carrying whatever variables were
//! produced plus the structured error list, never a bare error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::model::ModelId;
use crate::domain::workflow::{
    ErrorKind, ExecutionContext, RunResult, RunStatus, StageKind, TaskExecution, TaskFailure,
    TaskSpec, WorkflowError, WorkflowSpec,
};
use crate::infrastructure::executor::{InvokeFailure, TaskExecutor, TaskOutcome};

/// Scheduler tuning knobs
#[derive(Debug, Clone)]
pub struct WorkflowSchedulerConfig {
    /// Wall-clock budget for one run
    pub run_timeout: Duration,
    /// Process-wide cap on concurrently active runs
    pub max_concurrent_runs: usize,
}

impl Default for WorkflowSchedulerConfig {
    fn default() -> Self {
        Self {
            run_timeout: Duration::from_secs(300),
            max_concurrent_runs: 32,
        }
    }
}

/// Executes workflow runs; one instance is shared by all callers
#[derive(Debug)]
pub struct WorkflowScheduler {
    executor: Arc<TaskExecutor>,
    admission: Arc<Semaphore>,
    run_timeout: Duration,
}

impl WorkflowScheduler {
    pub fn new(executor: Arc<TaskExecutor>, config: WorkflowSchedulerConfig) -> Self {
        Self {
            executor,
            admission: Arc::new(Semaphore::new(config.max_concurrent_runs)),
            run_timeout: config.run_timeout,
        }
    }

    /// Execute a workflow against seed variables
    pub async fn run(&self, spec: &WorkflowSpec, seed: HashMap<String, String>) -> RunResult {
        let run_id = Uuid::new_v4();
        let started = Instant::now();

        if let Err(error) = spec.validate() {
            warn!(%run_id, %error, "rejecting invalid workflow spec");
            return RunResult {
                run_id,
                status: RunStatus::Failed,
                variables: seed,
                tasks: Vec::new(),
                errors: vec![TaskFailure {
                    task: "workflow".to_string(),
                    model: None,
                    error_kind: ErrorKind::Schema,
                    message: error.to_string(),
                }],
                total_latency_ms: started.elapsed().as_millis() as u64,
            };
        }

        let Ok(_permit) = self.admission.clone().acquire_owned().await else {
            return RunResult {
                run_id,
                status: RunStatus::Failed,
                variables: seed,
                tasks: Vec::new(),
                errors: vec![TaskFailure {
                    task: "workflow".to_string(),
                    model: None,
                    error_kind: ErrorKind::Internal,
                    message: "run admission closed".to_string(),
                }],
                total_latency_ms: started.elapsed().as_millis() as u64,
            };
        };

        let deadline = started + self.run_timeout;
        let mut run = RunState {
            ctx: ExecutionContext::with_variables(seed),
            tasks: Vec::new(),
            errors: Vec::new(),
            failed: false,
        };

        info!(%run_id, stages = spec.stages.len(), tasks = spec.task_count(), "run started");

        for (stage_index, stage) in spec.stages.iter().enumerate() {
            if Instant::now() >= deadline {
                run.record_run_timeout(self.run_timeout);
                break;
            }

            debug!(%run_id, stage = stage_index, kind = ?stage.kind, "executing stage");

            match stage.kind {
                StageKind::Sequential => {
                    self.run_sequential_stage(stage.tasks.as_slice(), deadline, &mut run)
                        .await;
                }
                StageKind::Parallel => {
                    self.run_parallel_stage(stage.tasks.as_slice(), deadline, &mut run)
                        .await;
                }
            }

            if run.failed {
                break;
            }
        }

        let status = if run.failed {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };

        info!(
            %run_id,
            ?status,
            executed = run.tasks.len(),
            errors = run.errors.len(),
            "run finished"
        );

        RunResult {
            run_id,
            status,
            variables: run.ctx.into_variables(),
            tasks: run.tasks,
            errors: run.errors,
            total_latency_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Tasks one at a time, each seeing its predecessors' outputs
    async fn run_sequential_stage(
        &self,
        tasks: &[TaskSpec],
        deadline: Instant,
        run: &mut RunState,
    ) {
        for task in tasks {
            if Instant::now() >= deadline {
                run.record_run_timeout(self.run_timeout);
                return;
            }

            let prompt = match run.ctx.render(&task.prompt) {
                Ok(prompt) => prompt,
                Err(error) => {
                    run.record_template_failure(task, error);
                    if run.failed {
                        return;
                    }
                    continue;
                }
            };

            let task_started = Instant::now();
            let result = self
                .executor
                .invoke(&task.model, &prompt, &task.config, deadline)
                .await;

            run.record_invocation(task, result, task_started.elapsed());
            if run.failed {
                return;
            }
        }
    }

    /// Substitute against the stage-entry context, dispatch concurrently,
    /// join all, and only then write results back
    async fn run_parallel_stage(&self, tasks: &[TaskSpec], deadline: Instant, run: &mut RunState) {
        let mut dispatches: Vec<(&TaskSpec, String)> = Vec::new();
        let mut template_failures: Vec<(&TaskSpec, WorkflowError)> = Vec::new();

        for task in tasks {
            match run.ctx.render(&task.prompt) {
                Ok(prompt) => dispatches.push((task, prompt)),
                Err(error) => template_failures.push((task, error)),
            }
        }

        let futures = dispatches.into_iter().map(|(task, prompt)| {
            let executor = self.executor.clone();
            async move {
                let started = Instant::now();
                let result = executor
                    .invoke(&task.model, &prompt, &task.config, deadline)
                    .await;
                (task, result, started.elapsed())
            }
        });

        // Hard barrier: siblings of a failed task still run to completion.
        let results = join_all(futures).await;

        for (task, error) in template_failures {
            run.record_template_failure(task, error);
        }

        for (task, result, latency) in results {
            run.record_invocation(task, result, latency);
        }
    }
}

/// Mutable bookkeeping for one run
struct RunState {
    ctx: ExecutionContext,
    tasks: Vec<TaskExecution>,
    errors: Vec<TaskFailure>,
    failed: bool,
}

impl RunState {
    fn record_invocation(
        &mut self,
        task: &TaskSpec,
        result: Result<TaskOutcome, InvokeFailure>,
        latency: Duration,
    ) {
        match result {
            Ok(outcome) => {
                self.ctx.set(&task.output_variable, outcome.content);
                self.tasks.push(TaskExecution {
                    task: task.output_variable.clone(),
                    requested_model: task.model.clone(),
                    served_by: Some(outcome.served_by),
                    success: true,
                    attempts: outcome.attempts,
                    latency_ms: latency.as_millis() as u64,
                });
            }
            Err(failure) => {
                self.tasks.push(TaskExecution {
                    task: task.output_variable.clone(),
                    requested_model: task.model.clone(),
                    served_by: None,
                    success: false,
                    attempts: failure.attempts,
                    latency_ms: latency.as_millis() as u64,
                });
                self.record_task_failure(
                    task,
                    Some(task.model.clone()),
                    failure.error.kind(),
                    failure.error.to_string(),
                );
            }
        }
    }

    fn record_template_failure(&mut self, task: &TaskSpec, error: WorkflowError) {
        let kind = match error {
            WorkflowError::UpstreamFailed { .. } => ErrorKind::UpstreamFailed,
            _ => ErrorKind::Template,
        };
        self.record_task_failure(task, None, kind, error.to_string());
    }

    fn record_task_failure(
        &mut self,
        task: &TaskSpec,
        model: Option<ModelId>,
        error_kind: ErrorKind,
        message: String,
    ) {
        warn!(task = %task.output_variable, %message, "task failed");

        self.errors.push(TaskFailure {
            task: task.output_variable.clone(),
            model,
            error_kind,
            message,
        });

        if task.config.optional {
            // Non-critical: the run continues, but the variable is poisoned
            // so later references fail with an upstream error.
            self.ctx
                .mark_failed(&task.output_variable, &task.output_variable);
        } else {
            self.failed = true;
        }
    }

    fn record_run_timeout(&mut self, timeout: Duration) {
        let timeout_ms = timeout.as_millis() as u64;
        self.errors.push(TaskFailure {
            task: "workflow".to_string(),
            model: None,
            error_kind: ErrorKind::Timeout,
            message: WorkflowError::run_timeout(timeout_ms).to_string(),
        });
        self.failed = true;
    }
}
