//! Workflow generator
//!
//! Asks the planning model for a JSON workflow, extracts the JSON from the
//! reply (models wrap it in markdown fences more often than not), and
//! validates it in full before anything executes. What happens on an invalid
//! plan is an explicit, configured policy, not an implicit behavior.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{GeneratorConfig, PlanFallback};
use crate::domain::error::DomainError;
use crate::domain::model::ModelId;
use crate::domain::workflow::{TaskConfig, WorkflowError, WorkflowSpec};
use crate::infrastructure::executor::TaskExecutor;

/// JSON wrapped in a markdown code fence
static FENCED_JSON_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());

/// Raw JSON object anywhere in the text
static RAW_JSON_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Pull the most plausible JSON object out of a model reply
fn extract_json(text: &str) -> &str {
    if let Some(caps) = FENCED_JSON_PATTERN.captures(text) {
        return caps.get(1).map(|m| m.as_str()).unwrap_or(text);
    }

    if let Some(m) = RAW_JSON_PATTERN.find(text) {
        return m.as_str();
    }

    text
}

/// Produces validated workflow specs for high-complexity requests
#[derive(Debug)]
pub struct WorkflowGenerator {
    executor: Arc<TaskExecutor>,
    planning_model: ModelId,
    /// Model used by the single-task degradation plan
    fallback_model: ModelId,
    policy: PlanFallback,
}

impl WorkflowGenerator {
    pub fn new(
        executor: Arc<TaskExecutor>,
        planning_model: ModelId,
        fallback_model: ModelId,
        config: &GeneratorConfig,
    ) -> Self {
        Self {
            executor,
            planning_model,
            fallback_model,
            policy: config.plan_fallback.clone(),
        }
    }

    /// Ask the planning model for a workflow and validate it
    pub async fn generate(
        &self,
        request_text: &str,
        deadline: Instant,
    ) -> Result<WorkflowSpec, DomainError> {
        let prompt = format!(
            "User request: {request_text}\n\n\
             Create a JSON workflow to fulfill this request. Output ONLY valid \
             JSON in the format specified in your system prompt."
        );

        let reply = match self
            .executor
            .invoke(&self.planning_model, &prompt, &TaskConfig::default(), deadline)
            .await
        {
            Ok(outcome) => outcome.content,
            Err(failure) => {
                warn!(error = %failure.error, "planning model call failed");
                return self.fall_back(
                    request_text,
                    WorkflowError::schema_validation(format!(
                        "planning model call failed: {}",
                        failure.error
                    )),
                );
            }
        };

        match self.parse_and_validate(&reply) {
            Ok(spec) => {
                debug!(
                    stages = spec.stages.len(),
                    tasks = spec.task_count(),
                    "generated workflow validated"
                );
                Ok(spec)
            }
            Err(error) => {
                warn!(%error, "generated workflow rejected");
                self.fall_back(request_text, error)
            }
        }
    }

    fn parse_and_validate(&self, reply: &str) -> Result<WorkflowSpec, WorkflowError> {
        let json = extract_json(reply);

        let spec: WorkflowSpec = serde_json::from_str(json)
            .map_err(|e| WorkflowError::schema_validation(format!("invalid workflow JSON: {e}")))?;

        spec.validate()?;
        Ok(spec)
    }

    fn fall_back(
        &self,
        request_text: &str,
        error: WorkflowError,
    ) -> Result<WorkflowSpec, DomainError> {
        match self.policy {
            PlanFallback::SingleTask => {
                debug!("degrading to a single-task plan");
                Ok(WorkflowSpec::single_task(
                    self.fallback_model.clone(),
                    request_text,
                ))
            }
            PlanFallback::Reject => Err(error.into()),
        }
    }
}
