//! Top-level request orchestration
//!
//! The control flow of the whole system: classify the request, then either
//! answer it with one resilient call (Low/Medium and forced routes) or, for
//! High requests, acknowledge immediately, ask the planner for a workflow,
//! run it, and assemble the final answer from the run's variables.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::domain::error::DomainError;
use crate::domain::model::ModelId;
use crate::domain::routing::{Category, IncomingRequest, RouteDecision};
use crate::domain::session::{SessionEntry, SessionStore};
use crate::domain::workflow::{RunResult, TaskConfig};
use crate::infrastructure::classifier::RequestClassifier;
use crate::infrastructure::executor::TaskExecutor;
use crate::infrastructure::generator::WorkflowGenerator;
use crate::infrastructure::scheduler::WorkflowScheduler;

/// What the caller gets back for one request
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorResponse {
    pub category: Category,
    pub answer: String,
    /// Present for orchestrated requests: the full run record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<RunResult>,
}

/// Ties the classifier, generator, scheduler, and executor together
#[derive(Debug)]
pub struct Orchestrator {
    classifier: RequestClassifier,
    generator: WorkflowGenerator,
    scheduler: Arc<WorkflowScheduler>,
    executor: Arc<TaskExecutor>,
    fast_response_model: ModelId,
    request_timeout: Duration,
    sessions: Option<Arc<dyn SessionStore>>,
}

impl Orchestrator {
    pub fn new(
        classifier: RequestClassifier,
        generator: WorkflowGenerator,
        scheduler: Arc<WorkflowScheduler>,
        executor: Arc<TaskExecutor>,
        fast_response_model: ModelId,
        request_timeout: Duration,
    ) -> Self {
        Self {
            classifier,
            generator,
            scheduler,
            executor,
            fast_response_model,
            request_timeout,
            sessions: None,
        }
    }

    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Process one request end to end
    pub async fn process_request(
        &self,
        request: IncomingRequest,
    ) -> Result<OrchestratorResponse, DomainError> {
        let deadline = Instant::now() + self.request_timeout;
        let decision = self.classifier.classify(&request, deadline).await?;

        let response = match decision {
            RouteDecision::Direct { category, model } => {
                info!(%category, %model, "direct route");

                let outcome = self
                    .executor
                    .invoke(&model, &request.text, &TaskConfig::default(), deadline)
                    .await
                    .map_err(|failure| DomainError::provider(failure.error.to_string()))?;

                OrchestratorResponse {
                    category,
                    answer: outcome.content,
                    run: None,
                }
            }
            RouteDecision::Orchestrated => self.run_orchestrated(&request, deadline).await?,
        };

        if let (Some(store), Some(session_id)) = (&self.sessions, &request.session_id) {
            store
                .append(session_id, SessionEntry::user(&request.text))
                .await?;
            store
                .append(session_id, SessionEntry::assistant(&response.answer))
                .await?;
        }

        Ok(response)
    }

    async fn run_orchestrated(
        &self,
        request: &IncomingRequest,
        deadline: Instant,
    ) -> Result<OrchestratorResponse, DomainError> {
        info!("orchestrated route");

        // Immediate acknowledgment while the workflow runs; losing it is not
        // worth failing the request over.
        let ack_prompt = format!(
            "User requested: {}. Acknowledge that you're working on it.",
            request.text
        );
        let ack = match self
            .executor
            .invoke(
                &self.fast_response_model,
                &ack_prompt,
                &TaskConfig::default(),
                deadline,
            )
            .await
        {
            Ok(outcome) => outcome.content,
            Err(failure) => {
                warn!(error = %failure.error, "fast response failed");
                String::new()
            }
        };

        let spec = self.generator.generate(&request.text, deadline).await?;

        let mut seed = HashMap::new();
        seed.insert("user_message".to_string(), request.text.clone());

        let result = self.scheduler.run(&spec, seed).await;
        let answer = assemble_answer(&ack, &result);

        Ok(OrchestratorResponse {
            category: Category::High,
            answer,
            run: Some(result),
        })
    }
}

/// Build the final answer text from the acknowledgment and the run outcome
fn assemble_answer(ack: &str, result: &RunResult) -> String {
    let body = if result.is_completed() {
        match result.variables.get("completion_message") {
            Some(message) => message.clone(),
            None => {
                let produced: HashMap<&String, &String> = result
                    .variables
                    .iter()
                    .filter(|(name, _)| name.as_str() != "user_message")
                    .collect();
                let dump = serde_json::to_string_pretty(&produced).unwrap_or_default();
                format!("Results:\n{dump}")
            }
        }
    } else {
        let summary = result
            .errors
            .first()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "unknown error".to_string());
        format!("Error during execution: {summary}")
    };

    if ack.is_empty() {
        body
    } else {
        format!("{ack}\n\n{body}")
    }
}
