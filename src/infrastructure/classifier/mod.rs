//! Request classifier
//!
//! Applies the routing rules in order: absolute context ceiling (reject),
//! media attachments (media route), high-capacity threshold (forced route),
//! then a categorizer-model call for everything else. The categorizer call
//! goes through the task executor, so classification itself is rate-limited,
//! circuit-guarded, and retried like any other call.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{ContextLimits, RoutingConfig};
use crate::domain::error::DomainError;
use crate::domain::model::ModelId;
use crate::domain::routing::{Category, IncomingRequest, RouteDecision};
use crate::domain::workflow::TaskConfig;
use crate::infrastructure::executor::TaskExecutor;

/// Route model ids, validated once at construction
#[derive(Debug, Clone)]
struct RouteTable {
    categorizer: ModelId,
    low: ModelId,
    medium: ModelId,
    media: ModelId,
    high_capacity: ModelId,
}

impl RouteTable {
    fn from_config(routing: &RoutingConfig) -> Result<Self, DomainError> {
        let parse = |id: &str| {
            ModelId::new(id)
                .map_err(|e| DomainError::configuration(format!("invalid route model '{id}': {e}")))
        };

        Ok(Self {
            categorizer: parse(&routing.categorizer_model)?,
            low: parse(&routing.low_model)?,
            medium: parse(&routing.medium_model)?,
            media: parse(&routing.media_model)?,
            high_capacity: parse(&routing.high_capacity_model)?,
        })
    }
}

/// Assigns a complexity category and route to incoming requests
#[derive(Debug)]
pub struct RequestClassifier {
    executor: Arc<TaskExecutor>,
    routes: RouteTable,
    limits: ContextLimits,
}

impl RequestClassifier {
    pub fn new(
        executor: Arc<TaskExecutor>,
        routing: &RoutingConfig,
        limits: ContextLimits,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            executor,
            routes: RouteTable::from_config(routing)?,
            limits,
        })
    }

    /// Classify a request, or reject it outright
    pub async fn classify(
        &self,
        request: &IncomingRequest,
        deadline: Instant,
    ) -> Result<RouteDecision, DomainError> {
        // The ceiling comes first: a request nothing can process must be
        // rejected before any forced route could claim it.
        if request.context_tokens > self.limits.max_context_tokens {
            return Err(DomainError::context_too_large(
                request.context_tokens,
                self.limits.max_context_tokens,
            ));
        }

        if request.has_media() {
            debug!("media attachment forces the media route");
            return Ok(RouteDecision::Direct {
                category: Category::Low,
                model: self.routes.media.clone(),
            });
        }

        if request.context_tokens > self.limits.high_capacity_tokens {
            debug!(
                tokens = request.context_tokens,
                "context size forces the high-capacity route"
            );
            return Ok(RouteDecision::Direct {
                category: Category::Low,
                model: self.routes.high_capacity.clone(),
            });
        }

        let category = self.categorize_text(&request.text, deadline).await?;
        debug!(%category, "request categorized");

        Ok(match category {
            Category::Low => RouteDecision::Direct {
                category,
                model: self.routes.low.clone(),
            },
            Category::Medium => RouteDecision::Direct {
                category,
                model: self.routes.medium.clone(),
            },
            Category::High => RouteDecision::Orchestrated,
        })
    }

    async fn categorize_text(
        &self,
        text: &str,
        deadline: Instant,
    ) -> Result<Category, DomainError> {
        let config = TaskConfig {
            temperature: Some(0.3),
            ..Default::default()
        };

        let outcome = self
            .executor
            .invoke(&self.routes.categorizer, text, &config, deadline)
            .await
            .map_err(|failure| DomainError::provider(failure.error.to_string()))?;

        Ok(outcome.content.trim().parse().unwrap_or_else(|_| {
            warn!(
                raw = %outcome.content.trim(),
                "unparseable category, defaulting to H"
            );
            Category::High
        }))
    }
}
