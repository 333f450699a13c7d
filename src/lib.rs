//! LLM Orchestrator
//!
//! Classifies incoming requests by complexity and, for complex ones, executes
//! a generated multi-step workflow of provider calls, with:
//! - Sequential and parallel stages with hard barrier joins
//! - `{variable}` template substitution threading data between tasks
//! - Per-provider token-bucket rate limiting
//! - Per-model circuit breakers with half-open trial calls
//! - Exponential-backoff retries and ordered model fallback chains

pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::{IncomingRequest, RunResult};
pub use infrastructure::{Orchestrator, OrchestratorResponse};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use domain::llm::{MediaParams, ProviderKind};
use domain::model::{InMemoryModelRegistry, Model, ModelConfig, ModelId, RateLimitParams};
use infrastructure::executor::{TaskExecutor, TaskExecutorConfig};
use infrastructure::llm::{ProviderFactory, StaticProviderResolver};
use infrastructure::resilience::{ProviderStateRegistry, RetryPolicy};
use infrastructure::scheduler::{WorkflowScheduler, WorkflowSchedulerConfig};
use infrastructure::session::InMemorySessionStore;
use infrastructure::{RequestClassifier, WorkflowGenerator};

/// Build a fully wired orchestrator from configuration
///
/// Provider credentials come from the environment (`OPENROUTER_API_KEY`,
/// `GOOGLE_AI_API_KEY`); `.env` files are honored.
pub async fn build_orchestrator(config: &AppConfig) -> anyhow::Result<Orchestrator> {
    dotenvy::dotenv().ok();

    let resolver = StaticProviderResolver::new()
        .with_provider(ProviderFactory::openrouter_from_env()?)
        .with_provider(ProviderFactory::google_ai_from_env()?);

    let mut rate_limits = HashMap::new();
    for provider in [ProviderKind::OpenRouter, ProviderKind::GoogleAi] {
        rate_limits.insert(
            provider,
            RateLimitParams::new(config.rate_limits.requests_per_minute(provider.as_str())),
        );
    }

    let registry = Arc::new(
        InMemoryModelRegistry::new(default_models())
            .with_fallbacks(default_fallbacks())
            .with_rate_limits(rate_limits)
            .with_addons(default_addons()),
    );

    let states = Arc::new(ProviderStateRegistry::new(config.circuit_breaker.clone()));

    let executor = Arc::new(TaskExecutor::new(
        registry,
        Arc::new(resolver),
        states,
        RetryPolicy::from_config(&config.retry),
        TaskExecutorConfig {
            rate_limit_wait: Duration::from_secs(config.scheduler.rate_limit_wait_secs),
        },
    ));

    let run_timeout = Duration::from_secs(config.scheduler.run_timeout_secs);

    let scheduler = Arc::new(WorkflowScheduler::new(
        executor.clone(),
        WorkflowSchedulerConfig {
            run_timeout,
            max_concurrent_runs: config.scheduler.max_concurrent_runs,
        },
    ));

    let classifier = RequestClassifier::new(
        executor.clone(),
        &config.routing,
        config.limits.clone(),
    )?;

    let planning_model = ModelId::new(config.routing.planning_model.as_str())
        .map_err(|e| anyhow::anyhow!("invalid planning model id: {e}"))?;
    let plan_fallback_model = ModelId::new(config.routing.low_model.as_str())
        .map_err(|e| anyhow::anyhow!("invalid low-route model id: {e}"))?;
    let fast_response_model = ModelId::new(config.routing.fast_response_model.as_str())
        .map_err(|e| anyhow::anyhow!("invalid fast-response model id: {e}"))?;

    let generator = WorkflowGenerator::new(
        executor.clone(),
        planning_model,
        plan_fallback_model,
        &config.generator,
    );

    info!("orchestrator wired");

    Ok(Orchestrator::new(
        classifier,
        generator,
        scheduler,
        executor,
        fast_response_model,
        run_timeout,
    )
    .with_session_store(Arc::new(InMemorySessionStore::new())))
}

// ============================================================================
// Default Registry Seeds
// ============================================================================

fn model_id(id: &str) -> ModelId {
    ModelId::new(id).expect("default model id is valid")
}

fn default_models() -> Vec<Model> {
    vec![
        Model::new(
            model_id("categorizer"),
            "Categorizer",
            ProviderKind::OpenRouter,
            "meta-llama/llama-3.1-8b-instruct",
        )
        .with_config(ModelConfig::new().with_temperature(0.3).with_max_tokens(10))
        .with_system_prompt(
            "Classify the user's request by complexity. Respond with exactly one \
             letter: L for a simple request a single model answers directly, M for \
             a moderately involved request, H for a request that needs multiple \
             coordinated steps or media generation. Respond with the letter only.",
        ),
        Model::new(
            model_id("thinking"),
            "Thinking AI",
            ProviderKind::OpenRouter,
            "deepseek/deepseek-r1",
        )
        .with_config(ModelConfig::new().with_temperature(0.7).with_max_tokens(4000)),
        Model::new(
            model_id("medium"),
            "Medium AI",
            ProviderKind::OpenRouter,
            "openai/gpt-4o-mini",
        )
        .with_config(ModelConfig::new().with_temperature(0.7).with_max_tokens(2000)),
        Model::new(
            model_id("master-planner"),
            "Master Planner",
            ProviderKind::OpenRouter,
            "deepseek/deepseek-chat-v3",
        )
        .with_config(ModelConfig::new().with_temperature(0.7).with_max_tokens(4000))
        .with_system_prompt(
            "You decompose requests into JSON workflows. Output a JSON object of \
             the form {\"stages\": [{\"kind\": \"sequential\" | \"parallel\", \
             \"tasks\": [{\"model\": string, \"prompt\": string, \
             \"output_variable\": string, \"config\": {\"temperature\": number, \
             \"addons\": [string], \"max_tokens\": number, \"optional\": bool}}]}]}. \
             Prompts may reference earlier output variables as {name}. Available \
             models: thinking, medium, imagen, veo. Store the user-facing summary \
             in the variable completion_message. Output ONLY the JSON.",
        ),
        Model::new(
            model_id("fast-response"),
            "Fast Response",
            ProviderKind::OpenRouter,
            "meta-llama/llama-3.1-8b-instruct",
        )
        .with_config(ModelConfig::new().with_temperature(0.7).with_max_tokens(200)),
        Model::new(
            model_id("high-capacity"),
            "High Capacity",
            ProviderKind::OpenRouter,
            "google/gemini-2.5-pro",
        )
        .with_config(ModelConfig::new().with_temperature(0.7).with_max_tokens(8000)),
        Model::new(
            model_id("imagen"),
            "Imagen",
            ProviderKind::GoogleAi,
            "imagen-4.0-generate-001",
        )
        .with_media_capable(true)
        .with_config(ModelConfig::new().with_media(MediaParams {
            aspect_ratio: Some("1:1".to_string()),
            num_images: Some(1),
            ..Default::default()
        })),
        Model::new(
            model_id("veo"),
            "Veo",
            ProviderKind::GoogleAi,
            "veo-3.0-generate-001",
        )
        .with_media_capable(true)
        .with_config(ModelConfig::new().with_media(MediaParams {
            aspect_ratio: Some("16:9".to_string()),
            duration_secs: Some(8),
            resolution: Some("1080p".to_string()),
            generate_audio: Some(true),
            ..Default::default()
        })),
    ]
}

fn default_fallbacks() -> HashMap<ModelId, Vec<ModelId>> {
    let mut fallbacks = HashMap::new();
    fallbacks.insert(model_id("thinking"), vec![model_id("medium")]);
    fallbacks.insert(model_id("medium"), vec![model_id("thinking")]);
    fallbacks.insert(
        model_id("master-planner"),
        vec![model_id("high-capacity"), model_id("thinking")],
    );
    fallbacks.insert(model_id("high-capacity"), vec![model_id("thinking")]);
    fallbacks
}

fn default_addons() -> HashMap<String, String> {
    let mut addons = HashMap::new();
    addons.insert(
        "seo".to_string(),
        "Optimize the output for search engines: natural keyword use, clear \
         headings, concise meta-style summary."
            .to_string(),
    );
    addons.insert(
        "brand_voice".to_string(),
        "Write in a confident, friendly brand voice. Avoid jargon.".to_string(),
    );
    addons.insert(
        "concise".to_string(),
        "Keep the output as short as possible without losing substance.".to_string(),
    );
    addons
}
