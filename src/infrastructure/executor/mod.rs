//! Task executor: one model invocation through the full resilience stack
//!
//! Order of operations for each fallback-chain entry: circuit-breaker check
//! (fail fast without provider contact), rate-limiter acquisition (bounded
//! wait), the provider call itself, then the retry loop for transient
//! failures. Persistent failures skip retries and move straight to the next
//! chain entry. Every attempted entry is recorded for observability.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, warn};

use crate::domain::llm::{
    LlmRequest, ProviderError, ProviderKind, ProviderResolver,
};
use crate::domain::model::{Model, ModelId, ModelRegistry};
use crate::domain::workflow::{AttemptRecord, ErrorKind, TaskConfig};
use crate::infrastructure::resilience::{
    Admission, CircuitOpen, ProviderStateRegistry, RateLimitExceeded, RetryPolicy,
};

/// Executor tuning knobs
#[derive(Debug, Clone)]
pub struct TaskExecutorConfig {
    /// Longest a single call waits for rate-limit tokens
    pub rate_limit_wait: Duration,
}

impl Default for TaskExecutorConfig {
    fn default() -> Self {
        Self {
            rate_limit_wait: Duration::from_secs(30),
        }
    }
}

/// Terminal error of a task invocation
#[derive(Debug, Clone, Error)]
pub enum InvokeError {
    #[error("Model '{model}' is not registered")]
    UnknownModel { model: ModelId },

    #[error("No provider client configured for {provider}")]
    ProviderUnavailable { provider: ProviderKind },

    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpen),

    #[error(transparent)]
    RateLimit(#[from] RateLimitExceeded),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Deadline exceeded during provider call")]
    DeadlineExceeded,
}

impl InvokeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownModel { .. } => ErrorKind::UnknownModel,
            Self::ProviderUnavailable { .. } => ErrorKind::Internal,
            Self::CircuitOpen(_) => ErrorKind::CircuitOpen,
            Self::RateLimit(_) => ErrorKind::RateLimit,
            Self::Provider(e) if e.is_transient() => ErrorKind::Transient,
            Self::Provider(_) => ErrorKind::Persistent,
            Self::DeadlineExceeded => ErrorKind::Timeout,
        }
    }
}

/// Successful invocation, with the fallback trail that led to it
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub content: String,
    /// The model that actually served the call
    pub served_by: ModelId,
    pub attempts: Vec<AttemptRecord>,
}

/// Failed invocation: terminal error plus the full fallback trail
#[derive(Debug, Clone)]
pub struct InvokeFailure {
    pub error: InvokeError,
    pub attempts: Vec<AttemptRecord>,
}

/// Invokes one task through circuit breaker, rate limiter, retries, and the
/// model fallback chain
#[derive(Debug)]
pub struct TaskExecutor {
    registry: Arc<dyn ModelRegistry>,
    resolver: Arc<dyn ProviderResolver>,
    states: Arc<ProviderStateRegistry>,
    retry: RetryPolicy,
    config: TaskExecutorConfig,
}

impl TaskExecutor {
    pub fn new(
        registry: Arc<dyn ModelRegistry>,
        resolver: Arc<dyn ProviderResolver>,
        states: Arc<ProviderStateRegistry>,
        retry: RetryPolicy,
        config: TaskExecutorConfig,
    ) -> Self {
        Self {
            registry,
            resolver,
            states,
            retry,
            config,
        }
    }

    /// Invoke `model_id` with a rendered prompt, traversing its fallback
    /// chain until an entry serves the call or the chain is exhausted
    pub async fn invoke(
        &self,
        model_id: &ModelId,
        prompt: &str,
        config: &TaskConfig,
        deadline: Instant,
    ) -> Result<TaskOutcome, InvokeFailure> {
        let mut chain = vec![model_id.clone()];
        for fallback in self.registry.fallback_chain(model_id).await {
            if !chain.contains(&fallback) {
                chain.push(fallback);
            }
        }

        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut last_error: Option<InvokeError> = None;

        for entry_id in chain {
            match self
                .invoke_entry(&entry_id, prompt, config, deadline)
                .await
            {
                EntryOutcome::Served { content, calls } => {
                    attempts.push(AttemptRecord {
                        model: entry_id.clone(),
                        calls,
                        error: None,
                    });
                    return Ok(TaskOutcome {
                        content,
                        served_by: entry_id,
                        attempts,
                    });
                }
                EntryOutcome::Failed { error, calls } => {
                    debug!(model = %entry_id, %error, "fallback chain entry failed");
                    attempts.push(AttemptRecord {
                        model: entry_id.clone(),
                        calls,
                        error: Some(error.to_string()),
                    });

                    let out_of_time = matches!(error, InvokeError::DeadlineExceeded);
                    last_error = Some(error);

                    if out_of_time {
                        break;
                    }
                }
            }
        }

        let error = last_error.unwrap_or(InvokeError::UnknownModel {
            model: model_id.clone(),
        });
        warn!(model = %model_id, %error, "fallback chain exhausted");

        Err(InvokeFailure { error, attempts })
    }

    /// Run one fallback-chain entry: breaker, bucket, call, retries
    async fn invoke_entry(
        &self,
        entry_id: &ModelId,
        prompt: &str,
        config: &TaskConfig,
        deadline: Instant,
    ) -> EntryOutcome {
        let Some(model) = self.registry.model(entry_id).await else {
            return EntryOutcome::Failed {
                error: InvokeError::UnknownModel {
                    model: entry_id.clone(),
                },
                calls: 0,
            };
        };

        let Some(provider) = self.resolver.resolve(model.provider()) else {
            return EntryOutcome::Failed {
                error: InvokeError::ProviderUnavailable {
                    provider: model.provider(),
                },
                calls: 0,
            };
        };

        let breaker = self.states.breaker(entry_id).await;
        let admission = match breaker.try_acquire() {
            Ok(admission) => admission,
            Err(open) => {
                return EntryOutcome::Failed {
                    error: InvokeError::CircuitOpen(open),
                    calls: 0,
                };
            }
        };

        let params = self.registry.rate_limit(model.provider()).await;
        let bucket = self.states.bucket(model.provider(), params).await;
        let request = self.build_request(&model, prompt, config).await;

        let mut calls = 0u32;
        let mut attempt = 0u32;

        let error = loop {
            let now = Instant::now();
            if now >= deadline {
                break InvokeError::DeadlineExceeded;
            }

            let wait_budget = self.config.rate_limit_wait.min(deadline - now);
            if let Err(exceeded) = bucket.consume(1, wait_budget).await {
                break InvokeError::RateLimit(exceeded);
            }

            calls += 1;
            let result = timeout_at(deadline, provider.invoke(model.provider_model(), request.clone())).await;

            match result {
                Err(_elapsed) => {
                    breaker.record_failure();
                    break InvokeError::DeadlineExceeded;
                }
                Ok(Ok(response)) => {
                    breaker.record_success();
                    return EntryOutcome::Served {
                        content: response.content,
                        calls,
                    };
                }
                Ok(Err(error)) => {
                    breaker.record_failure();

                    let transient_kind = match &error {
                        ProviderError::Transient { kind, .. } => Some(*kind),
                        ProviderError::Persistent { .. } => None,
                    };

                    // Persistent failures skip straight to the next chain entry.
                    let Some(kind) = transient_kind else {
                        break InvokeError::Provider(error);
                    };

                    let allowed = match admission {
                        Admission::Trial => 1,
                        Admission::Normal => self.retry.max_attempts(kind),
                    };

                    attempt += 1;
                    if attempt >= allowed {
                        break InvokeError::Provider(error);
                    }

                    let delay = self.retry.backoff(attempt - 1);
                    if Instant::now() + delay >= deadline {
                        break InvokeError::DeadlineExceeded;
                    }

                    debug!(
                        model = %entry_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transient failure"
                    );
                    sleep(delay).await;
                }
            }
        };

        // An admitted half-open trial that never reached the provider must
        // release its slot without counting an outcome.
        if calls == 0 && admission == Admission::Trial {
            breaker.record_abandoned();
        }

        EntryOutcome::Failed { error, calls }
    }

    /// Merge model defaults with task overrides and resolve prompt addons
    async fn build_request(&self, model: &Model, prompt: &str, config: &TaskConfig) -> LlmRequest {
        let mut system = model.system_prompt().map(str::to_string);

        let mut addon_sections = Vec::new();
        for name in &config.addons {
            match self.registry.addon(name).await {
                Some(text) => {
                    addon_sections.push(format!("[{} ADDON]: {}", name.to_uppercase(), text));
                }
                None => warn!(addon = %name, "unknown prompt addon, skipping"),
            }
        }

        if !addon_sections.is_empty() {
            let joined = addon_sections.join("\n\n");
            system = Some(match system {
                Some(base) => format!("{base}\n\n{joined}"),
                None => joined,
            });
        }

        let mut builder = LlmRequest::builder();
        if let Some(system) = system {
            builder = builder.system(system);
        }
        builder = builder.user(prompt);

        if let Some(temperature) = config.temperature.or(model.config().temperature) {
            builder = builder.temperature(temperature);
        }
        if let Some(max_tokens) = config.max_tokens.or(model.config().max_tokens) {
            builder = builder.max_tokens(max_tokens);
        }
        if let Some(top_p) = config.top_p.or(model.config().top_p) {
            builder = builder.top_p(top_p);
        }
        if let Some(media) = model.config().media.clone() {
            builder = builder.media(media);
        }

        builder.build()
    }
}

enum EntryOutcome {
    Served { content: String, calls: u32 },
    Failed { error: InvokeError, calls: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CircuitBreakerConfig, RetryConfig};
    use crate::domain::llm::{LlmProvider, LlmResponse, TransientKind};
    use crate::domain::model::{InMemoryModelRegistry, RateLimitParams};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    /// Provider whose responses are scripted per provider-side model name
    #[derive(Debug, Default)]
    struct ScriptedProvider {
        scripts: Mutex<HashMap<String, VecDeque<Result<String, ProviderError>>>>,
        requests: Mutex<Vec<(String, LlmRequest)>>,
    }

    impl ScriptedProvider {
        fn script(&self, model: &str, results: Vec<Result<String, ProviderError>>) {
            self.scripts
                .lock()
                .unwrap()
                .insert(model.to_string(), results.into());
        }

        fn call_count(&self, model: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|(m, _)| m == model)
                .count()
        }

        fn last_request(&self) -> Option<LlmRequest> {
            self.requests.lock().unwrap().last().map(|(_, r)| r.clone())
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn invoke(
            &self,
            model: &str,
            request: LlmRequest,
        ) -> Result<LlmResponse, ProviderError> {
            self.requests
                .lock()
                .unwrap()
                .push((model.to_string(), request));

            let next = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(model)
                .and_then(VecDeque::pop_front);

            match next {
                Some(Ok(content)) => Ok(LlmResponse::new(model, content)),
                Some(Err(error)) => Err(error),
                None => Err(ProviderError::persistent(
                    ProviderKind::OpenRouter,
                    format!("no script for '{model}'"),
                )),
            }
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenRouter
        }
    }

    fn model_id(id: &str) -> ModelId {
        ModelId::new(id).unwrap()
    }

    fn registered(id: &str) -> Model {
        Model::new(
            model_id(id),
            id.to_string(),
            ProviderKind::OpenRouter,
            format!("wire/{id}"),
        )
    }

    struct Harness {
        executor: TaskExecutor,
        provider: Arc<ScriptedProvider>,
        registry: Arc<InMemoryModelRegistry>,
    }

    fn harness(models: Vec<Model>, retry: RetryConfig) -> Harness {
        harness_with(models, retry, CircuitBreakerConfig::default(), 60)
    }

    fn harness_with(
        models: Vec<Model>,
        retry: RetryConfig,
        circuit: CircuitBreakerConfig,
        rpm: u32,
    ) -> Harness {
        let provider = Arc::new(ScriptedProvider::default());
        let mut rate_limits = HashMap::new();
        rate_limits.insert(ProviderKind::OpenRouter, RateLimitParams::new(rpm));

        let registry =
            Arc::new(InMemoryModelRegistry::new(models).with_rate_limits(rate_limits));

        let resolver = crate::infrastructure::llm::StaticProviderResolver::new()
            .with_provider(provider.clone() as Arc<dyn LlmProvider>);

        let executor = TaskExecutor::new(
            registry.clone(),
            Arc::new(resolver),
            Arc::new(ProviderStateRegistry::new(circuit)),
            RetryPolicy::from_config(&retry),
            TaskExecutorConfig {
                rate_limit_wait: Duration::from_secs(5),
            },
        );

        Harness {
            executor,
            provider,
            registry,
        }
    }

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            jitter_enabled: false,
            ..Default::default()
        }
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(300)
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_call() {
        let h = harness(vec![registered("thinking")], no_jitter());
        h.provider.script("wire/thinking", vec![Ok("answer".to_string())]);

        let outcome = h
            .executor
            .invoke(&model_id("thinking"), "prompt", &TaskConfig::default(), far_deadline())
            .await
            .unwrap();

        assert_eq!(outcome.content, "answer");
        assert_eq!(outcome.served_by, model_id("thinking"));
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.attempts[0].calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_then_success() {
        let h = harness(vec![registered("thinking")], no_jitter());

        let transient = || {
            Err(ProviderError::transient(
                ProviderKind::OpenRouter,
                TransientKind::Unavailable,
                "502",
            ))
        };
        h.provider.script(
            "wire/thinking",
            vec![transient(), transient(), transient(), Ok("recovered".to_string())],
        );

        let start = Instant::now();
        let outcome = h
            .executor
            .invoke(&model_id("thinking"), "prompt", &TaskConfig::default(), far_deadline())
            .await
            .unwrap();

        assert_eq!(outcome.content, "recovered");
        assert_eq!(h.provider.call_count("wire/thinking"), 4);

        // Cumulative delay stays within the configured backoff schedule:
        // 1s + 2s + 4s with the default base delay.
        assert!(start.elapsed() <= Duration::from_millis(7_100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_exhaust_retries() {
        let h = harness(vec![registered("thinking")], no_jitter());

        let script: Vec<_> = (0..4)
            .map(|_| {
                Err(ProviderError::transient(
                    ProviderKind::OpenRouter,
                    TransientKind::Unavailable,
                    "502",
                ))
            })
            .collect();
        h.provider.script("wire/thinking", script);

        let failure = h
            .executor
            .invoke(&model_id("thinking"), "prompt", &TaskConfig::default(), far_deadline())
            .await
            .unwrap_err();

        // max_retries = 3 means 4 calls total.
        assert_eq!(h.provider.call_count("wire/thinking"), 4);
        assert_eq!(failure.error.kind(), ErrorKind::Transient);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_falls_back_without_retry() {
        let h = harness(
            vec![registered("primary"), registered("backup")],
            no_jitter(),
        );
        h.registry
            .set_fallback_chain(model_id("primary"), vec![model_id("backup")])
            .await;

        h.provider.script(
            "wire/primary",
            vec![Err(ProviderError::persistent(
                ProviderKind::OpenRouter,
                "invalid request",
            ))],
        );
        h.provider.script("wire/backup", vec![Ok("served by backup".to_string())]);

        let outcome = h
            .executor
            .invoke(&model_id("primary"), "prompt", &TaskConfig::default(), far_deadline())
            .await
            .unwrap();

        assert_eq!(outcome.served_by, model_id("backup"));
        assert_eq!(h.provider.call_count("wire/primary"), 1);
        assert_eq!(outcome.attempts.len(), 2);
        assert!(outcome.attempts[0].error.is_some());
        assert!(outcome.attempts[1].error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_skips_provider_contact() {
        let circuit = CircuitBreakerConfig {
            failure_threshold: 2,
            reset_timeout_secs: 60,
        };
        let retry = RetryConfig {
            max_retries: 0,
            jitter_enabled: false,
            ..Default::default()
        };
        let h = harness_with(vec![registered("flaky")], retry, circuit, 600);

        let persistent = || Err(ProviderError::persistent(ProviderKind::OpenRouter, "boom"));
        h.provider
            .script("wire/flaky", vec![persistent(), persistent()]);

        for _ in 0..2 {
            let _ = h
                .executor
                .invoke(&model_id("flaky"), "p", &TaskConfig::default(), far_deadline())
                .await;
        }
        assert_eq!(h.provider.call_count("wire/flaky"), 2);

        // Circuit is open now: no further provider contact.
        let failure = h
            .executor
            .invoke(&model_id("flaky"), "p", &TaskConfig::default(), far_deadline())
            .await
            .unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::CircuitOpen);
        assert_eq!(failure.attempts[0].calls, 0);
        assert_eq!(h.provider.call_count("wire/flaky"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhaustion_fails_with_rate_limit() {
        // 1 request per minute: the second call cannot get a token within
        // the 5s executor wait.
        let h = harness_with(
            vec![registered("thinking")],
            RetryConfig {
                max_retries: 0,
                jitter_enabled: false,
                ..Default::default()
            },
            CircuitBreakerConfig::default(),
            1,
        );
        h.provider.script(
            "wire/thinking",
            vec![Ok("first".to_string()), Ok("never reached".to_string())],
        );

        h.executor
            .invoke(&model_id("thinking"), "p", &TaskConfig::default(), far_deadline())
            .await
            .unwrap();

        let failure = h
            .executor
            .invoke(&model_id("thinking"), "p", &TaskConfig::default(), far_deadline())
            .await
            .unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::RateLimit);
        assert_eq!(h.provider.call_count("wire/thinking"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_model() {
        let h = harness(vec![], no_jitter());

        let failure = h
            .executor
            .invoke(&model_id("ghost"), "p", &TaskConfig::default(), far_deadline())
            .await
            .unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::UnknownModel);
        assert!(failure.attempts[0].error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_addons_and_system_prompt_injection() {
        let model = registered("thinking").with_system_prompt("Base system.");
        let mut addons = HashMap::new();
        addons.insert("seo".to_string(), "Optimize for search.".to_string());

        let provider = Arc::new(ScriptedProvider::default());
        provider.script("wire/thinking", vec![Ok("ok".to_string())]);

        let registry = Arc::new(
            InMemoryModelRegistry::new(vec![model]).with_addons(addons),
        );
        let resolver = crate::infrastructure::llm::StaticProviderResolver::new()
            .with_provider(provider.clone() as Arc<dyn LlmProvider>);
        let executor = TaskExecutor::new(
            registry,
            Arc::new(resolver),
            Arc::new(ProviderStateRegistry::new(CircuitBreakerConfig::default())),
            RetryPolicy::default(),
            TaskExecutorConfig::default(),
        );

        let config = TaskConfig {
            addons: vec!["seo".to_string()],
            temperature: Some(0.2),
            ..Default::default()
        };

        executor
            .invoke(&model_id("thinking"), "the prompt", &config, far_deadline())
            .await
            .unwrap();

        let request = provider.last_request().unwrap();
        let system = &request.messages[0];
        assert!(system.content.starts_with("Base system."));
        assert!(system.content.contains("[SEO ADDON]: Optimize for search."));
        assert_eq!(request.messages[1].content, "the prompt");
        assert_eq!(request.temperature, Some(0.2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_already_passed() {
        let h = harness(vec![registered("thinking")], no_jitter());
        h.provider.script("wire/thinking", vec![Ok("unused".to_string())]);

        let failure = h
            .executor
            .invoke(
                &model_id("thinking"),
                "p",
                &TaskConfig::default(),
                Instant::now() - Duration::from_secs(1),
            )
            .await
            .unwrap_err();

        assert_eq!(failure.error.kind(), ErrorKind::Timeout);
        assert_eq!(h.provider.call_count("wire/thinking"), 0);
    }
}
