use std::collections::HashMap;

use serde::Deserialize;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub routing: RoutingConfig,
    pub limits: ContextLimits,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub rate_limits: RateLimitConfig,
    pub scheduler: SchedulerConfig,
    pub generator: GeneratorConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Model ids used for each routing decision
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Model that assigns the L/M/H category
    pub categorizer_model: String,
    /// Direct-answer model for low-complexity requests
    pub low_model: String,
    /// Direct-answer model for medium-complexity requests
    pub medium_model: String,
    /// Planning model that produces workflows for high-complexity requests
    pub planning_model: String,
    /// Model that produces the immediate acknowledgment for high-complexity requests
    pub fast_response_model: String,
    /// Route forced when the request carries media attachments
    pub media_model: String,
    /// Route forced when the context exceeds the high-capacity threshold
    pub high_capacity_model: String,
}

/// Token-count thresholds applied before classification
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContextLimits {
    /// Above this, the request is forced onto the high-capacity route
    pub high_capacity_tokens: u32,
    /// Above this, the request is rejected outright
    pub max_context_tokens: u32,
}

/// Backoff parameters for transient provider failures
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries for generic transient failures
    pub max_retries: u32,
    /// Retries when the provider reports throttling (429)
    pub throttle_max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Seconds the circuit stays open before admitting a trial call
    pub reset_timeout_secs: u64,
}

/// Per-provider admission limits, keyed by provider name
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Requests per minute for providers not listed in `per_provider`
    pub default_requests_per_minute: u32,
    pub per_provider: HashMap<String, u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Wall-clock budget for a single workflow run
    pub run_timeout_secs: u64,
    /// Process-wide cap on concurrently active runs
    pub max_concurrent_runs: usize,
    /// Longest a single call waits for rate-limit tokens
    pub rate_limit_wait_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// What to do when the planning model produces an invalid workflow
    pub plan_fallback: PlanFallback,
}

/// Fallback policy when a generated workflow fails schema validation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanFallback {
    /// Degrade to a single sequential task running the original request
    #[default]
    SingleTask,
    /// Surface the validation error to the caller
    Reject,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            categorizer_model: "categorizer".to_string(),
            low_model: "thinking".to_string(),
            medium_model: "medium".to_string(),
            planning_model: "master-planner".to_string(),
            fast_response_model: "fast-response".to_string(),
            media_model: "imagen".to_string(),
            high_capacity_model: "high-capacity".to_string(),
        }
    }
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            high_capacity_tokens: 60_000,
            max_context_tokens: 120_000,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            throttle_max_retries: 5,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter_enabled: true,
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_secs: 60,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default_requests_per_minute: 60,
            per_provider: HashMap::new(),
        }
    }
}

impl RateLimitConfig {
    /// Requests per minute for a provider, falling back to the default
    pub fn requests_per_minute(&self, provider: &str) -> u32 {
        self.per_provider
            .get(provider)
            .copied()
            .unwrap_or(self.default_requests_per_minute)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            run_timeout_secs: 300,
            max_concurrent_runs: 32,
            rate_limit_wait_secs: 30,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            plan_fallback: PlanFallback::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    ///
    /// Sources are layered: `config/default`, `config/local`, then
    /// `ORCH__`-prefixed environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("ORCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.throttle_max_retries, 5);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.scheduler.run_timeout_secs, 300);
        assert_eq!(config.generator.plan_fallback, PlanFallback::SingleTask);
    }

    #[test]
    fn test_rate_limit_lookup() {
        let mut config = RateLimitConfig::default();
        config.per_provider.insert("openrouter".to_string(), 120);

        assert_eq!(config.requests_per_minute("openrouter"), 120);
        assert_eq!(config.requests_per_minute("google_ai"), 60);
    }

    #[test]
    fn test_limits_ordering() {
        let limits = ContextLimits::default();
        assert!(limits.high_capacity_tokens < limits.max_context_tokens);
    }
}
