//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, CircuitBreakerConfig, ContextLimits, GeneratorConfig, LogFormat, LoggingConfig,
    PlanFallback, RateLimitConfig, RetryConfig, RoutingConfig, SchedulerConfig,
};
