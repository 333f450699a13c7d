//! Infrastructure layer - Concrete implementations

pub mod classifier;
pub mod executor;
pub mod generator;
pub mod llm;
pub mod observability;
pub mod orchestrator;
pub mod resilience;
pub mod scheduler;
pub mod session;

pub use classifier::RequestClassifier;
pub use executor::{
    InvokeError, InvokeFailure, TaskExecutor, TaskExecutorConfig, TaskOutcome,
};
pub use generator::WorkflowGenerator;
pub use llm::{
    GoogleAiProvider, HttpClient, HttpClientTrait, HttpError, OpenRouterProvider,
    ProviderFactory, StaticProviderResolver,
};
pub use observability::init_tracing;
pub use orchestrator::{Orchestrator, OrchestratorResponse};
pub use resilience::{
    Admission, CircuitBreaker, CircuitOpen, CircuitStatus, ModelHealth, ProviderHealth,
    ProviderStateRegistry, RateLimitExceeded, RetryPolicy, TokenBucket,
};
pub use scheduler::{WorkflowScheduler, WorkflowSchedulerConfig};
pub use session::InMemorySessionStore;
