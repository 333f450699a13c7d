//! Domain layer - Core entities, traits, and errors

pub mod error;
pub mod llm;
pub mod model;
pub mod routing;
pub mod session;
pub mod workflow;

pub use error::DomainError;
pub use llm::{
    LlmProvider, LlmRequest, LlmRequestBuilder, LlmResponse, MediaParams, Message, MessageRole,
    ProviderError, ProviderKind, ProviderResolver, TransientKind, Usage,
};
pub use model::{
    validate_generation_params, validate_model_id, InMemoryModelRegistry, Model, ModelConfig,
    ModelId, ModelRegistry, ModelValidationError, RateLimitParams,
};
pub use routing::{Attachment, Category, IncomingRequest, MediaKind, RouteDecision};
pub use session::{SessionEntry, SessionStore};
pub use workflow::{
    AttemptRecord, ErrorKind, ExecutionContext, RunResult, RunStatus, Stage, StageKind,
    TaskConfig, TaskExecution, TaskFailure, TaskSpec, WorkflowError, WorkflowSpec,
};
