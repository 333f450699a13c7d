use thiserror::Error;

use super::workflow::WorkflowError;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Context too large: {tokens} tokens (limit {limit})")]
    ContextTooLarge { tokens: u32, limit: u32 },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Provider call failed: {message}")]
    Provider { message: String },

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn context_too_large(tokens: u32, limit: u32) -> Self {
        Self::ContextTooLarge { tokens, limit }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
