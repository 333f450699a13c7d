use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{LlmRequest, LlmResponse};

/// Upstream generative-model providers this process can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenRouter,
    GoogleAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::GoogleAi => "google_ai",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a transient failure manifested; drives the retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientKind {
    /// The call did not complete in time
    Timeout,
    /// The provider reported throttling (429)
    Throttled,
    /// Connection failure or 5xx from the provider
    Unavailable,
}

/// Failure taxonomy for provider calls
///
/// Transient failures are retried with backoff; persistent failures skip
/// straight to the next model in the fallback chain.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Transient failure from {provider}: {message}")]
    Transient {
        provider: ProviderKind,
        kind: TransientKind,
        message: String,
    },

    #[error("Persistent failure from {provider}: {message}")]
    Persistent {
        provider: ProviderKind,
        message: String,
    },
}

impl ProviderError {
    pub fn transient(
        provider: ProviderKind,
        kind: TransientKind,
        message: impl Into<String>,
    ) -> Self {
        Self::Transient {
            provider,
            kind,
            message: message.into(),
        }
    }

    pub fn persistent(provider: ProviderKind, message: impl Into<String>) -> Self {
        Self::Persistent {
            provider,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn provider(&self) -> ProviderKind {
        match self {
            Self::Transient { provider, .. } | Self::Persistent { provider, .. } => *provider,
        }
    }
}

/// Trait for generative-model providers
#[async_trait]
pub trait LlmProvider: Send + Sync + Debug {
    /// Send one generation request to the provider
    async fn invoke(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, ProviderError>;

    /// Which provider this client talks to
    fn kind(&self) -> ProviderKind;
}

/// Resolves a provider kind to a concrete client
///
/// Injected into the task executor so tests can substitute scripted providers.
pub trait ProviderResolver: Send + Sync + Debug {
    fn resolve(&self, kind: ProviderKind) -> Option<Arc<dyn LlmProvider>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_display() {
        assert_eq!(ProviderKind::OpenRouter.to_string(), "openrouter");
        assert_eq!(ProviderKind::GoogleAi.to_string(), "google_ai");
    }

    #[test]
    fn test_error_taxonomy() {
        let transient = ProviderError::transient(
            ProviderKind::OpenRouter,
            TransientKind::Throttled,
            "rate limited",
        );
        assert!(transient.is_transient());
        assert_eq!(transient.provider(), ProviderKind::OpenRouter);

        let persistent = ProviderError::persistent(ProviderKind::GoogleAi, "invalid api key");
        assert!(!persistent.is_transient());
    }
}
