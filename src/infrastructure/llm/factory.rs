//! Provider construction and resolution

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::google_ai::GoogleAiProvider;
use super::http_client::HttpClient;
use super::openrouter::OpenRouterProvider;
use crate::domain::error::DomainError;
use crate::domain::llm::{LlmProvider, ProviderKind, ProviderResolver};

/// Factory for creating provider clients from the environment
#[derive(Debug)]
pub struct ProviderFactory;

impl ProviderFactory {
    /// OpenRouter client from `OPENROUTER_API_KEY` / `OPENROUTER_BASE_URL`
    pub fn openrouter_from_env() -> Result<Arc<dyn LlmProvider>, DomainError> {
        let api_key = std::env::var("OPENROUTER_API_KEY").map_err(|_| {
            DomainError::configuration("OPENROUTER_API_KEY environment variable is required")
        })?;

        let provider = match std::env::var("OPENROUTER_BASE_URL") {
            Ok(base_url) => {
                info!("Using OpenRouter provider with custom base URL: {base_url}");
                OpenRouterProvider::with_base_url(HttpClient::new(), api_key, base_url)
            }
            Err(_) => OpenRouterProvider::new(HttpClient::new(), api_key),
        };

        Ok(Arc::new(provider))
    }

    /// Google AI client from `GOOGLE_AI_API_KEY` / `GOOGLE_AI_BASE_URL`
    pub fn google_ai_from_env() -> Result<Arc<dyn LlmProvider>, DomainError> {
        let api_key = std::env::var("GOOGLE_AI_API_KEY").map_err(|_| {
            DomainError::configuration("GOOGLE_AI_API_KEY environment variable is required")
        })?;

        let provider = match std::env::var("GOOGLE_AI_BASE_URL") {
            Ok(base_url) => {
                info!("Using Google AI provider with custom base URL: {base_url}");
                GoogleAiProvider::with_base_url(HttpClient::new(), api_key, base_url)
            }
            Err(_) => GoogleAiProvider::new(HttpClient::new(), api_key),
        };

        Ok(Arc::new(provider))
    }
}

/// Fixed provider table, built once at startup
#[derive(Debug, Default)]
pub struct StaticProviderResolver {
    providers: HashMap<ProviderKind, Arc<dyn LlmProvider>>,
}

impl StaticProviderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }
}

impl ProviderResolver for StaticProviderResolver {
    fn resolve(&self, kind: ProviderKind) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(&kind).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::{LlmRequest, LlmResponse, ProviderError};
    use async_trait::async_trait;

    #[derive(Debug)]
    struct NullProvider(ProviderKind);

    #[async_trait]
    impl LlmProvider for NullProvider {
        async fn invoke(
            &self,
            model: &str,
            _request: LlmRequest,
        ) -> Result<LlmResponse, ProviderError> {
            Ok(LlmResponse::new(model, ""))
        }

        fn kind(&self) -> ProviderKind {
            self.0
        }
    }

    #[test]
    fn test_resolver_lookup() {
        let resolver = StaticProviderResolver::new()
            .with_provider(Arc::new(NullProvider(ProviderKind::OpenRouter)));

        assert!(resolver.resolve(ProviderKind::OpenRouter).is_some());
        assert!(resolver.resolve(ProviderKind::GoogleAi).is_none());
    }
}
