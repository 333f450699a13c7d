//! Read-only model registry consumed by the executor and classifier
//!
//! The registry answers four questions: which model is this id, what is its
//! fallback chain, how fast may its provider be called, and what text does a
//! prompt addon expand to.

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{Model, ModelId};
use crate::domain::llm::ProviderKind;

/// Token-bucket parameters for one provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitParams {
    pub requests_per_minute: u32,
}

impl RateLimitParams {
    pub fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
        }
    }

    /// Bucket capacity in tokens
    pub fn capacity(&self) -> f64 {
        f64::from(self.requests_per_minute)
    }

    /// Refill rate in tokens per second
    pub fn refill_per_second(&self) -> f64 {
        f64::from(self.requests_per_minute) / 60.0
    }
}

impl Default for RateLimitParams {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
        }
    }
}

/// Read-only lookup of models, fallback chains, rate limits, and addon text
#[async_trait]
pub trait ModelRegistry: Send + Sync + Debug {
    /// Look up a model by registry id
    async fn model(&self, id: &ModelId) -> Option<Model>;

    /// Ordered fallback chain for a model (excluding the model itself)
    async fn fallback_chain(&self, id: &ModelId) -> Vec<ModelId>;

    /// Rate-limit parameters for a provider
    async fn rate_limit(&self, provider: ProviderKind) -> RateLimitParams;

    /// Addon text by name, appended to system prompts on request
    async fn addon(&self, name: &str) -> Option<String>;
}

/// In-memory registry, seeded at startup
#[derive(Debug)]
pub struct InMemoryModelRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    models: HashMap<ModelId, Model>,
    fallbacks: HashMap<ModelId, Vec<ModelId>>,
    rate_limits: HashMap<ProviderKind, RateLimitParams>,
    addons: HashMap<String, String>,
}

impl InMemoryModelRegistry {
    pub fn new(models: Vec<Model>) -> Self {
        let models = models
            .into_iter()
            .map(|m| (m.id().clone(), m))
            .collect();

        Self {
            inner: RwLock::new(RegistryInner {
                models,
                ..Default::default()
            }),
        }
    }

    pub fn with_fallbacks(mut self, fallbacks: HashMap<ModelId, Vec<ModelId>>) -> Self {
        self.inner.get_mut().fallbacks = fallbacks;
        self
    }

    pub fn with_rate_limits(mut self, rate_limits: HashMap<ProviderKind, RateLimitParams>) -> Self {
        self.inner.get_mut().rate_limits = rate_limits;
        self
    }

    pub fn with_addons(mut self, addons: HashMap<String, String>) -> Self {
        self.inner.get_mut().addons = addons;
        self
    }

    /// Register or replace a model at runtime
    pub async fn insert(&self, model: Model) {
        let mut inner = self.inner.write().await;
        inner.models.insert(model.id().clone(), model);
    }

    /// Set the fallback chain for a model at runtime
    pub async fn set_fallback_chain(&self, id: ModelId, chain: Vec<ModelId>) {
        let mut inner = self.inner.write().await;
        inner.fallbacks.insert(id, chain);
    }
}

#[async_trait]
impl ModelRegistry for InMemoryModelRegistry {
    async fn model(&self, id: &ModelId) -> Option<Model> {
        self.inner.read().await.models.get(id).cloned()
    }

    async fn fallback_chain(&self, id: &ModelId) -> Vec<ModelId> {
        self.inner
            .read()
            .await
            .fallbacks
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    async fn rate_limit(&self, provider: ProviderKind) -> RateLimitParams {
        self.inner
            .read()
            .await
            .rate_limits
            .get(&provider)
            .copied()
            .unwrap_or_default()
    }

    async fn addon(&self, name: &str) -> Option<String> {
        self.inner.read().await.addons.get(name).cloned()
    }
}
