//! Process-wide provider state registry
//!
//! One token bucket per provider, one circuit breaker per model, created on
//! first use and shared by every concurrent run. The outer maps are only
//! locked to fetch or insert an `Arc` entry; each entry carries its own lock,
//! so unrelated providers never contend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;

use super::circuit_breaker::{CircuitBreaker, CircuitStatus};
use super::rate_limiter::TokenBucket;
use crate::config::CircuitBreakerConfig;
use crate::domain::llm::ProviderKind;
use crate::domain::model::{ModelId, RateLimitParams};

/// Health snapshot for one provider's token bucket
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub provider: ProviderKind,
    pub tokens_available: f64,
}

/// Health snapshot for one model's circuit breaker
#[derive(Debug, Clone, Serialize)]
pub struct ModelHealth {
    pub model: ModelId,
    pub circuit_status: CircuitStatus,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure_age_ms: Option<u64>,
}

/// Shared resilience state for all providers and models in the process
#[derive(Debug)]
pub struct ProviderStateRegistry {
    circuit_config: CircuitBreakerConfig,
    buckets: RwLock<HashMap<ProviderKind, Arc<TokenBucket>>>,
    breakers: RwLock<HashMap<ModelId, Arc<CircuitBreaker>>>,
}

impl ProviderStateRegistry {
    pub fn new(circuit_config: CircuitBreakerConfig) -> Self {
        Self {
            circuit_config,
            buckets: RwLock::new(HashMap::new()),
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Token bucket for a provider, created from `params` on first use
    pub async fn bucket(&self, provider: ProviderKind, params: RateLimitParams) -> Arc<TokenBucket> {
        {
            let buckets = self.buckets.read().await;
            if let Some(bucket) = buckets.get(&provider) {
                return bucket.clone();
            }
        }

        let mut buckets = self.buckets.write().await;
        buckets
            .entry(provider)
            .or_insert_with(|| {
                Arc::new(TokenBucket::new(
                    params.capacity(),
                    params.refill_per_second(),
                ))
            })
            .clone()
    }

    /// Circuit breaker for a model, created on first use
    pub async fn breaker(&self, model: &ModelId) -> Arc<CircuitBreaker> {
        {
            let breakers = self.breakers.read().await;
            if let Some(breaker) = breakers.get(model) {
                return breaker.clone();
            }
        }

        let mut breakers = self.breakers.write().await;
        breakers
            .entry(model.clone())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    model.as_str(),
                    self.circuit_config.failure_threshold,
                    Duration::from_secs(self.circuit_config.reset_timeout_secs),
                ))
            })
            .clone()
    }

    /// Snapshot of every known bucket and breaker
    pub async fn health(&self) -> (Vec<ProviderHealth>, Vec<ModelHealth>) {
        let mut providers = Vec::new();
        for (provider, bucket) in self.buckets.read().await.iter() {
            providers.push(ProviderHealth {
                provider: *provider,
                tokens_available: bucket.available().await,
            });
        }

        let models = self
            .breakers
            .read()
            .await
            .iter()
            .map(|(model, breaker)| ModelHealth {
                model: model.clone(),
                circuit_status: breaker.status(),
                consecutive_failures: breaker.consecutive_failures(),
                last_failure_age_ms: breaker.last_failure_age_ms(),
            })
            .collect();

        (providers, models)
    }
}
