//! HTTP client seam for provider implementations

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::llm::{ProviderError, ProviderKind, TransientKind};

/// Transport-level failures, before provider-specific interpretation
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

impl HttpError {
    /// Map a transport failure onto the provider error taxonomy
    ///
    /// Timeouts, connection failures, 429 and 5xx are transient; every other
    /// status and an unparseable body are persistent.
    pub fn into_provider_error(self, provider: ProviderKind) -> ProviderError {
        let message = self.to_string();

        match self {
            Self::Timeout => {
                ProviderError::transient(provider, TransientKind::Timeout, message)
            }
            Self::Connection(_) => {
                ProviderError::transient(provider, TransientKind::Unavailable, message)
            }
            Self::Status { status: 429, .. } => {
                ProviderError::transient(provider, TransientKind::Throttled, message)
            }
            Self::Status { status, .. } if (500..=599).contains(&status) => {
                ProviderError::transient(provider, TransientKind::Unavailable, message)
            }
            Self::Status { .. } | Self::InvalidBody(_) => {
                ProviderError::persistent(provider, message)
            }
        }
    }
}

/// Trait for HTTP client operations (for mocking)
#[async_trait]
pub trait HttpClientTrait: Send + Sync + std::fmt::Debug {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, HttpError>;
}

/// Real HTTP client using reqwest
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(timeout: std::time::Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClientTrait for HttpClient {
    async fn post_json(
        &self,
        url: &str,
        headers: Vec<(&str, &str)>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, HttpError> {
        let mut request = self.client.post(url);

        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = request.json(body).send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout
            } else {
                HttpError::Connection(e.to_string())
            }
        })?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| HttpError::InvalidBody(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_maps_to_transient_timeout() {
        let err = HttpError::Timeout.into_provider_error(ProviderKind::OpenRouter);
        assert!(matches!(
            err,
            ProviderError::Transient {
                kind: TransientKind::Timeout,
                ..
            }
        ));
    }

    #[test]
    fn test_429_maps_to_throttled() {
        let err = HttpError::Status {
            status: 429,
            body: "slow down".to_string(),
        }
        .into_provider_error(ProviderKind::OpenRouter);

        assert!(matches!(
            err,
            ProviderError::Transient {
                kind: TransientKind::Throttled,
                ..
            }
        ));
    }

    #[test]
    fn test_5xx_maps_to_unavailable() {
        let err = HttpError::Status {
            status: 503,
            body: String::new(),
        }
        .into_provider_error(ProviderKind::GoogleAi);

        assert!(matches!(
            err,
            ProviderError::Transient {
                kind: TransientKind::Unavailable,
                ..
            }
        ));
    }

    #[test]
    fn test_auth_failure_is_persistent() {
        let err = HttpError::Status {
            status: 401,
            body: "bad key".to_string(),
        }
        .into_provider_error(ProviderKind::OpenRouter);

        assert!(!err.is_transient());
    }
}
