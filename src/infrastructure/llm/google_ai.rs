//! Google AI media-generation provider (Imagen / Veo)
//!
//! The task result for a media model is the provider's raw JSON payload,
//! serialized to a string; downstream consumers pull URLs or base64 data out
//! of it.

use async_trait::async_trait;

use super::http_client::HttpClientTrait;
use crate::domain::llm::{
    LlmProvider, LlmRequest, LlmResponse, MediaParams, ProviderError, ProviderKind,
};

const DEFAULT_GOOGLE_AI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Google AI provider for Imagen (images) and Veo (video)
#[derive(Debug)]
pub struct GoogleAiProvider<C: HttpClientTrait> {
    client: C,
    api_key: String,
    base_url: String,
}

impl<C: HttpClientTrait> GoogleAiProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_GOOGLE_AI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn predict_url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:predict", self.base_url, model)
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Content-Type", "application/json"),
            ("x-goog-api-key", self.api_key.as_str()),
        ]
    }

    fn build_body(
        &self,
        model: &str,
        prompt: &str,
        media: &MediaParams,
    ) -> Result<serde_json::Value, ProviderError> {
        let model_lower = model.to_lowercase();

        if model_lower.contains("imagen") {
            Ok(serde_json::json!({
                "prompt": prompt,
                "aspectRatio": media.aspect_ratio.as_deref().unwrap_or("1:1"),
                "negativePrompt": media.negative_prompt.as_deref().unwrap_or(""),
                "numberOfImages": media.num_images.unwrap_or(1),
            }))
        } else if model_lower.contains("veo") {
            Ok(serde_json::json!({
                "prompt": prompt,
                "duration": media.duration_secs.unwrap_or(8),
                "aspectRatio": media.aspect_ratio.as_deref().unwrap_or("16:9"),
                "resolution": media.resolution.as_deref().unwrap_or("1080p"),
                "generateAudio": media.generate_audio.unwrap_or(true),
            }))
        } else {
            Err(ProviderError::persistent(
                self.kind(),
                format!("Unknown Google AI model: {model}"),
            ))
        }
    }
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for GoogleAiProvider<C> {
    async fn invoke(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, ProviderError> {
        let prompt = request.user_prompt().ok_or_else(|| {
            ProviderError::persistent(self.kind(), "Request has no user prompt")
        })?;

        let media = request.media.clone().unwrap_or_default();
        let body = self.build_body(model, prompt, &media)?;

        let json = self
            .client
            .post_json(&self.predict_url(model), self.headers(), &body)
            .await
            .map_err(|e| e.into_provider_error(self.kind()))?;

        let content = serde_json::to_string(&json).map_err(|e| {
            ProviderError::persistent(self.kind(), format!("Failed to serialize payload: {e}"))
        })?;

        Ok(LlmResponse::new(model, content))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::GoogleAi
    }
}
