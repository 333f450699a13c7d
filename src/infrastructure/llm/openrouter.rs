//! OpenRouter chat-completions provider

use async_trait::async_trait;
use serde::Deserialize;

use super::http_client::HttpClientTrait;
use crate::domain::llm::{
    LlmProvider, LlmRequest, LlmResponse, ProviderError, ProviderKind, Usage,
};

const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api";

/// OpenRouter API provider (OpenAI-compatible chat completions)
#[derive(Debug)]
pub struct OpenRouterProvider<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
}

impl<C: HttpClientTrait> OpenRouterProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_OPENROUTER_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let auth_header = format!("Bearer {}", api_key.into());
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            auth_header,
            base_url,
        }
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_body(&self, model: &str, request: &LlmRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role,
                    "content": m.content,
                })
            })
            .collect();

        serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": request.temperature.unwrap_or(0.7),
            "max_tokens": request.max_tokens.unwrap_or(2000),
            "top_p": request.top_p.unwrap_or(0.95),
        })
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<LlmResponse, ProviderError> {
        let response: ChatCompletionResponse = serde_json::from_value(json).map_err(|e| {
            ProviderError::persistent(self.kind(), format!("Failed to parse response: {e}"))
        })?;

        let choice = response.choices.into_iter().next().ok_or_else(|| {
            ProviderError::persistent(self.kind(), "No choices in response")
        })?;

        let mut llm_response =
            LlmResponse::new(response.model, choice.message.content.unwrap_or_default());

        if let Some(usage) = response.usage {
            llm_response = llm_response
                .with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
        }

        Ok(llm_response)
    }
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for OpenRouterProvider<C> {
    async fn invoke(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, ProviderError> {
        let body = self.build_body(model, &request);

        let json = self
            .client
            .post_json(&self.chat_completions_url(), self.headers(), &body)
            .await
            .map_err(|e| e.into_provider_error(self.kind()))?;

        self.parse_response(json)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenRouter
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
