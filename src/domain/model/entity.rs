//! Model entity and related types

use serde::{Deserialize, Serialize};

use super::validation::{validate_model_id, ModelValidationError};
use crate::domain::llm::{MediaParams, ProviderKind};

/// Model identifier - alphanumerics plus `.`, `_`, `-`, `/`, max 100 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelId(String);

impl ModelId {
    /// Create a new ModelId after validation
    pub fn new(id: impl Into<String>) -> Result<Self, ModelValidationError> {
        let id = id.into();
        validate_model_id(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ModelId {
    type Error = ModelValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ModelId> for String {
    fn from(id: ModelId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Default generation parameters for a registered model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Media-generation parameters, for image/video models only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaParams>,
}

impl ModelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_media(mut self, media: MediaParams) -> Self {
        self.media = Some(media);
        self
    }
}

/// A registered model: routing target plus provider-side identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Registry identifier used by workflows and routing config
    id: ModelId,

    /// Display name
    name: String,

    /// Which provider serves this model
    provider: ProviderKind,

    /// The provider-side model name sent on the wire
    provider_model: String,

    /// Default generation parameters, overridable per task
    config: ModelConfig,

    /// Base system prompt prepended to every call through this model
    #[serde(skip_serializing_if = "Option::is_none")]
    system_prompt: Option<String>,

    /// Whether the model can consume or produce media
    #[serde(default)]
    media_capable: bool,
}

impl Model {
    pub fn new(
        id: ModelId,
        name: impl Into<String>,
        provider: ProviderKind,
        provider_model: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            provider,
            provider_model: provider_model.into(),
            config: ModelConfig::default(),
            system_prompt: None,
            media_capable: false,
        }
    }

    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_media_capable(mut self, media_capable: bool) -> Self {
        self.media_capable = media_capable;
        self
    }

    // Getters

    pub fn id(&self) -> &ModelId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn provider_model(&self) -> &str {
        &self.provider_model
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn is_media_capable(&self) -> bool {
        self.media_capable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_id_round_trip() {
        let id = ModelId::new("master-planner").unwrap();
        assert_eq!(id.as_str(), "master-planner");

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"master-planner\"");

        let back: ModelId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_model_id_rejects_invalid() {
        assert!(serde_json::from_str::<ModelId>("\"bad id!\"").is_err());
    }

    #[test]
    fn test_model_builder() {
        let model = Model::new(
            ModelId::new("thinking").unwrap(),
            "Thinking AI",
            ProviderKind::OpenRouter,
            "deepseek/deepseek-chat-v3",
        )
        .with_config(ModelConfig::new().with_temperature(0.7).with_max_tokens(2000))
        .with_system_prompt("You are a careful assistant.");

        assert_eq!(model.provider(), ProviderKind::OpenRouter);
        assert_eq!(model.provider_model(), "deepseek/deepseek-chat-v3");
        assert_eq!(model.config().temperature, Some(0.7));
        assert_eq!(model.system_prompt(), Some("You are a careful assistant."));
        assert!(!model.is_media_capable());
    }
}
