//! Model validation utilities

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Maximum length for model IDs
pub const MAX_MODEL_ID_LENGTH: usize = 100;

/// Valid model IDs: alphanumeric start, then alphanumerics plus `.`, `_`,
/// `-`, `/` (provider-scoped names such as `deepseek/deepseek-chat`)
static MODEL_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._/-]*$").unwrap());

/// Model validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelValidationError {
    #[error("Model ID cannot be empty")]
    EmptyId,

    #[error("Model ID too long: {length} characters (max {max})")]
    IdTooLong { length: usize, max: usize },

    #[error("Invalid model ID format '{id}'")]
    InvalidIdFormat { id: String },

    #[error("Invalid temperature {value}: must be between 0.0 and 2.0")]
    InvalidTemperature { value: f32 },

    #[error("Invalid top_p {value}: must be between 0.0 and 1.0")]
    InvalidTopP { value: f32 },

    #[error("max_tokens must be greater than 0")]
    InvalidMaxTokens,
}

/// Validate a model ID
pub fn validate_model_id(id: &str) -> Result<(), ModelValidationError> {
    if id.is_empty() {
        return Err(ModelValidationError::EmptyId);
    }

    if id.len() > MAX_MODEL_ID_LENGTH {
        return Err(ModelValidationError::IdTooLong {
            length: id.len(),
            max: MAX_MODEL_ID_LENGTH,
        });
    }

    if !MODEL_ID_PATTERN.is_match(id) {
        return Err(ModelValidationError::InvalidIdFormat { id: id.to_string() });
    }

    Ok(())
}

/// Validate generation parameters
pub fn validate_generation_params(
    temperature: Option<f32>,
    top_p: Option<f32>,
    max_tokens: Option<u32>,
) -> Result<(), ModelValidationError> {
    if let Some(value) = temperature {
        if !(0.0..=2.0).contains(&value) {
            return Err(ModelValidationError::InvalidTemperature { value });
        }
    }

    if let Some(value) = top_p {
        if !(0.0..=1.0).contains(&value) {
            return Err(ModelValidationError::InvalidTopP { value });
        }
    }

    if max_tokens == Some(0) {
        return Err(ModelValidationError::InvalidMaxTokens);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ids() {
        assert!(validate_model_id("categorizer").is_ok());
        assert!(validate_model_id("deepseek/deepseek-chat-v3").is_ok());
        assert!(validate_model_id("imagen-4.0").is_ok());
    }

    #[test]
    fn test_invalid_ids() {
        assert_eq!(validate_model_id(""), Err(ModelValidationError::EmptyId));
        assert!(matches!(
            validate_model_id("-leading-hyphen"),
            Err(ModelValidationError::InvalidIdFormat { .. })
        ));
        assert!(matches!(
            validate_model_id("has spaces"),
            Err(ModelValidationError::InvalidIdFormat { .. })
        ));
        assert!(matches!(
            validate_model_id(&"x".repeat(101)),
            Err(ModelValidationError::IdTooLong { .. })
        ));
    }

    #[test]
    fn test_generation_param_bounds() {
        assert!(validate_generation_params(Some(0.7), Some(0.95), Some(2000)).is_ok());
        assert!(matches!(
            validate_generation_params(Some(2.5), None, None),
            Err(ModelValidationError::InvalidTemperature { .. })
        ));
        assert!(matches!(
            validate_generation_params(None, Some(1.5), None),
            Err(ModelValidationError::InvalidTopP { .. })
        ));
        assert_eq!(
            validate_generation_params(None, None, Some(0)),
            Err(ModelValidationError::InvalidMaxTokens)
        );
    }
}
