//! Request classification types
//!
//! A request enters the system with text, optional media attachments, and a
//! running context token count; classification assigns it a complexity
//! category and a route.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::model::ModelId;

/// Complexity category assigned to an incoming request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Low,
    Medium,
    High,
}

impl Category {
    pub fn as_letter(&self) -> char {
        match self {
            Self::Low => 'L',
            Self::Medium => 'M',
            Self::High => 'H',
        }
    }
}

impl FromStr for Category {
    type Err = ();

    /// Accepts the single-letter form a categorizer model emits, possibly
    /// surrounded by whitespace or extra prose; the first L/M/H wins.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        for c in s.chars() {
            match c.to_ascii_uppercase() {
                'L' => return Ok(Self::Low),
                'M' => return Ok(Self::Medium),
                'H' => return Ok(Self::High),
                c if c.is_ascii_alphanumeric() => return Err(()),
                _ => continue,
            }
        }
        Err(())
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_letter())
    }
}

/// Kind of media attached to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

/// A media attachment carried alongside the request text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: MediaKind,
    /// URL or opaque reference understood by the media route
    pub reference: String,
}

/// An incoming user request, before classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingRequest {
    pub text: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    /// Running token count of the conversation context
    #[serde(default)]
    pub context_tokens: u32,

    /// Session to append this exchange to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl IncomingRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
            context_tokens: 0,
            session_id: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_context_tokens(mut self, tokens: u32) -> Self {
        self.context_tokens = tokens;
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn has_media(&self) -> bool {
        !self.attachments.is_empty()
    }
}

/// Where a classified request goes next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// One resilient call to the named model answers the request
    Direct { category: Category, model: ModelId },
    /// The request needs a generated workflow
    Orchestrated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parsing() {
        assert_eq!("L".parse::<Category>(), Ok(Category::Low));
        assert_eq!(" m ".parse::<Category>(), Ok(Category::Medium));
        assert_eq!("H\n".parse::<Category>(), Ok(Category::High));
        assert_eq!("unsure".parse::<Category>(), Err(()));
        assert_eq!("".parse::<Category>(), Err(()));
    }

    #[test]
    fn test_request_builder() {
        let request = IncomingRequest::new("make a campaign")
            .with_attachment(Attachment {
                kind: MediaKind::Image,
                reference: "https://example.com/logo.png".to_string(),
            })
            .with_context_tokens(1200)
            .with_session_id("session-1");

        assert!(request.has_media());
        assert_eq!(request.context_tokens, 1200);
        assert_eq!(request.session_id.as_deref(), Some("session-1"));
    }
}
