//! LLM Gateway port
//!
//! Defines the interface for calling a language model. Implementations
//! (adapters and decorators such as the fallback/deadline wrapper) live in
//! the infrastructure layer.

use async_trait::async_trait;
use hq_domain::{Message, Model};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during LLM gateway operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Model returned no content")]
    EmptyResponse,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("{model} failed ({primary}); fallback {fallback} failed ({secondary})")]
    FallbackExhausted {
        model: String,
        primary: String,
        fallback: String,
        secondary: String,
    },

    #[error("Other error: {0}")]
    Other(String),
}

/// A single chat-completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub model: Model,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ModelRequest {
    pub fn new(model: Model) -> Self {
        Self {
            model,
            messages: Vec::new(),
            max_tokens: 4096,
            temperature: 0.7,
        }
    }

    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::system(content));
        self
    }

    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(Message::user(content));
        self
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Same request against a different model
    pub fn for_model(&self, model: Model) -> Self {
        Self {
            model,
            ..self.clone()
        }
    }

    /// Content of the last user message, for logging
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == hq_domain::Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Gateway for LLM communication
///
/// `complete` never panics; every failure is returned as a [`GatewayError`].
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<String, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = ModelRequest::new(Model::Gpt5)
            .system("You are the General.")
            .user("first")
            .user("second")
            .with_limits(512, 0.2);
        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.last_user_message(), Some("second"));
        assert_eq!(request.max_tokens, 512);

        let retried = request.for_model(Model::Gpt5Mini);
        assert_eq!(retried.model, Model::Gpt5Mini);
        assert_eq!(retried.messages, request.messages);
    }

    #[test]
    fn test_fallback_error_display() {
        let err = GatewayError::FallbackExhausted {
            model: "openai/gpt-5".to_string(),
            primary: "Timed out after 1s".to_string(),
            fallback: "openai/gpt-5-mini".to_string(),
            secondary: "Model returned no content".to_string(),
        };
        assert!(err.to_string().contains("fallback openai/gpt-5-mini failed"));
    }
}
