//! Model request/response boundary
//!
//! The agent never talks to a model directly; it builds an [`LLMRequest`]
//! value, awaits an [`LLMProvider`], and records both sides in the trace.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Who wrote a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// One chat turn sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Everything a provider needs for one completion
#[derive(Debug, Clone, PartialEq)]
pub struct LLMRequest {
    /// System prompt first, then the user turn
    pub messages: Vec<Message>,

    /// Clamped to 0.0..=2.0
    pub temperature: Option<f32>,

    pub max_tokens: Option<usize>,
}

impl LLMRequest {
    /// A lone user turn
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(prompt)],
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system_prompt(
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(user_prompt)],
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 2.0));
        self
    }

    /// Content of the first system message
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
    }

    /// Content of the last user message
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }
}

/// Model reply
#[derive(Debug, Clone, PartialEq)]
pub struct LLMResponse {
    pub content: String,

    /// Absent when the provider does not report counts
    pub usage: Option<TokenUsage>,
}

impl LLMResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Provider and model names, as written into trace metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub provider: String,
    pub model_name: String,
}

/// A chat model behind some transport.
///
/// Implementations return [`MaieuticError::Llm`](crate::error::MaieuticError::Llm)
/// for network and decoding failures so the retry layer can tell them apart
/// from configuration mistakes.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse>;

    /// Convenience wrapper returning only the text
    async fn generate(&self, prompt: &str) -> Result<String> {
        let response = self
            .generate_request(&LLMRequest::from_prompt(prompt))
            .await?;
        Ok(response.content)
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "unknown".to_string(),
            model_name: "unknown".to_string(),
        }
    }
}

pub mod factory;
pub mod providers;
pub mod retry;
pub mod scripted;

pub use factory::LLMProviderFactory;
pub use retry::{RetryConfig, RetryingProvider, with_retry};
pub use scripted::ScriptedLlm;
