//! Chat completions provider for OpenAI and compatible servers

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{WireMessage, post_json, wire_messages};
use crate::error::{MaieuticError, Result};
use crate::llm::{LLMProvider, LLMRequest, LLMResponse, ModelInfo, TokenUsage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// Talks to any `/chat/completions` endpoint with bearer auth
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    /// Point at a self-hosted or proxy endpoint
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build from `OPENAI_API_KEY`, `OPENAI_MODEL` and `OPENAI_BASE_URL`.
    ///
    /// An explicit `model` wins over `OPENAI_MODEL`.
    ///
    /// # Errors
    ///
    /// Configuration error when `OPENAI_API_KEY` is missing.
    pub fn from_env(model: Option<String>) -> Result<Self> {
        let Ok(api_key) = std::env::var("OPENAI_API_KEY") else {
            return Err(MaieuticError::Configuration(
                "OPENAI_API_KEY is not set".to_string(),
            ));
        };
        let model = model
            .or_else(|| std::env::var("OPENAI_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self::with_base_url(api_key, model, base_url))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

/// `{"error": {"message", "type"}}`
#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

fn explain_error(body: &str) -> Option<String> {
    let ApiErrorBody { error } = serde_json::from_str(body).ok()?;
    Some(match error.kind {
        Some(kind) => format!("{} ({})", error.message, kind),
        None => error.message,
    })
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let body = CompletionRequest {
            model: &self.model,
            messages: wire_messages(request),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let http = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key);
        let completion: Completion = post_json("openai", http, &body, explain_error).await?;

        let Some(choice) = completion.choices.into_iter().next() else {
            return Err(MaieuticError::Llm("openai returned no choices".to_string()));
        };

        Ok(LLMResponse {
            content: choice.message.and_then(|m| m.content).unwrap_or_default(),
            usage: completion.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "openai".to_string(),
            model_name: self.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let provider = OpenAIProvider::new("test-key", "gpt-4o-mini");
        assert_eq!(provider.model(), "gpt-4o-mini");
        assert_eq!(provider.base_url(), DEFAULT_BASE_URL);
        assert_eq!(provider.model_info().provider, "openai");

        let local = OpenAIProvider::with_base_url("k", "local", "http://localhost:8000/v1/");
        assert_eq!(local.base_url(), "http://localhost:8000/v1");
    }

    #[test]
    fn test_explain_error() {
        let body = r#"{"error": {"message": "Invalid API key", "type": "invalid_request_error"}}"#;
        assert_eq!(
            explain_error(body).as_deref(),
            Some("Invalid API key (invalid_request_error)")
        );
        assert!(explain_error("<html>bad gateway</html>").is_none());
    }

    #[test]
    fn test_completion_without_usage() {
        let completion: Completion =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "Why?"}}]}"#).unwrap();
        assert!(completion.usage.is_none());
        assert_eq!(
            completion.choices[0].message.as_ref().unwrap().content.as_deref(),
            Some("Why?")
        );
    }
}
