//! Local models served by Ollama (`/api/chat`, non-streaming)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{WireMessage, post_json, wire_messages};
use crate::error::Result;
use crate::llm::{LLMProvider, LLMRequest, LLMResponse, ModelInfo, TokenUsage};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "qwen3:14b";

pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    base_url: String,
}

impl OllamaProvider {
    /// `base_url` defaults to the local daemon
    pub fn new(model: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            model: model.into(),
            base_url: base_url
                .as_deref()
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// Read `OLLAMA_MODEL` and `OLLAMA_BASE_URL`; an explicit `model` wins
    pub fn from_env(model: Option<String>) -> Self {
        let model = model
            .or_else(|| std::env::var("OLLAMA_MODEL").ok())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self::new(model, std::env::var("OLLAMA_BASE_URL").ok())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_body<'a>(&'a self, request: &'a LLMRequest) -> ChatBody<'a> {
        let wants_options = request.temperature.is_some() || request.max_tokens.is_some();
        ChatBody {
            model: &self.model,
            messages: wire_messages(request),
            stream: false,
            options: wants_options.then_some(SamplingOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            }),
        }
    }
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<SamplingOptions>,
}

#[derive(Serialize)]
struct SamplingOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>,
}

#[derive(Deserialize)]
struct ChatReply {
    message: ReplyMessage,
    prompt_eval_count: Option<usize>,
    eval_count: Option<usize>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    thinking: Option<String>,
}

impl ChatReply {
    /// Reasoning models may leave `content` empty and answer in `thinking`
    fn into_response(self) -> LLMResponse {
        let content = match self.message.content.trim() {
            "" => self.message.thinking.as_deref().unwrap_or_default().trim(),
            text => text,
        }
        .to_string();

        let usage = match (self.prompt_eval_count, self.eval_count) {
            (Some(prompt_tokens), Some(completion_tokens)) => Some(TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            }),
            _ => None,
        };
        LLMResponse { content, usage }
    }
}

/// Ollama reports failures as `{"error": "..."}`
fn explain_error(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("error")?.as_str().map(str::to_string)
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
        let http = self.client.post(format!("{}/api/chat", self.base_url));
        let reply: ChatReply =
            post_json("ollama", http, &self.chat_body(request), explain_error).await?;
        Ok(reply.into_response())
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "ollama".to_string(),
            model_name: self.model.clone(),
        }
    }
}
