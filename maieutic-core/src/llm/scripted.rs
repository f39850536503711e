//! Scripted provider for offline evaluation runs
//!
//! Replies are picked by case-insensitive substring match against the last
//! user message; the first matching rule wins.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{LLMProvider, LLMRequest, LLMResponse, ModelInfo};
use crate::error::{MaieuticError, Result};

/// One canned reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedReply {
    /// Substring of the user message that selects this rule
    pub contains: String,

    /// Text to return
    #[serde(default)]
    pub reply: Option<String>,

    /// Fail the call with this message instead of replying
    #[serde(default)]
    pub error: Option<String>,
}

/// On-disk form of a script
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub default_reply: Option<String>,
    #[serde(default)]
    pub replies: Vec<ScriptedReply>,
}

/// Provider that answers from a fixed script and records every request
pub struct ScriptedLlm {
    script: Script,
    calls: Arc<Mutex<Vec<LLMRequest>>>,
}

impl ScriptedLlm {
    /// A provider that always returns `default_reply`
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self::from_script(Script {
            default_reply: Some(default_reply.into()),
            replies: Vec::new(),
        })
    }

    pub fn from_script(script: Script) -> Self {
        Self {
            script,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Load a script from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MaieuticError::Configuration(format!(
                "cannot read response script {}: {}",
                path.display(),
                e
            ))
        })?;
        let script = Self::parse(&content).map_err(|e| {
            MaieuticError::Configuration(format!(
                "invalid response script {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::from_script(script))
    }

    /// Parse either a full [`Script`] or a flat `{"input": "reply"}` map.
    ///
    /// Flat map rules are tried in key order.
    pub fn parse(content: &str) -> std::result::Result<Script, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let is_script = value
            .as_object()
            .is_some_and(|map| map.contains_key("replies") || map.contains_key("default_reply"));
        if is_script {
            return serde_json::from_value(value);
        }

        let map: std::collections::BTreeMap<String, String> = serde_json::from_value(value)?;
        Ok(Script {
            default_reply: None,
            replies: map
                .into_iter()
                .map(|(contains, reply)| ScriptedReply {
                    contains,
                    reply: Some(reply),
                    error: None,
                })
                .collect(),
        })
    }

    /// Add a rule replying with `reply` when the message contains `contains`
    pub fn with_reply(mut self, contains: impl Into<String>, reply: impl Into<String>) -> Self {
        self.script.replies.push(ScriptedReply {
            contains: contains.into(),
            reply: Some(reply.into()),
            error: None,
        });
        self
    }

    /// Add a rule failing the call when the message contains `contains`
    pub fn with_failure(mut self, contains: impl Into<String>, error: impl Into<String>) -> Self {
        self.script.replies.push(ScriptedReply {
            contains: contains.into(),
            reply: None,
            error: Some(error.into()),
        });
        self
    }

    /// Requests received so far
    pub async fn calls(&self) -> Vec<LLMRequest> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
        self.calls.lock().await.push(request.clone());

        let message = request.last_user_message().unwrap_or_default().to_lowercase();
        let rule = self
            .script
            .replies
            .iter()
            .find(|r| message.contains(&r.contains.to_lowercase()));

        match rule {
            Some(ScriptedReply {
                error: Some(error), ..
            }) => Err(MaieuticError::Llm(error.clone())),
            Some(ScriptedReply {
                reply: Some(reply), ..
            }) => Ok(LLMResponse::text(reply.clone())),
            _ => self
                .script
                .default_reply
                .clone()
                .map(LLMResponse::text)
                .ok_or_else(|| {
                    MaieuticError::Llm("no scripted reply matches the request".to_string())
                }),
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "scripted".to_string(),
            model_name: "script".to_string(),
        }
    }
}
