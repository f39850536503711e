//! Stub tools for deterministic offline runs
//!
//! A stub returns its configured responses in order and repeats the last one
//! once they run out. Stub files map tool names to one response or a list:
//!
//! ```json
//! {
//!   "fetch_leetcode_problem": {"value": {"title": "Two Sum", "difficulty": "Easy"}},
//!   "flaky_lookup": [
//!     {"error": {"kind": "transient", "message": "connection reset"}},
//!     {"value": "ok", "delay_ms": 20}
//!   ]
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{Tool, ToolError, ToolErrorKind, ToolOutput};
use crate::error::{MaieuticError, Result};

/// One canned outcome of a stub call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StubResponse {
    /// Value to return on success
    #[serde(default)]
    pub value: Option<Value>,

    /// Error to return instead
    #[serde(default)]
    pub error: Option<ToolError>,

    /// Simulated latency
    #[serde(default)]
    pub delay_ms: u64,
}

impl StubResponse {
    pub fn success(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn error(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: Some(ToolError::new(kind, message)),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StubEntry {
    Many(Vec<StubResponse>),
    One(StubResponse),
}

/// A tool that replays predetermined responses
pub struct StubTool {
    name: String,
    description: String,
    responses: Vec<StubResponse>,
    call_count: AtomicUsize,
    call_history: Arc<RwLock<Vec<Value>>>,
}

impl StubTool {
    pub fn new(name: impl Into<String>, response: StubResponse) -> Self {
        Self::with_responses(name, vec![response])
    }

    /// Responses are returned in order; the last one repeats
    pub fn with_responses(name: impl Into<String>, responses: Vec<StubResponse>) -> Self {
        let name = name.into();
        Self {
            description: format!("Stub tool: {}", name),
            name,
            responses,
            call_count: AtomicUsize::new(0),
            call_history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Load every stub defined in a JSON file
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<StubTool>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MaieuticError::Configuration(format!(
                "cannot read tool stubs {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse_all(&content).map_err(|e| {
            MaieuticError::Configuration(format!("invalid tool stubs {}: {}", path.display(), e))
        })
    }

    fn parse_all(content: &str) -> std::result::Result<Vec<StubTool>, serde_json::Error> {
        let entries: BTreeMap<String, StubEntry> = serde_json::from_str(content)?;
        Ok(entries
            .into_iter()
            .map(|(name, entry)| match entry {
                StubEntry::Many(responses) => Self::with_responses(name, responses),
                StubEntry::One(response) => Self::new(name, response),
            })
            .collect())
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Arguments passed to each call so far
    pub async fn call_history(&self) -> Vec<Value> {
        self.call_history.read().await.clone()
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn invoke(&self, args: Value) -> ToolOutput {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.call_history.write().await.push(args);

        let response = self
            .responses
            .get(call_num)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_default();

        if response.delay_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(response.delay_ms)).await;
        }

        match response.error {
            Some(error) => Err(error),
            None => Ok(response.value.unwrap_or(Value::Null)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_responses_in_order_then_repeat_last() {
        let stub = StubTool::with_responses(
            "lookup",
            vec![
                StubResponse::error(ToolErrorKind::Transient, "connection reset"),
                StubResponse::success(json!("ok")),
            ],
        );

        assert!(stub.invoke(json!({"n": 1})).await.is_err());
        assert_eq!(stub.invoke(json!({"n": 2})).await.unwrap(), json!("ok"));
        assert_eq!(stub.invoke(json!({"n": 3})).await.unwrap(), json!("ok"));
        assert_eq!(stub.call_count(), 3);
        assert_eq!(stub.call_history().await[1], json!({"n": 2}));
    }

    #[tokio::test]
    async fn test_no_responses_returns_null() {
        let stub = StubTool::with_responses("empty", Vec::new());
        assert_eq!(stub.invoke(Value::Null).await.unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_stub_file() {
        let stubs = StubTool::parse_all(
            r#"{
                "fetch_leetcode_problem": {"value": {"title": "Two Sum"}},
                "flaky": [
                    {"error": {"kind": "timeout", "message": "slow"}},
                    {"value": 1, "delay_ms": 5}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(stubs.len(), 2);
        assert_eq!(stubs[0].name(), "fetch_leetcode_problem");
        assert_eq!(stubs[1].name(), "flaky");
        assert_eq!(stubs[1].responses.len(), 2);
        assert_eq!(stubs[1].responses[1].delay_ms, 5);
    }

    #[test]
    fn test_load_missing_file() {
        let err = StubTool::load_all("/nonexistent/stubs.json").err().unwrap();
        assert!(matches!(err, MaieuticError::Configuration(_)));
    }
}
