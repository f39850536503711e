//! Tool boundary
//!
//! Agents reach the outside world only through a [`ToolSet`]. Every call is
//! recorded into the caller's session as a TOOL_CALL followed by its
//! TOOL_RESPONSE, so trajectory scoring sees exactly what the agent did.
//! Tool failures are values ([`ToolError`]) recorded into the trace; they
//! never abort the turn.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;
use crate::trace::{EventData, SessionHandle, ToolCallData, ToolResponseData};

#[cfg(feature = "tool-leetcode")]
pub mod leetcode;
pub mod stub;

#[cfg(feature = "tool-leetcode")]
pub use leetcode::LeetCodeTool;
pub use stub::{StubResponse, StubTool};

/// Name of the problem-fetching tool the tutor calls
pub const FETCH_PROBLEM_TOOL: &str = "fetch_leetcode_problem";

/// Outcome of a single tool invocation
pub type ToolOutput = std::result::Result<Value, ToolError>;

/// Structured tool error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Internal, message)
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for ToolError {}

/// Error kind taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// Arguments were rejected (fix args, don't retry)
    Validation,
    /// Execution timed out
    Timeout,
    /// Transient network/service error
    Transient,
    /// Resource not found
    NotFound,
    /// Malformed response from the external system
    InvalidResponse,
    /// Bug in the tool or no such tool
    Internal,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorKind::Validation => "validation",
            ToolErrorKind::Timeout => "timeout",
            ToolErrorKind::Transient => "transient",
            ToolErrorKind::NotFound => "not_found",
            ToolErrorKind::InvalidResponse => "invalid_response",
            ToolErrorKind::Internal => "internal",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ToolErrorKind::Timeout | ToolErrorKind::Transient | ToolErrorKind::InvalidResponse
        )
    }
}

/// Core tool trait
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name, as it appears in TOOL_CALL events
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str {
        ""
    }

    /// Execute the tool with the given arguments
    async fn invoke(&self, args: Value) -> ToolOutput;
}

/// Registry of tools available to an agent
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered tool names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Invoke a tool and record the call and its response in `session`.
    ///
    /// An unknown tool is recorded as an unsuccessful response. The outer
    /// `Result` only fails when the session refuses the events.
    pub async fn call(
        &self,
        session: &SessionHandle,
        name: &str,
        args: Value,
    ) -> Result<ToolOutput> {
        session
            .record(
                EventData::ToolCall(ToolCallData {
                    tool_name: name.to_string(),
                    arguments: args.clone(),
                }),
                None,
            )
            .await?;

        let started = Instant::now();
        let output = match self.tools.get(name) {
            Some(tool) => tool.invoke(args).await,
            None => Err(ToolError::not_found(format!("unknown tool: {}", name))),
        };
        let elapsed = started.elapsed();

        let data = match &output {
            Ok(value) => ToolResponseData {
                tool_name: name.to_string(),
                success: true,
                result: Some(value.clone()),
                error: None,
            },
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "tool call failed");
                ToolResponseData {
                    tool_name: name.to_string(),
                    success: false,
                    result: None,
                    error: Some(e.to_string()),
                }
            }
        };
        session
            .record(EventData::ToolResponse(data), Some(elapsed))
            .await?;

        Ok(output)
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.names())
            .finish()
    }
}
