//! Recording modes and payload redaction
//!
//! Sessions keep raw payloads in memory, so recording mode never changes a
//! score. The [`Redactor`] runs on the copy that leaves the process, when a
//! trace is saved or exported through the [`TraceRecorder`](super::TraceRecorder).
//! It only touches tool and model payloads; user input and agent responses
//! are written verbatim.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event::EventData;
use super::session::TraceSession;
use crate::error::{MaieuticError, Result};

const REDACTED: &str = "[REDACTED]";

/// Recording mode for capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordingMode {
    /// Tool payloads and model text verbatim; traces may then hold secrets
    Full,

    /// Secret-looking keys and values masked when the trace is written out
    #[default]
    Redacted,

    /// Events are validated and sequenced but not retained
    Disabled,
}

/// What a recorder keeps from each event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Recording mode
    pub mode: RecordingMode,

    /// Patterns for keys and values that should be redacted (regex patterns)
    pub redact_patterns: Vec<String>,

    /// Maximum size of a recorded string (larger values are truncated)
    pub max_data_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mode: RecordingMode::Redacted,
            redact_patterns: vec![
                r"(?i)password".to_string(),
                r"(?i)secret".to_string(),
                r"(?i)api_key".to_string(),
                r"(?i)token".to_string(),
                r"(?i)auth".to_string(),
            ],
            max_data_size: 10_000,
        }
    }
}

/// Compiled redaction policy
#[derive(Debug, Clone)]
pub struct Redactor {
    mode: RecordingMode,
    patterns: Vec<Regex>,
    max_data_size: usize,
}

impl Redactor {
    /// Compile the patterns of a capture configuration.
    pub fn new(config: &CaptureConfig) -> Result<Self> {
        let patterns = config
            .redact_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    MaieuticError::Configuration(format!("invalid redact pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            mode: config.mode,
            patterns,
            max_data_size: config.max_data_size,
        })
    }

    /// Default patterns with the given mode
    pub fn with_mode(mode: RecordingMode) -> Self {
        let config = CaptureConfig::default();
        Self {
            mode,
            patterns: config
                .redact_patterns
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
            max_data_size: config.max_data_size,
        }
    }

    pub fn mode(&self) -> RecordingMode {
        self.mode
    }

    /// Copy of `session` with the policy applied to every event
    pub fn redact_session(&self, session: &TraceSession) -> TraceSession {
        let mut copy = session.clone();
        if self.mode == RecordingMode::Redacted {
            copy.events = copy
                .events
                .into_iter()
                .map(|mut event| {
                    event.data = self.apply(event.data);
                    event
                })
                .collect();
        }
        copy
    }

    /// Apply the policy to one event payload.
    pub fn apply(&self, data: EventData) -> EventData {
        if self.mode != RecordingMode::Redacted {
            return data;
        }

        match data {
            EventData::ToolCall(mut call) => {
                call.arguments = self.redact_value(&call.arguments);
                EventData::ToolCall(call)
            }
            EventData::ToolResponse(mut response) => {
                response.result = response.result.as_ref().map(|v| self.redact_value(v));
                response.error = response.error.map(|e| self.truncate(e));
                EventData::ToolResponse(response)
            }
            EventData::LlmRequest(mut request) => {
                request.system_prompt = self.truncate(request.system_prompt);
                request.message = self.truncate(request.message);
                EventData::LlmRequest(request)
            }
            EventData::LlmResponse(mut response) => {
                response.content = self.truncate(response.content);
                EventData::LlmResponse(response)
            }
            other => other,
        }
    }

    fn matches(&self, s: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(s))
    }

    fn truncate(&self, s: String) -> String {
        if s.len() <= self.max_data_size {
            return s;
        }
        let mut cut = self.max_data_size;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &s[..cut], s.len())
    }

    /// Walk `value`, masking keys and strings that look like credentials
    pub fn redact_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => {
                if self.matches(s) {
                    Value::String(REDACTED.to_string())
                } else {
                    Value::String(self.truncate(s.clone()))
                }
            }
            Value::Object(map) => {
                let mut new_map = serde_json::Map::new();
                for (k, v) in map {
                    if self.matches(k) {
                        new_map.insert(k.clone(), Value::String(REDACTED.to_string()));
                    } else {
                        new_map.insert(k.clone(), self.redact_value(v));
                    }
                }
                Value::Object(new_map)
            }
            Value::Array(arr) => Value::Array(arr.iter().map(|v| self.redact_value(v)).collect()),
            _ => value.clone(),
        }
    }
}

#[cfg(test)]
mod capture_tests {
    use super::*;
    use crate::trace::event::{AgentMode, AgentResponseData, ToolCallData, TraceEvent};
    use serde_json::json;

    #[test]
    fn test_redaction() {
        let redactor = Redactor::new(&CaptureConfig::default()).unwrap();

        let sensitive_data = json!({
            "username": "learner_42",
            "password": "secret123",
            "api_key": "sk-12345",
            "problem_slug": "visible"
        });

        let redacted = redactor.redact_value(&sensitive_data);

        assert_eq!(redacted["username"], "learner_42");
        assert_eq!(redacted["password"], "[REDACTED]");
        assert_eq!(redacted["api_key"], "[REDACTED]");
        assert_eq!(redacted["problem_slug"], "visible");
    }

    #[test]
    fn test_tool_arguments_redacted_but_response_text_kept() {
        let redactor = Redactor::new(&CaptureConfig::default()).unwrap();

        let call = redactor.apply(EventData::ToolCall(ToolCallData {
            tool_name: "fetch_leetcode_problem".to_string(),
            arguments: json!({"difficulty": "easy", "auth_header": "Bearer abc"}),
        }));
        let EventData::ToolCall(call) = call else {
            panic!("variant changed");
        };
        assert_eq!(call.arguments["difficulty"], "easy");
        assert_eq!(call.arguments["auth_header"], "[REDACTED]");

        let text = "Think about what a token of the input tells you?".to_string();
        let response = redactor.apply(EventData::AgentResponse(AgentResponseData {
            turn: 1,
            mode: AgentMode::Tutor,
            response: text.clone(),
        }));
        let EventData::AgentResponse(response) = response else {
            panic!("variant changed");
        };
        assert_eq!(response.response, text);
    }

    #[test]
    fn test_long_strings_truncated() {
        let config = CaptureConfig {
            max_data_size: 8,
            ..Default::default()
        };
        let redactor = Redactor::new(&config).unwrap();
        let value = redactor.redact_value(&json!("abcdefghijklmnop"));
        assert!(value.as_str().unwrap().starts_with("abcdefgh... [truncated"));
    }

    #[test]
    fn test_full_mode_keeps_everything() {
        let config = CaptureConfig {
            mode: RecordingMode::Full,
            ..Default::default()
        };
        let redactor = Redactor::new(&config).unwrap();
        let data = EventData::ToolCall(ToolCallData {
            tool_name: "t".to_string(),
            arguments: json!({"password": "hunter2"}),
        });
        assert_eq!(redactor.apply(data.clone()), data);
    }

    #[test]
    fn test_redact_session_leaves_source_untouched() {
        let redactor = Redactor::new(&CaptureConfig::default()).unwrap();
        let mut session = TraceSession::new("s");
        session.events.push(TraceEvent {
            session_id: "s".to_string(),
            sequence_no: 0,
            timestamp: chrono::Utc::now(),
            duration_ms: None,
            data: EventData::ToolCall(ToolCallData {
                tool_name: "fetch_leetcode_problem".to_string(),
                arguments: json!({"slug": "design-authentication-manager"}),
            }),
        });

        let redacted = redactor.redact_session(&session);
        assert_eq!(redacted.tool_calls().next().unwrap().arguments["slug"], "[REDACTED]");
        assert_eq!(
            session.tool_calls().next().unwrap().arguments["slug"],
            "design-authentication-manager"
        );
        assert_eq!(redacted.session_id, session.session_id);
    }
}
