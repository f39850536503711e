//! Trace event schema
//!
//! Every event carries a payload whose shape is fixed by its `event_type`.
//! On the wire an event is a flat object with `event_type` and a `data`
//! object; decoding checks `data` against the schema for that type, so a
//! malformed payload is rejected when the event is read, not when it is used.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Conversational persona the agent is operating as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    /// Classifies intent; the initial mode of every session
    #[default]
    Router,
    /// Socratic tutor
    Tutor,
    /// Mock interviewer
    Interviewer,
    /// Simulated student the user teaches
    Student,
}

impl AgentMode {
    pub const ALL: [AgentMode; 4] = [
        AgentMode::Router,
        AgentMode::Tutor,
        AgentMode::Interviewer,
        AgentMode::Student,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentMode::Router => "router",
            AgentMode::Tutor => "tutor",
            AgentMode::Interviewer => "interviewer",
            AgentMode::Student => "student",
        }
    }

    /// Parse a mode name, accepting the common persona aliases.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "router" | "manager" => Some(AgentMode::Router),
            "tutor" => Some(AgentMode::Tutor),
            "interviewer" => Some(AgentMode::Interviewer),
            "student" | "student_sim" | "student_simulator" => Some(AgentMode::Student),
            _ => None,
        }
    }
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    SessionStart,
    UserInput,
    IntentRouting,
    StateTransition,
    ToolCall,
    ToolResponse,
    LlmRequest,
    LlmResponse,
    AgentResponse,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::SessionStart => "SESSION_START",
            EventType::UserInput => "USER_INPUT",
            EventType::IntentRouting => "INTENT_ROUTING",
            EventType::StateTransition => "STATE_TRANSITION",
            EventType::ToolCall => "TOOL_CALL",
            EventType::ToolResponse => "TOOL_RESPONSE",
            EventType::LlmRequest => "LLM_REQUEST",
            EventType::LlmResponse => "LLM_RESPONSE",
            EventType::AgentResponse => "AGENT_RESPONSE",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStartData {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInputData {
    /// 1-based turn this input opens
    pub turn: u32,
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentRoutingData {
    pub turn: u32,
    /// Mode active when the input arrived
    pub current_mode: AgentMode,
    /// Mode the router chose
    pub target_mode: AgentMode,
    /// Router confidence in [0, 1]
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransitionData {
    pub turn: u32,
    pub from_mode: AgentMode,
    pub to_mode: AgentMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallData {
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponseData {
    pub tool_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmRequestData {
    pub mode: AgentMode,
    /// Pedagogical move the agent chose for this turn
    pub directive: String,
    pub system_prompt: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmResponseData {
    pub content: String,
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponseData {
    pub turn: u32,
    pub mode: AgentMode,
    pub response: String,
}

/// Event payload, one variant per [`EventType`]
#[derive(Debug, Clone, PartialEq)]
pub enum EventData {
    SessionStart(SessionStartData),
    UserInput(UserInputData),
    IntentRouting(IntentRoutingData),
    StateTransition(StateTransitionData),
    ToolCall(ToolCallData),
    ToolResponse(ToolResponseData),
    LlmRequest(LlmRequestData),
    LlmResponse(LlmResponseData),
    AgentResponse(AgentResponseData),
}

impl EventData {
    /// The event type this payload belongs to
    pub fn event_type(&self) -> EventType {
        match self {
            EventData::SessionStart(_) => EventType::SessionStart,
            EventData::UserInput(_) => EventType::UserInput,
            EventData::IntentRouting(_) => EventType::IntentRouting,
            EventData::StateTransition(_) => EventType::StateTransition,
            EventData::ToolCall(_) => EventType::ToolCall,
            EventData::ToolResponse(_) => EventType::ToolResponse,
            EventData::LlmRequest(_) => EventType::LlmRequest,
            EventData::LlmResponse(_) => EventType::LlmResponse,
            EventData::AgentResponse(_) => EventType::AgentResponse,
        }
    }

    fn to_value(&self) -> Value {
        let value = match self {
            EventData::SessionStart(d) => serde_json::to_value(d),
            EventData::UserInput(d) => serde_json::to_value(d),
            EventData::IntentRouting(d) => serde_json::to_value(d),
            EventData::StateTransition(d) => serde_json::to_value(d),
            EventData::ToolCall(d) => serde_json::to_value(d),
            EventData::ToolResponse(d) => serde_json::to_value(d),
            EventData::LlmRequest(d) => serde_json::to_value(d),
            EventData::LlmResponse(d) => serde_json::to_value(d),
            EventData::AgentResponse(d) => serde_json::to_value(d),
        };
        // Payload structs hold only strings, numbers, enums and JSON values.
        value.unwrap_or(Value::Null)
    }

    fn from_value(event_type: EventType, data: Value) -> Result<Self, serde_json::Error> {
        Ok(match event_type {
            EventType::SessionStart => EventData::SessionStart(serde_json::from_value(data)?),
            EventType::UserInput => EventData::UserInput(serde_json::from_value(data)?),
            EventType::IntentRouting => EventData::IntentRouting(serde_json::from_value(data)?),
            EventType::StateTransition => {
                EventData::StateTransition(serde_json::from_value(data)?)
            }
            EventType::ToolCall => EventData::ToolCall(serde_json::from_value(data)?),
            EventType::ToolResponse => EventData::ToolResponse(serde_json::from_value(data)?),
            EventType::LlmRequest => EventData::LlmRequest(serde_json::from_value(data)?),
            EventType::LlmResponse => EventData::LlmResponse(serde_json::from_value(data)?),
            EventType::AgentResponse => EventData::AgentResponse(serde_json::from_value(data)?),
        })
    }
}

/// One recorded occurrence within a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTraceEvent", into = "RawTraceEvent")]
pub struct TraceEvent {
    /// Session this event belongs to
    pub session_id: String,

    /// Position in the session; gapless, starting at 0
    pub sequence_no: u64,

    /// Capture instant (advisory; `sequence_no` defines order)
    pub timestamp: DateTime<Utc>,

    /// Elapsed time of the operation this event closes out
    pub duration_ms: Option<u64>,

    /// Typed payload
    pub data: EventData,
}

impl TraceEvent {
    pub fn event_type(&self) -> EventType {
        self.data.event_type()
    }
}

/// Wire shape of a [`TraceEvent`]
#[derive(Serialize, Deserialize)]
struct RawTraceEvent {
    session_id: String,
    sequence_no: u64,
    event_type: EventType,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    data: Value,
}

impl TryFrom<RawTraceEvent> for TraceEvent {
    type Error = String;

    fn try_from(raw: RawTraceEvent) -> Result<Self, Self::Error> {
        let data = EventData::from_value(raw.event_type, raw.data).map_err(|e| {
            format!(
                "invalid {} payload at sequence {}: {}",
                raw.event_type, raw.sequence_no, e
            )
        })?;
        Ok(TraceEvent {
            session_id: raw.session_id,
            sequence_no: raw.sequence_no,
            timestamp: raw.timestamp,
            duration_ms: raw.duration_ms,
            data,
        })
    }
}

impl From<TraceEvent> for RawTraceEvent {
    fn from(event: TraceEvent) -> Self {
        RawTraceEvent {
            event_type: event.data.event_type(),
            data: event.data.to_value(),
            session_id: event.session_id,
            sequence_no: event.sequence_no,
            timestamp: event.timestamp,
            duration_ms: event.duration_ms,
        }
    }
}

#[cfg(test)]
mod event_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let event = TraceEvent {
            session_id: "s1".to_string(),
            sequence_no: 3,
            timestamp: Utc::now(),
            duration_ms: Some(12),
            data: EventData::StateTransition(StateTransitionData {
                turn: 1,
                from_mode: AgentMode::Router,
                to_mode: AgentMode::Tutor,
            }),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], "STATE_TRANSITION");
        assert_eq!(value["data"]["from_mode"], "router");
        assert_eq!(value["data"]["to_mode"], "tutor");
        assert_eq!(value["duration_ms"], 12);
    }

    #[test]
    fn test_rejects_payload_of_wrong_shape() {
        let value = json!({
            "session_id": "s1",
            "sequence_no": 0,
            "event_type": "STATE_TRANSITION",
            "timestamp": "2025-01-01T00:00:00Z",
            "data": {"tool_name": "fetch_leetcode_problem"}
        });

        let err = serde_json::from_value::<TraceEvent>(value).unwrap_err();
        assert!(err.to_string().contains("STATE_TRANSITION"));
    }

    #[test]
    fn test_instantaneous_event_omits_duration() {
        let event = TraceEvent {
            session_id: "s1".to_string(),
            sequence_no: 0,
            timestamp: Utc::now(),
            duration_ms: None,
            data: EventData::SessionStart(SessionStartData {
                session_id: "s1".to_string(),
                user_id: None,
            }),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("duration_ms").is_none());
    }

    #[test]
    fn test_mode_aliases() {
        assert_eq!(AgentMode::parse("Manager"), Some(AgentMode::Router));
        assert_eq!(AgentMode::parse("student_sim"), Some(AgentMode::Student));
        assert_eq!(AgentMode::parse("oracle"), None);
    }
}
