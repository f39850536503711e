//! Trace Export

use super::event::{EventData, TraceEvent};
use super::session::TraceSession;

const FIELD_PREVIEW_CHARS: usize = 100;

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    /// JSON format
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Human-readable timeline
    Summary,
}

impl std::str::FromStr for TraceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(TraceFormat::Json),
            "pretty" | "json-pretty" => Ok(TraceFormat::JsonPretty),
            "summary" | "text" => Ok(TraceFormat::Summary),
            other => Err(format!("unknown trace format: {}", other)),
        }
    }
}

/// Trace exporter
pub struct TraceExporter;

impl TraceExporter {
    /// Render a session in the requested format
    pub fn export(
        session: &TraceSession,
        format: TraceFormat,
    ) -> Result<String, serde_json::Error> {
        match format {
            TraceFormat::Json => Self::to_json(session),
            TraceFormat::JsonPretty => Self::to_json_pretty(session),
            TraceFormat::Summary => Ok(Self::to_summary(session)),
        }
    }

    /// Export to JSON
    pub fn to_json(session: &TraceSession) -> Result<String, serde_json::Error> {
        serde_json::to_string(session)
    }

    /// Export to pretty JSON
    pub fn to_json_pretty(session: &TraceSession) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(session)
    }

    /// Export to a timeline, one block per event
    pub fn to_summary(session: &TraceSession) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Trace: {}", session.session_id));
        lines.push(format!("Started: {}", session.started_at.to_rfc3339()));
        if let Some(duration) = session.duration() {
            lines.push(format!("Duration: {}ms", duration.as_millis()));
        }
        if !session.is_recorded() {
            lines.push("Capture: disabled (no events retained)".to_string());
            return lines.join("\n");
        }
        lines.push(format!("Events: {}", session.events.len()));
        lines.push(String::new());

        for event in &session.events {
            let timing = event
                .duration_ms
                .map(|ms| format!(" ({}ms)", ms))
                .unwrap_or_default();
            lines.push(format!(
                "[{}] {} {}{}",
                event.sequence_no,
                event.timestamp.format("%H:%M:%S%.3f"),
                event.event_type(),
                timing
            ));
            for (key, value) in fields(event) {
                lines.push(format!("    {}: {}", key, preview(&value)));
            }
        }

        let llm_ms: u64 = session
            .events
            .iter()
            .filter(|e| matches!(e.data, EventData::LlmResponse(_)))
            .filter_map(|e| e.duration_ms)
            .sum();
        let tool_ms: u64 = session
            .events
            .iter()
            .filter(|e| matches!(e.data, EventData::ToolResponse(_)))
            .filter_map(|e| e.duration_ms)
            .sum();

        lines.push(String::new());
        lines.push(format!("Time in model calls: {}ms", llm_ms));
        lines.push(format!("Time in tool calls: {}ms", tool_ms));

        lines.join("\n")
    }
}

fn fields(event: &TraceEvent) -> Vec<(&'static str, String)> {
    match &event.data {
        EventData::SessionStart(d) => {
            let mut out = vec![("session_id", d.session_id.clone())];
            if let Some(ref user) = d.user_id {
                out.push(("user_id", user.clone()));
            }
            out
        }
        EventData::UserInput(d) => vec![("turn", d.turn.to_string()), ("input", d.input.clone())],
        EventData::IntentRouting(d) => vec![
            ("route", format!("{} -> {}", d.current_mode, d.target_mode)),
            ("confidence", format!("{:.2}", d.confidence)),
            ("reasoning", d.reasoning.clone()),
        ],
        EventData::StateTransition(d) => {
            vec![("mode", format!("{} -> {}", d.from_mode, d.to_mode))]
        }
        EventData::ToolCall(d) => vec![
            ("tool", d.tool_name.clone()),
            ("arguments", d.arguments.to_string()),
        ],
        EventData::ToolResponse(d) => {
            let mut out = vec![("tool", d.tool_name.clone()), ("success", d.success.to_string())];
            if let Some(ref error) = d.error {
                out.push(("error", error.clone()));
            }
            out
        }
        EventData::LlmRequest(d) => vec![
            ("mode", d.mode.to_string()),
            ("directive", d.directive.clone()),
            ("message", d.message.clone()),
        ],
        EventData::LlmResponse(d) => vec![
            ("model", format!("{}/{}", d.provider, d.model)),
            ("content", d.content.clone()),
        ],
        EventData::AgentResponse(d) => vec![
            ("mode", d.mode.to_string()),
            ("response", d.response.clone()),
        ],
    }
}

fn preview(value: &str) -> String {
    let flat = value.replace('\n', " ");
    if flat.chars().count() <= FIELD_PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(FIELD_PREVIEW_CHARS).collect();
    format!("{}...", cut)
}
