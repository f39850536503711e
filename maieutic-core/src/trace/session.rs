//! Finalized trace sessions and their file format

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::TRACE_SCHEMA_VERSION;
use super::event::{
    AgentResponseData, EventData, EventType, IntentRoutingData, StateTransitionData,
    ToolCallData, ToolResponseData, TraceEvent,
};
use super::validate::StructureValidator;
use crate::error::{MaieuticError, Result};

/// Whether the events of a session were retained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStatus {
    #[default]
    Recorded,
    /// Recorder was off; `events` is empty by construction
    Disabled,
}

/// Ordered events of one conversation, frozen after finalize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSession {
    /// Schema version for forward compatibility
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Unique session identifier
    pub session_id: String,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// When the session was finalized
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,

    /// Whether events were retained
    #[serde(default)]
    pub capture: CaptureStatus,

    /// All events in `sequence_no` order
    pub events: Vec<TraceEvent>,
}

fn default_schema_version() -> u32 {
    TRACE_SCHEMA_VERSION
}

impl TraceSession {
    /// Create a new empty session
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            schema_version: TRACE_SCHEMA_VERSION,
            session_id: session_id.into(),
            started_at: Utc::now(),
            ended_at: None,
            capture: CaptureStatus::Recorded,
            events: Vec::new(),
        }
    }

    /// True when events were retained and can be scored
    pub fn is_recorded(&self) -> bool {
        self.capture == CaptureStatus::Recorded
    }

    /// Wall-clock duration between start and finalize
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at
            .map(|end| (end - self.started_at).to_std().unwrap_or(Duration::ZERO))
    }

    /// Events of one type, in order
    pub fn events_of_type(&self, event_type: EventType) -> impl Iterator<Item = &TraceEvent> {
        self.events
            .iter()
            .filter(move |e| e.event_type() == event_type)
    }

    /// All tool call payloads, in call order
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallData> {
        self.events.iter().filter_map(|e| match &e.data {
            EventData::ToolCall(call) => Some(call),
            _ => None,
        })
    }

    /// Names of the tools called, in call order
    pub fn tool_names(&self) -> Vec<&str> {
        self.tool_calls().map(|c| c.tool_name.as_str()).collect()
    }

    pub fn tool_responses(&self) -> impl Iterator<Item = &ToolResponseData> {
        self.events.iter().filter_map(|e| match &e.data {
            EventData::ToolResponse(response) => Some(response),
            _ => None,
        })
    }

    pub fn routings(&self) -> impl Iterator<Item = &IntentRoutingData> {
        self.events.iter().filter_map(|e| match &e.data {
            EventData::IntentRouting(routing) => Some(routing),
            _ => None,
        })
    }

    pub fn transitions(&self) -> impl Iterator<Item = &StateTransitionData> {
        self.events.iter().filter_map(|e| match &e.data {
            EventData::StateTransition(transition) => Some(transition),
            _ => None,
        })
    }

    /// The last AGENT_RESPONSE of the session
    pub fn final_response(&self) -> Option<&AgentResponseData> {
        self.events.iter().rev().find_map(|e| match &e.data {
            EventData::AgentResponse(response) => Some(response),
            _ => None,
        })
    }

    /// Check the ordering invariants on a trace read from disk.
    ///
    /// Sequence numbers must be gapless from 0, every event must carry the
    /// session id, and the state-model rules must hold.
    pub fn verify(&self) -> Result<()> {
        let mut validator = StructureValidator::new();
        for (index, event) in self.events.iter().enumerate() {
            if event.sequence_no != index as u64 {
                return Err(MaieuticError::structural(
                    &self.session_id,
                    format!(
                        "sequence gap: position {} holds sequence_no {}",
                        index, event.sequence_no
                    ),
                ));
            }
            if event.session_id != self.session_id {
                return Err(MaieuticError::structural(
                    &self.session_id,
                    format!(
                        "event {} belongs to session {}",
                        event.sequence_no, event.session_id
                    ),
                ));
            }
            validator
                .check(&event.data)
                .map_err(|message| MaieuticError::structural(&self.session_id, message))?;
        }
        Ok(())
    }

    /// File name for this session: `<session_id>_<YYYYmmdd_HHMMSS>.json`
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.json",
            sanitize(&self.session_id),
            self.started_at.format("%Y%m%d_%H%M%S")
        )
    }

    /// Write the session into `dir`, never replacing an existing file.
    ///
    /// Returns the path written.
    pub fn save_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let base = self.file_name();
        let stem = base.trim_end_matches(".json").to_string();
        let mut path = dir.join(&base);
        let mut suffix = 1;
        loop {
            match self.save(&path) {
                Ok(()) => return Ok(path),
                Err(MaieuticError::Io(e)) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    path = dir.join(format!("{}_{}.json", stem, suffix));
                    suffix += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Write the session to `path`; fails if the file already exists.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    /// Load a session from a trace file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
