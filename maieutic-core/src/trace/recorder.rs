//! Session-scoped, append-only event recorder

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::capture::{CaptureConfig, RecordingMode, Redactor};
use super::event::{AgentMode, AgentResponseData, EventData, SessionStartData, TraceEvent};
use super::export::{TraceExporter, TraceFormat};
use super::session::{CaptureStatus, TraceSession};
use super::validate::StructureValidator;
use crate::error::{MaieuticError, Result};

/// Opens trace sessions with a shared capture policy
#[derive(Debug, Clone)]
pub struct TraceRecorder {
    redactor: Arc<Redactor>,
}

impl TraceRecorder {
    /// Create a recorder with custom config
    pub fn new(config: &CaptureConfig) -> Result<Self> {
        Ok(Self {
            redactor: Arc::new(Redactor::new(config)?),
        })
    }

    /// A recorder that validates events but retains none
    pub fn disabled() -> Self {
        Self {
            redactor: Arc::new(Redactor::with_mode(RecordingMode::Disabled)),
        }
    }

    /// Check if capture is enabled
    pub fn is_enabled(&self) -> bool {
        self.redactor.mode() != RecordingMode::Disabled
    }

    /// Copy of `session` with the capture policy applied
    pub fn redact(&self, session: &TraceSession) -> TraceSession {
        self.redactor.redact_session(session)
    }

    /// Write the redacted form of `session` into `dir`
    pub fn save(&self, session: &TraceSession, dir: impl AsRef<Path>) -> Result<PathBuf> {
        self.redact(session).save_to_dir(dir)
    }

    /// Render the redacted form of `session`
    pub fn export(
        &self,
        session: &TraceSession,
        format: TraceFormat,
    ) -> std::result::Result<String, serde_json::Error> {
        TraceExporter::export(&self.redact(session), format)
    }

    /// Open a session and record its SESSION_START as event 0.
    pub async fn start_session(&self, session_id: impl Into<String>) -> Result<SessionHandle> {
        self.start_session_for(session_id, None).await
    }

    /// Open a session on behalf of a known user.
    pub async fn start_session_for(
        &self,
        session_id: impl Into<String>,
        user_id: Option<String>,
    ) -> Result<SessionHandle> {
        let session_id = session_id.into();
        if session_id.trim().is_empty() {
            return Err(MaieuticError::InvalidSessionState(
                "session id must not be empty".to_string(),
            ));
        }

        let mut session = TraceSession::new(&session_id);
        if !self.is_enabled() {
            session.capture = CaptureStatus::Disabled;
        }

        let handle = SessionHandle {
            session_id: Arc::from(session_id.as_str()),
            state: Arc::new(Mutex::new(SessionState {
                session,
                next_sequence: 0,
                validator: StructureValidator::new(),
                violation: None,
                frozen: None,
            })),
        };

        handle
            .record(
                EventData::SessionStart(SessionStartData {
                    session_id,
                    user_id,
                }),
                None,
            )
            .await?;
        tracing::debug!(session_id = %handle.session_id, "trace session started");
        Ok(handle)
    }
}

impl Default for TraceRecorder {
    fn default() -> Self {
        Self {
            redactor: Arc::new(Redactor::with_mode(RecordingMode::Redacted)),
        }
    }
}

struct SessionState {
    session: TraceSession,
    next_sequence: u64,
    validator: StructureValidator,
    /// First structural violation; once set the session accepts nothing
    violation: Option<String>,
    frozen: Option<TraceSession>,
}

/// Handle to one open session; clones share the same log
#[derive(Clone)]
pub struct SessionHandle {
    session_id: Arc<str>,
    state: Arc<Mutex<SessionState>>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .finish()
    }
}

impl SessionHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Append one event and return its sequence number.
    ///
    /// # Errors
    ///
    /// - `InvalidSessionState` once the session has been finalized.
    /// - `StructuralViolation` when the event breaks the ordering rules; the
    ///   session then rejects every later event with the same violation.
    pub async fn record(&self, data: EventData, duration: Option<Duration>) -> Result<u64> {
        let mut state = self.state.lock().await;

        if state.frozen.is_some() {
            return Err(MaieuticError::InvalidSessionState(format!(
                "session {} is finalized; cannot record {}",
                self.session_id,
                data.event_type()
            )));
        }
        if let Some(ref violation) = state.violation {
            return Err(MaieuticError::structural(
                self.session_id.as_ref(),
                violation.clone(),
            ));
        }

        if let Err(message) = state.validator.check(&data) {
            tracing::error!(
                session_id = %self.session_id,
                event_type = %data.event_type(),
                "structural trace violation: {}",
                message
            );
            state.violation = Some(message.clone());
            return Err(MaieuticError::structural(self.session_id.as_ref(), message));
        }

        let sequence_no = state.next_sequence;
        state.next_sequence += 1;

        let event_type = data.event_type();
        if state.session.capture == CaptureStatus::Recorded {
            let event = TraceEvent {
                session_id: self.session_id.to_string(),
                sequence_no,
                timestamp: Utc::now(),
                duration_ms: duration.map(|d| d.as_millis() as u64),
                data,
            };
            state.session.events.push(event);
        }

        tracing::trace!(
            session_id = %self.session_id,
            sequence_no,
            event_type = %event_type,
            "event recorded"
        );
        Ok(sequence_no)
    }

    /// Freeze the session and return it.
    ///
    /// Idempotent: later calls return the same frozen session.
    pub async fn finalize(&self) -> TraceSession {
        let mut state = self.state.lock().await;
        if let Some(ref frozen) = state.frozen {
            return frozen.clone();
        }

        state.session.ended_at = Some(Utc::now());
        let frozen = state.session.clone();
        state.frozen = Some(frozen.clone());
        tracing::debug!(
            session_id = %self.session_id,
            events = frozen.events.len(),
            "trace session finalized"
        );
        frozen
    }

    /// Record the terminal AGENT_RESPONSE and finalize in one step.
    pub async fn respond_and_finalize(
        &self,
        response: AgentResponseData,
        duration: Option<Duration>,
    ) -> Result<TraceSession> {
        self.record(EventData::AgentResponse(response), duration)
            .await?;
        Ok(self.finalize().await)
    }

    /// Mode the session is currently in
    pub async fn active_mode(&self) -> AgentMode {
        self.state.lock().await.validator.active_mode()
    }

    /// Current turn (0 before the first user input)
    pub async fn current_turn(&self) -> u32 {
        self.state.lock().await.validator.turn()
    }

    pub async fn is_finalized(&self) -> bool {
        self.state.lock().await.frozen.is_some()
    }

    /// The structural violation that halted this session, if any
    pub async fn violation(&self) -> Option<String> {
        self.state.lock().await.violation.clone()
    }

    /// Halt recording with a violation detected by the caller.
    ///
    /// Returns the error the caller should propagate. The first violation
    /// wins; a finalized session is left untouched.
    pub async fn poison(&self, message: impl Into<String>) -> MaieuticError {
        let mut state = self.state.lock().await;
        let message = message.into();
        if state.frozen.is_none() && state.violation.is_none() {
            tracing::error!(
                session_id = %self.session_id,
                "structural trace violation: {}",
                message
            );
            state.violation = Some(message.clone());
        }
        MaieuticError::structural(self.session_id.as_ref(), message)
    }

    /// Number of events accepted so far (retained or not)
    pub async fn event_count(&self) -> u64 {
        self.state.lock().await.next_sequence
    }

    /// Copy of the events recorded so far
    pub async fn snapshot(&self) -> TraceSession {
        self.state.lock().await.session.clone()
    }
}
