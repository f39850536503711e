//! Trace recorder for agent sessions
//!
//! A session is an append-only log of typed events with a gapless sequence
//! number. The recorder checks every event against the state-model ordering
//! rules (a mode is only entered after the turn's intent routing) and freezes
//! the log on finalize. The in-memory log keeps raw payloads; the capture
//! policy is applied when the recorder saves or exports a trace.
//!
//! # Example
//!
//! ```rust,no_run
//! use maieutic_core::trace::{EventData, TraceRecorder, UserInputData};
//!
//! # async fn demo() -> maieutic_core::error::Result<()> {
//! let recorder = TraceRecorder::default();
//! let session = recorder.start_session("session_123").await?;
//!
//! session
//!     .record(
//!         EventData::UserInput(UserInputData { turn: 1, input: "hi".into() }),
//!         None,
//!     )
//!     .await?;
//!
//! let trace = session.finalize().await;
//! recorder.save(&trace, "traces")?;
//! # Ok(())
//! # }
//! ```

mod capture;
mod event;
mod export;
mod recorder;
mod session;
mod validate;

pub use capture::{CaptureConfig, RecordingMode, Redactor};
pub use event::{
    AgentMode, AgentResponseData, EventData, EventType, IntentRoutingData, LlmRequestData,
    LlmResponseData, SessionStartData, StateTransitionData, ToolCallData, ToolResponseData,
    TraceEvent, UserInputData,
};
pub use export::{TraceExporter, TraceFormat};
pub use recorder::{SessionHandle, TraceRecorder};
pub use session::{CaptureStatus, TraceSession};
pub use validate::StructureValidator;

/// Current schema version for trace files
pub const TRACE_SCHEMA_VERSION: u32 = 1;

#[cfg(test)]
mod tests;
