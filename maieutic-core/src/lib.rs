//! # Maieutic - Trace Recording and Evaluation for Tutoring Agents
//!
//! Maieutic records every step a multi-persona tutoring agent takes and scores
//! the recorded behavior against rubric-based test cases:
//! - Append-only, session-scoped traces with structural ordering checks
//! - A persona state model (Router, Tutor, Interviewer, Student)
//! - Response-match, tool-trajectory and Socratic-method scorers
//! - An evaluation harness with per-case verdicts
//! - Regression detection between evaluation runs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use maieutic_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = MaieuticConfig::load()?;
//!     let metrics = MetricConfig::load(&config.eval.metrics_path)?;
//!     let test_set = TestSet::load(&config.eval.test_cases_path)?;
//!
//!     let llm = Arc::new(ScriptedLlm::new("What if you tried sorting the array first?"));
//!     let agent = Arc::new(TutorAgent::new(llm, ToolSet::new()));
//!
//!     let harness = EvaluationHarness::from_config(&config, agent, &metrics)?;
//!     let run = harness.run(&test_set).await;
//!     println!("{}", run.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `llm-ollama`: Ollama chat provider
//! - `llm-openai`: OpenAI-compatible chat provider
//! - `tool-leetcode`: problem-fetch tool backed by the LeetCode GraphQL API

pub mod agent;
pub mod config;
pub mod error;
pub mod eval;
pub mod llm;
pub mod tools;
pub mod trace;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{
        Agent, AgentStateModel, Directive, IntentRouter, KeywordRouter, LlmRouter,
        RoutingDecision, TutorAgent,
    };
    pub use crate::config::{
        CompareConfig, EvalConfig, LLMProviderConfig, LLMProviderKind, LoggingConfig,
        MaieuticConfig, ScoringConfig, TraceConfig,
    };
    pub use crate::error::{MaieuticError, Result};
    pub use crate::eval::{
        CaseStatus, Difficulty, EvaluationHarness, EvaluationResult, EvaluationRun, FailureKind,
        MetricConfig, MetricWeights, RegressionComparator, RegressionReport, ResultsStore, Scorer,
        TestCase, TestSet,
    };
    pub use crate::llm::{
        LLMProvider, LLMProviderFactory, LLMRequest, LLMResponse, Message, MessageRole,
        ScriptedLlm,
    };
    pub use crate::tools::{StubResponse, StubTool, Tool, ToolError, ToolErrorKind, ToolSet};
    pub use crate::trace::{
        AgentMode, EventData, EventType, RecordingMode, SessionHandle, TraceEvent, TraceExporter,
        TraceFormat, TraceRecorder, TraceSession,
    };
}
