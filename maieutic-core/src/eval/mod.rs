//! Evaluation engine for agent traces
//!
//! This module provides:
//! - Test case sets loaded from JSON or YAML
//! - Metric weights with load-time validation
//! - Scorers for response match, tool trajectory and Socratic style
//! - A harness that runs every case in its own trace session
//! - Immutable results files and a regression comparator
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use maieutic_core::agent::TutorAgent;
//! use maieutic_core::eval::{EvaluationHarness, ResultsStore, TestSet};
//! use maieutic_core::llm::ScriptedLlm;
//! use maieutic_core::tools::ToolSet;
//!
//! # async fn demo() -> maieutic_core::error::Result<()> {
//! let llm = Arc::new(ScriptedLlm::new("What if you sorted first?"));
//! let agent = TutorAgent::new(llm, ToolSet::new());
//! let test_set = TestSet::load("evaluation/test_cases.json")?;
//!
//! let harness = EvaluationHarness::new(Arc::new(agent));
//! let (run, path) = harness
//!     .run_and_save(&test_set, &ResultsStore::new("evaluation/results"))
//!     .await?;
//! println!("{}saved to {}", run.summary(), path.display());
//! # Ok(())
//! # }
//! ```

mod compare;
mod harness;
mod result;
pub mod scorers;
mod testcase;
pub mod weights;

pub use compare::{CaseDiff, CaseStatus, RegressionComparator, RegressionReport};
pub use harness::EvaluationHarness;
pub use result::{EvaluationResult, EvaluationRun, Failure, FailureKind, MetricScores, ResultsStore};
pub use scorers::{ResponseMatchScorer, Scorer, SocraticScorer, ToolTrajectoryScorer};
pub use testcase::{Difficulty, TestCase, TestSet, ToolOrder};
pub use weights::{MetricConfig, MetricDefinition, MetricWeights};
