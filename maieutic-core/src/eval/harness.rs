//! Evaluation harness
//!
//! The harness coordinates:
//! - Opening one trace session per test case
//! - Driving the case input through the agent under a deadline
//! - Scoring the finalized trace
//! - Aggregating results into an [`EvaluationRun`]
//!
//! A failing case never aborts the run: model, tool and timeout failures
//! become zero-score results with a reason attached.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::result::{
    EvaluationResult, EvaluationRun, Failure, FailureKind, MetricScores, ResultsStore,
};
use super::scorers::{
    ResponseMatchScorer, Scorer, SocraticScorer, ToolTrajectoryScorer, final_response_text,
};
use super::testcase::{TestCase, TestSet};
use super::weights::{
    MetricConfig, MetricWeights, RESPONSE_MATCH, SOCRATIC_METHOD, TOOL_TRAJECTORY,
};
use crate::agent::Agent;
use crate::config::{MaieuticConfig, ScoringConfig};
use crate::error::{MaieuticError, Result};
use crate::trace::{TraceRecorder, TraceSession};

/// Runs a test set against an agent and scores every case
pub struct EvaluationHarness {
    agent: Arc<dyn Agent>,
    recorder: TraceRecorder,
    weights: MetricWeights,
    pass_threshold: f64,
    case_timeout: Duration,
    max_concurrency: usize,
    trace_dir: Option<PathBuf>,
    suite: Option<String>,
    response_match: ResponseMatchScorer,
    trajectory: ToolTrajectoryScorer,
    socratic: SocraticScorer,
}

impl EvaluationHarness {
    /// Create a harness with default weights, threshold and scorers
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        let defaults = MaieuticConfig::default();
        Self {
            agent,
            recorder: TraceRecorder::default(),
            weights: MetricWeights::default(),
            pass_threshold: defaults.eval.pass_threshold,
            case_timeout: defaults.eval.case_timeout,
            max_concurrency: defaults.eval.max_concurrency,
            trace_dir: None,
            suite: None,
            response_match: ResponseMatchScorer::default(),
            trajectory: ToolTrajectoryScorer::default(),
            socratic: SocraticScorer::default(),
        }
    }

    /// Build a harness from loaded configuration and metric weights.
    ///
    /// `metrics.pass_threshold` overrides `eval.pass_threshold` when set.
    pub fn from_config(
        config: &MaieuticConfig,
        agent: Arc<dyn Agent>,
        metrics: &MetricConfig,
    ) -> Result<Self> {
        metrics.validate()?;
        let recorder = if config.trace.enabled() {
            TraceRecorder::new(&config.trace.capture_config())?
        } else {
            TraceRecorder::disabled()
        };

        Ok(Self::new(agent)
            .with_recorder(recorder)
            .with_weights(metrics.weights())
            .with_pass_threshold(metrics.pass_threshold.unwrap_or(config.eval.pass_threshold))
            .with_case_timeout(config.eval.case_timeout)
            .with_max_concurrency(config.eval.max_concurrency)
            .with_trace_dir(config.trace.dir.clone())
            .with_scoring(&config.scoring)
            .with_suite(metrics.test_suite.clone()))
    }

    pub fn with_recorder(mut self, recorder: TraceRecorder) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_weights(mut self, weights: MetricWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_pass_threshold(mut self, threshold: f64) -> Self {
        self.pass_threshold = threshold;
        self
    }

    pub fn with_case_timeout(mut self, timeout: Duration) -> Self {
        self.case_timeout = timeout;
        self
    }

    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    /// Directory finalized traces are written to, after redaction
    pub fn with_trace_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.trace_dir = dir;
        self
    }

    pub fn with_scoring(mut self, scoring: &ScoringConfig) -> Self {
        self.response_match = ResponseMatchScorer::new(scoring);
        self.trajectory = ToolTrajectoryScorer::new(scoring);
        self.socratic = SocraticScorer::new(scoring);
        self
    }

    pub fn with_suite(mut self, suite: Option<String>) -> Self {
        self.suite = suite;
        self
    }

    pub fn pass_threshold(&self) -> f64 {
        self.pass_threshold
    }

    /// Evaluate every case; results keep test-set order
    pub async fn run(&self, test_set: &TestSet) -> EvaluationRun {
        let run_id: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        let started_at = Utc::now();
        tracing::info!(
            run_id = %run_id,
            cases = test_set.len(),
            concurrency = self.max_concurrency,
            recording = self.recorder.is_enabled(),
            "starting evaluation run"
        );

        let results: Vec<EvaluationResult> = stream::iter(test_set.cases())
            .map(|case| self.evaluate_case(&run_id, case))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let run = EvaluationRun::from_results(run_id, started_at, self.pass_threshold, results)
            .with_suite(self.suite.clone())
            .with_test_set_digest(test_set.digest());

        tracing::info!(
            run_id = %run.run_id,
            passed = run.passed,
            total = run.total_tests,
            pass_rate = run.pass_rate,
            average_score = run.average_score,
            "evaluation run complete"
        );
        if run.trace_violations > 0 {
            tracing::error!(
                run_id = %run.run_id,
                count = run.trace_violations,
                "evaluation run had structural trace violations"
            );
        }
        run
    }

    /// Run and persist to `store`, returning the run and the file written
    pub async fn run_and_save(
        &self,
        test_set: &TestSet,
        store: &ResultsStore,
    ) -> Result<(EvaluationRun, PathBuf)> {
        let run = self.run(test_set).await;
        let path = store.save(&run)?;
        Ok((run, path))
    }

    /// Evaluate one case in its own session
    pub async fn evaluate_case(&self, run_id: &str, case: &TestCase) -> EvaluationResult {
        let session_id = format!("eval_{}_{}", run_id, case.id);
        let started = Instant::now();
        tracing::info!(test_case = %case.id, name = %case.name, "evaluating test case");

        let session = match self.recorder.start_session(&session_id).await {
            Ok(session) => session,
            Err(e) => {
                let kind = classify(&e);
                return self.failed(case, session_id, None, started, kind, e.to_string());
            }
        };

        let outcome = tokio::time::timeout(
            self.case_timeout,
            self.agent.respond(&session, &case.input),
        )
        .await;
        let violation = session.violation().await;
        let trace = session.finalize().await;
        let trace_path = self.save_trace(&trace);

        match (outcome, violation) {
            (_, Some(message)) => self.failed(
                case,
                session_id,
                trace_path,
                started,
                FailureKind::TraceViolation,
                message,
            ),
            (Ok(Ok(text)), None) => {
                self.scored(case, session_id, trace_path, started, &trace, &text)
            }
            (Ok(Err(e)), None) => {
                self.failed(case, session_id, trace_path, started, classify(&e), e.to_string())
            }
            (Err(_), None) => {
                let reason = MaieuticError::Timeout(self.case_timeout).to_string();
                self.failed(case, session_id, trace_path, started, FailureKind::Timeout, reason)
            }
        }
    }

    fn scored(
        &self,
        case: &TestCase,
        session_id: String,
        trace_path: Option<PathBuf>,
        started: Instant,
        trace: &TraceSession,
        returned: &str,
    ) -> EvaluationResult {
        // Without a retained trace only the returned text can be judged
        let (response_text, metrics) = if trace.is_recorded() {
            let response_match = self.response_match.score(trace, case);
            let trajectory = self.trajectory.score(trace, case);
            let socratic = self.socratic.score(trace, case);
            (
                final_response_text(trace),
                [Some(response_match), Some(trajectory), Some(socratic)],
            )
        } else {
            (returned, [Some(self.response_match.score_text(returned, case)), None, None])
        };

        let [response_match_score, tool_trajectory_score, socratic_method_score] = metrics;
        let overall_score = self.weights.combine(&[
            (RESPONSE_MATCH, response_match_score),
            (TOOL_TRAJECTORY, tool_trajectory_score),
            (SOCRATIC_METHOD, socratic_method_score),
        ]);
        let passed = overall_score >= self.pass_threshold;

        let anti_patterns_found: Vec<String> = case
            .anti_patterns_in(response_text)
            .into_iter()
            .map(str::to_string)
            .collect();
        for pattern in &anti_patterns_found {
            tracing::warn!(test_case = %case.id, pattern = %pattern, "anti-pattern in response");
        }

        tracing::info!(
            test_case = %case.id,
            response_match = ?response_match_score,
            tool_trajectory = ?tool_trajectory_score,
            socratic_method = ?socratic_method_score,
            overall = overall_score,
            passed,
            "test case scored"
        );

        EvaluationResult {
            test_case_id: case.id.clone(),
            test_case_name: case.name.clone(),
            difficulty: case.difficulty,
            metrics: MetricScores {
                response_match_score,
                tool_trajectory_score,
                socratic_method_score,
                overall_score,
            },
            passed,
            session_id,
            trace_path,
            tools_called: trace.tool_names().into_iter().map(str::to_string).collect(),
            anti_patterns_found,
            response_length: response_text.chars().count(),
            duration_ms: started.elapsed().as_millis() as u64,
            failure: None,
        }
    }

    fn failed(
        &self,
        case: &TestCase,
        session_id: String,
        trace_path: Option<PathBuf>,
        started: Instant,
        kind: FailureKind,
        reason: String,
    ) -> EvaluationResult {
        match kind {
            FailureKind::TraceViolation => tracing::error!(
                test_case = %case.id,
                session_id = %session_id,
                "trace violation: {}",
                reason
            ),
            _ => tracing::warn!(
                test_case = %case.id,
                kind = kind.as_str(),
                "test case failed: {}",
                reason
            ),
        }

        EvaluationResult {
            test_case_id: case.id.clone(),
            test_case_name: case.name.clone(),
            difficulty: case.difficulty,
            metrics: MetricScores::default(),
            passed: false,
            session_id,
            trace_path,
            tools_called: Vec::new(),
            anti_patterns_found: Vec::new(),
            response_length: 0,
            duration_ms: started.elapsed().as_millis() as u64,
            failure: Some(Failure { kind, reason }),
        }
    }

    fn save_trace(&self, trace: &TraceSession) -> Option<PathBuf> {
        let dir = self.trace_dir.as_ref()?;
        if !trace.is_recorded() {
            return None;
        }
        match self.recorder.save(trace, dir) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(session_id = %trace.session_id, "failed to save trace: {}", e);
                None
            }
        }
    }
}

impl std::fmt::Debug for EvaluationHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationHarness")
            .field("pass_threshold", &self.pass_threshold)
            .field("case_timeout", &self.case_timeout)
            .field("max_concurrency", &self.max_concurrency)
            .field("trace_dir", &self.trace_dir)
            .finish_non_exhaustive()
    }
}

fn classify(error: &MaieuticError) -> FailureKind {
    match error {
        e if e.is_structural() => FailureKind::TraceViolation,
        MaieuticError::Timeout(_) => FailureKind::Timeout,
        _ => FailureKind::Infrastructure,
    }
}
