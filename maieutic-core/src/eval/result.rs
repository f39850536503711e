//! Evaluation results and their on-disk store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::testcase::Difficulty;
use crate::error::{MaieuticError, Result};

/// Component scores plus the weighted overall score.
///
/// A `None` component was unavailable (e.g. recording disabled) and is
/// serialized as `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricScores {
    pub response_match_score: Option<f64>,
    pub tool_trajectory_score: Option<f64>,
    pub socratic_method_score: Option<f64>,
    pub overall_score: f64,
}

/// Why a case produced no meaningful scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Model, tool transport, or credentials failed
    Infrastructure,
    /// The case exceeded its time budget
    Timeout,
    /// The agent broke the trace ordering contract
    TraceViolation,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Infrastructure => "infrastructure",
            FailureKind::Timeout => "timeout",
            FailureKind::TraceViolation => "trace_violation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub reason: String,
}

/// Outcome of one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub test_case_id: String,
    pub test_case_name: String,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    pub metrics: MetricScores,
    pub passed: bool,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_path: Option<PathBuf>,
    #[serde(default)]
    pub tools_called: Vec<String>,
    #[serde(default)]
    pub anti_patterns_found: Vec<String>,
    #[serde(default)]
    pub response_length: usize,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

impl EvaluationResult {
    pub fn overall_score(&self) -> f64 {
        self.metrics.overall_score
    }

    pub fn is_trace_violation(&self) -> bool {
        self.failure
            .as_ref()
            .is_some_and(|f| f.kind == FailureKind::TraceViolation)
    }
}

/// One complete evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub run_id: String,
    #[serde(default)]
    pub suite: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub pass_threshold: f64,
    /// SHA-256 of the test set the run used
    #[serde(default)]
    pub test_set_digest: Option<String>,
    pub total_tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub average_score: f64,
    pub trace_violations: usize,
    pub results: Vec<EvaluationResult>,
}

impl EvaluationRun {
    /// Aggregate `results` (kept in the given order)
    pub fn from_results(
        run_id: impl Into<String>,
        started_at: DateTime<Utc>,
        pass_threshold: f64,
        results: Vec<EvaluationResult>,
    ) -> Self {
        let total_tests = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        let (pass_rate, average_score) = if total_tests == 0 {
            (0.0, 0.0)
        } else {
            let total = total_tests as f64;
            (
                passed as f64 / total,
                results.iter().map(|r| r.overall_score()).sum::<f64>() / total,
            )
        };

        Self {
            run_id: run_id.into(),
            suite: None,
            started_at,
            finished_at: Utc::now(),
            pass_threshold,
            test_set_digest: None,
            total_tests,
            passed,
            failed: total_tests - passed,
            pass_rate,
            average_score,
            trace_violations: results.iter().filter(|r| r.is_trace_violation()).count(),
            results,
        }
    }

    pub fn with_suite(mut self, suite: Option<String>) -> Self {
        self.suite = suite;
        self
    }

    pub fn with_test_set_digest(mut self, digest: impl Into<String>) -> Self {
        self.test_set_digest = Some(digest.into());
        self
    }

    pub fn result(&self, test_case_id: &str) -> Option<&EvaluationResult> {
        self.results.iter().find(|r| r.test_case_id == test_case_id)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Human-readable summary lines
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Run {}{}\n",
            self.run_id,
            self.suite
                .as_deref()
                .map(|s| format!(" ({})", s))
                .unwrap_or_default()
        );
        out.push_str(&format!(
            "Passed: {}/{} ({:.1}%)\n",
            self.passed,
            self.total_tests,
            self.pass_rate * 100.0
        ));
        out.push_str(&format!("Average score: {:.3}\n", self.average_score));
        if self.trace_violations > 0 {
            out.push_str(&format!("Trace violations: {}\n", self.trace_violations));
        }
        for r in &self.results {
            let status = match (&r.failure, r.passed) {
                (Some(f), _) => f.kind.as_str().to_uppercase(),
                (None, true) => "PASS".to_string(),
                (None, false) => "FAIL".to_string(),
            };
            out.push_str(&format!(
                "  [{}] {} {} score={:.3}\n",
                status, r.test_case_id, r.test_case_name, r.metrics.overall_score
            ));
        }
        out
    }
}

/// Directory of immutable, timestamp-named run files
#[derive(Debug, Clone)]
pub struct ResultsStore {
    dir: PathBuf,
}

impl ResultsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `run` as `results_<YYYYMMDD_HHMMSS>.json`, never overwriting.
    ///
    /// A numeric suffix is added when a file for the same second exists.
    pub fn save(&self, run: &EvaluationRun) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let stamp = run.finished_at.format("%Y%m%d_%H%M%S");
        let content = serde_json::to_string_pretty(run)?;

        for attempt in 0u32.. {
            let name = match attempt {
                0 => format!("results_{}.json", stamp),
                n => format!("results_{}_{}.json", stamp, n),
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(content.as_bytes())?;
                    tracing::info!(path = %path.display(), "saved evaluation results");
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(MaieuticError::Other("no free results file name".to_string()))
    }

    /// Result files, oldest first
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("results_") && n.ends_with(".json"))
            })
            .collect();
        files.sort_by_key(|p| sort_key(p));
        Ok(files)
    }

    /// The two most recent runs as `(older, newer)`
    pub fn latest_pair(&self) -> Result<(PathBuf, PathBuf)> {
        let mut files = self.list()?;
        let newer = files.pop();
        let older = files.pop();
        match (older, newer) {
            (Some(older), Some(newer)) => Ok((older, newer)),
            _ => Err(MaieuticError::Configuration(format!(
                "need at least two result files in {} to compare",
                self.dir.display()
            ))),
        }
    }
}

/// `(timestamp, suffix)` so `_10` sorts after `_9`
fn sort_key(path: &Path) -> (String, u32) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .trim_start_matches("results_");
    // stem is YYYYMMDD_HHMMSS or YYYYMMDD_HHMMSS_N
    let stamp: String = stem.chars().take(15).collect();
    let suffix = stem
        .get(16..)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    (stamp, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn result(id: &str, score: f64, passed: bool) -> EvaluationResult {
        EvaluationResult {
            test_case_id: id.to_string(),
            test_case_name: format!("case {}", id),
            difficulty: None,
            metrics: MetricScores {
                response_match_score: Some(score),
                tool_trajectory_score: Some(score),
                socratic_method_score: Some(score),
                overall_score: score,
            },
            passed,
            session_id: format!("eval_test_{}", id),
            trace_path: None,
            tools_called: Vec::new(),
            anti_patterns_found: Vec::new(),
            response_length: 0,
            duration_ms: 0,
            failure: None,
        }
    }

    #[test]
    fn test_aggregates() {
        let run = EvaluationRun::from_results(
            "r1",
            Utc::now(),
            0.7,
            vec![result("a", 0.9, true), result("b", 0.5, false)],
        );
        assert_eq!(run.total_tests, 2);
        assert_eq!(run.passed, 1);
        assert_eq!(run.failed, 1);
        assert_eq!(run.pass_rate, 0.5);
        assert!((run.average_score - 0.7).abs() < 1e-9);
        assert!(run.summary().contains("[FAIL] b"));
    }

    #[test]
    fn test_empty_run() {
        let run = EvaluationRun::from_results("r0", Utc::now(), 0.7, Vec::new());
        assert_eq!(run.pass_rate, 0.0);
        assert_eq!(run.average_score, 0.0);
    }

    #[test]
    fn test_unavailable_scores_serialize_as_null() {
        let mut r = result("a", 0.5, false);
        r.metrics.tool_trajectory_score = None;
        let value = serde_json::to_value(&r).unwrap();
        assert!(value["metrics"]["tool_trajectory_score"].is_null());
        assert_eq!(value["metrics"]["overall_score"], 0.5);
    }

    #[test]
    fn test_store_never_overwrites_and_finds_latest_pair() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultsStore::new(dir.path().join("results"));
        assert!(store.latest_pair().is_err());

        let run = EvaluationRun::from_results("r1", Utc::now(), 0.7, vec![result("a", 0.8, true)]);
        let first = store.save(&run).unwrap();
        let second = store.save(&run).unwrap();
        assert_ne!(first, second);

        let (older, newer) = store.latest_pair().unwrap();
        assert_eq!(older, first);
        assert_eq!(newer, second);
        assert_eq!(EvaluationRun::load(&newer).unwrap(), run);
    }

    #[test]
    fn test_sort_key_orders_suffixes_numerically() {
        let a = sort_key(Path::new("results_20260101_120000_9.json"));
        let b = sort_key(Path::new("results_20260101_120000_10.json"));
        let c = sort_key(Path::new("results_20260101_120000.json"));
        assert!(c < a && a < b);
    }
}
