//! Regression detection between two evaluation runs

use serde::Serialize;
use std::fmt;

use super::result::{EvaluationResult, EvaluationRun};
use crate::config::CompareConfig;

/// Absorbs float noise so a drop of exactly `tolerance` is not a regression
const EPSILON: f64 = 1e-9;

/// How one test case moved between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Regressed,
    Improved,
    Unchanged,
    /// Only in the new run
    Added,
    /// Only in the old run
    Removed,
}

impl CaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStatus::Regressed => "regressed",
            CaseStatus::Improved => "improved",
            CaseStatus::Unchanged => "unchanged",
            CaseStatus::Added => "added",
            CaseStatus::Removed => "removed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseDiff {
    pub test_case_id: String,
    pub old_score: Option<f64>,
    pub new_score: Option<f64>,
    pub delta: Option<f64>,
    pub status: CaseStatus,
}

/// Aggregate and per-case comparison of two runs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionReport {
    pub old_run_id: String,
    pub new_run_id: String,
    pub old_average: f64,
    pub new_average: f64,
    pub delta: f64,
    pub tolerance: f64,
    pub aggregate_regressed: bool,
    /// The runs were produced from different test sets
    pub digest_mismatch: bool,
    pub cases: Vec<CaseDiff>,
}

impl RegressionReport {
    /// True when the aggregate or any single case regressed
    pub fn has_regressions(&self) -> bool {
        self.aggregate_regressed || self.regressed_cases().next().is_some()
    }

    pub fn regressed_cases(&self) -> impl Iterator<Item = &CaseDiff> {
        self.cases
            .iter()
            .filter(|c| c.status == CaseStatus::Regressed)
    }
}

impl fmt::Display for RegressionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Comparing {} -> {}", self.old_run_id, self.new_run_id)?;
        writeln!(
            f,
            "Average score: {:.3} -> {:.3} (delta {:+.3}, tolerance {:.3})",
            self.old_average, self.new_average, self.delta, self.tolerance
        )?;
        if self.digest_mismatch {
            writeln!(f, "Warning: runs used different test sets")?;
        }
        for case in self.cases.iter().filter(|c| c.status != CaseStatus::Unchanged) {
            let score = |s: Option<f64>| {
                s.map(|v| format!("{:.3}", v))
                    .unwrap_or_else(|| "-".to_string())
            };
            writeln!(
                f,
                "  [{}] {} {} -> {}",
                case.status.as_str().to_uppercase(),
                case.test_case_id,
                score(case.old_score),
                score(case.new_score)
            )?;
        }
        if self.has_regressions() {
            write!(f, "REGRESSION DETECTED")
        } else {
            write!(f, "No regressions")
        }
    }
}

/// Flags score drops larger than a tolerance
#[derive(Debug, Clone, Copy)]
pub struct RegressionComparator {
    tolerance: f64,
}

impl RegressionComparator {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn from_config(config: &CompareConfig) -> Self {
        Self::new(config.tolerance)
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn regressed(&self, delta: f64) -> bool {
        delta < -(self.tolerance + EPSILON)
    }

    fn improved(&self, delta: f64) -> bool {
        delta > self.tolerance + EPSILON
    }

    pub fn compare(&self, old: &EvaluationRun, new: &EvaluationRun) -> RegressionReport {
        let delta = new.average_score - old.average_score;

        let mut cases: Vec<CaseDiff> = new
            .results
            .iter()
            .map(|n| match old.result(&n.test_case_id) {
                Some(o) => self.diff(o, n),
                None => CaseDiff {
                    test_case_id: n.test_case_id.clone(),
                    old_score: None,
                    new_score: Some(n.overall_score()),
                    delta: None,
                    status: CaseStatus::Added,
                },
            })
            .collect();
        cases.extend(
            old.results
                .iter()
                .filter(|o| new.result(&o.test_case_id).is_none())
                .map(|o| CaseDiff {
                    test_case_id: o.test_case_id.clone(),
                    old_score: Some(o.overall_score()),
                    new_score: None,
                    delta: None,
                    status: CaseStatus::Removed,
                }),
        );

        let digest_mismatch = match (&old.test_set_digest, &new.test_set_digest) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        };

        let report = RegressionReport {
            old_run_id: old.run_id.clone(),
            new_run_id: new.run_id.clone(),
            old_average: old.average_score,
            new_average: new.average_score,
            delta,
            tolerance: self.tolerance,
            aggregate_regressed: self.regressed(delta),
            digest_mismatch,
            cases,
        };

        if report.has_regressions() {
            tracing::warn!(
                delta = report.delta,
                regressed_cases = report.regressed_cases().count(),
                "regression detected"
            );
        }
        report
    }

    fn diff(&self, old: &EvaluationResult, new: &EvaluationResult) -> CaseDiff {
        let delta = new.overall_score() - old.overall_score();
        let status = if self.regressed(delta) || (old.passed && !new.passed) {
            CaseStatus::Regressed
        } else if self.improved(delta) || (!old.passed && new.passed) {
            CaseStatus::Improved
        } else {
            CaseStatus::Unchanged
        };
        CaseDiff {
            test_case_id: new.test_case_id.clone(),
            old_score: Some(old.overall_score()),
            new_score: Some(new.overall_score()),
            delta: Some(delta),
            status,
        }
    }
}

impl Default for RegressionComparator {
    fn default() -> Self {
        Self::from_config(&CompareConfig::default())
    }
}
