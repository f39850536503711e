//! Metric weight configuration

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::error::{MaieuticError, Result};

pub const RESPONSE_MATCH: &str = "response_match_score";
pub const TOOL_TRAJECTORY: &str = "tool_trajectory_score";
pub const SOCRATIC_METHOD: &str = "socratic_method_score";

/// Metric names in report order
pub const METRIC_NAMES: [&str; 3] = [RESPONSE_MATCH, TOOL_TRAJECTORY, SOCRATIC_METHOD];

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// One weighted metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub weight: f64,
}

/// Metrics file: `{"metrics": [{name, description, weight}]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_suite: Option<String>,

    pub metrics: Vec<MetricDefinition>,

    /// Overrides `eval.pass_threshold` when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_threshold: Option<f64>,
}

impl Default for MetricConfig {
    fn default() -> Self {
        let metric = |name: &str, description: &str, weight: f64| MetricDefinition {
            name: name.to_string(),
            description: description.to_string(),
            weight,
        };
        Self {
            test_suite: None,
            metrics: vec![
                metric(RESPONSE_MATCH, "Expected keywords present, anti-patterns absent", 0.4),
                metric(TOOL_TRAJECTORY, "Expected tools called with expected arguments", 0.3),
                metric(SOCRATIC_METHOD, "Guides with questions instead of answers", 0.3),
            ],
            pass_threshold: None,
        }
    }
}

impl MetricConfig {
    /// Load and validate a metrics file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MaieuticError::Configuration(format!("cannot read metrics {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            MaieuticError::Configuration(format!("invalid metrics {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check names, signs, and that weights sum to 1.0.
    ///
    /// Weights are never normalized; a bad sum is a configuration error.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for metric in &self.metrics {
            if !METRIC_NAMES.contains(&metric.name.as_str()) {
                return Err(MaieuticError::Configuration(format!(
                    "unknown metric '{}', expected one of {}",
                    metric.name,
                    METRIC_NAMES.join(", ")
                )));
            }
            if !seen.insert(metric.name.as_str()) {
                return Err(MaieuticError::Configuration(format!(
                    "metric '{}' is listed twice",
                    metric.name
                )));
            }
            if !metric.weight.is_finite() || metric.weight < 0.0 {
                return Err(MaieuticError::Configuration(format!(
                    "metric '{}' has invalid weight {}",
                    metric.name, metric.weight
                )));
            }
        }

        let sum: f64 = self.metrics.iter().map(|m| m.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(MaieuticError::Configuration(format!(
                "metric weights must sum to 1.0, got {}",
                sum
            )));
        }

        if let Some(threshold) = self.pass_threshold
            && !(0.0..=1.0).contains(&threshold)
        {
            return Err(MaieuticError::Configuration(format!(
                "pass_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        Ok(())
    }

    pub fn weights(&self) -> MetricWeights {
        MetricWeights(
            self.metrics
                .iter()
                .map(|m| (m.name.clone(), m.weight))
                .collect(),
        )
    }
}

/// Metric name -> weight
#[derive(Debug, Clone, PartialEq)]
pub struct MetricWeights(BTreeMap<String, f64>);

impl MetricWeights {
    /// Weight of `name` (0.0 when not configured)
    pub fn get(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    /// Weighted mean over the available scores.
    ///
    /// Unavailable components (`None`) drop out and the remaining weights are
    /// re-scaled to sum to 1. Returns 0.0 when nothing weighted is available.
    pub fn combine(&self, scores: &[(&str, Option<f64>)]) -> f64 {
        let (weighted, total) = scores
            .iter()
            .filter_map(|(name, score)| score.map(|s| (self.get(name), s)))
            .fold((0.0, 0.0), |(acc, total), (w, s)| (acc + w * s, total + w));

        if total <= 0.0 {
            return 0.0;
        }
        (weighted / total).clamp(0.0, 1.0)
    }
}

impl Default for MetricWeights {
    fn default() -> Self {
        MetricConfig::default().weights()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(weights: &[(&str, f64)]) -> MetricConfig {
        MetricConfig {
            test_suite: None,
            metrics: weights
                .iter()
                .map(|(name, weight)| MetricDefinition {
                    name: name.to_string(),
                    description: String::new(),
                    weight: *weight,
                })
                .collect(),
            pass_threshold: None,
        }
    }

    #[test]
    fn test_default_weights() {
        let config = MetricConfig::default();
        assert!(config.validate().is_ok());
        let weights = config.weights();
        assert_eq!(weights.get(RESPONSE_MATCH), 0.4);
        assert_eq!(weights.get(SOCRATIC_METHOD), 0.3);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let err = config(&[(RESPONSE_MATCH, 0.4), (TOOL_TRAJECTORY, 0.3), (SOCRATIC_METHOD, 0.2)])
            .validate()
            .unwrap_err();
        assert!(matches!(err, MaieuticError::Configuration(_)));
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn test_rejects_unknown_and_duplicate_names() {
        assert!(config(&[("style_score", 1.0)]).validate().is_err());
        assert!(
            config(&[(RESPONSE_MATCH, 0.5), (RESPONSE_MATCH, 0.5)])
                .validate()
                .unwrap_err()
                .to_string()
                .contains("twice")
        );
        assert!(config(&[(RESPONSE_MATCH, 1.5), (TOOL_TRAJECTORY, -0.5)]).validate().is_err());
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        std::fs::write(
            &path,
            r#"{"test_suite": "dsa_tutor", "pass_threshold": 0.75, "metrics": [
                {"name": "response_match_score", "description": "keywords", "weight": 0.5},
                {"name": "tool_trajectory_score", "description": "tools", "weight": 0.25},
                {"name": "socratic_method_score", "description": "questions", "weight": 0.25}
            ]}"#,
        )
        .unwrap();

        let config = MetricConfig::load(&path).unwrap();
        assert_eq!(config.test_suite.as_deref(), Some("dsa_tutor"));
        assert_eq!(config.pass_threshold, Some(0.75));
        assert_eq!(config.weights().get(TOOL_TRAJECTORY), 0.25);
    }

    #[test]
    fn test_combine() {
        let weights = MetricWeights::default();
        let all = weights.combine(&[
            (RESPONSE_MATCH, Some(0.4)),
            (TOOL_TRAJECTORY, Some(1.0)),
            (SOCRATIC_METHOD, Some(1.0)),
        ]);
        assert!((all - 0.76).abs() < 1e-9);

        // only response match available: its score is the overall
        let partial = weights.combine(&[
            (RESPONSE_MATCH, Some(0.5)),
            (TOOL_TRAJECTORY, None),
            (SOCRATIC_METHOD, None),
        ]);
        assert!((partial - 0.5).abs() < 1e-9);

        assert_eq!(weights.combine(&[(TOOL_TRAJECTORY, None)]), 0.0);
    }
}
