//! Configuration types for the recorder, harness and scorers

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MaieuticError, Result};
use crate::trace::{CaptureConfig, RecordingMode};

/// Main configuration, loaded once per harness invocation
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MaieuticConfig {
    /// Log verbosity
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Trace recorder settings
    #[serde(default)]
    pub trace: TraceConfig,

    /// Evaluation harness settings
    #[serde(default)]
    pub eval: EvalConfig,

    /// Scorer tunables
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Regression comparator settings
    #[serde(default)]
    pub compare: CompareConfig,

    /// LLM provider configuration (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LLMProviderConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Filter from `RUST_LOG`, falling back to the configured level
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_log_level()))
    }
}

/// Trace recorder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Recording mode; `disabled` turns the recorder off
    #[serde(default)]
    pub mode: RecordingMode,

    /// Directory trace files are written to (none = keep in memory only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Strings longer than this are truncated in redacted mode
    #[serde(default = "default_max_data_size")]
    pub max_data_size: usize,

    /// Regex patterns for keys/values that are redacted
    #[serde(default = "default_redact_patterns")]
    pub redact_patterns: Vec<String>,
}

fn default_max_data_size() -> usize {
    10_000
}

fn default_redact_patterns() -> Vec<String> {
    CaptureConfig::default().redact_patterns
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            mode: RecordingMode::default(),
            dir: None,
            max_data_size: default_max_data_size(),
            redact_patterns: default_redact_patterns(),
        }
    }
}

impl TraceConfig {
    /// Whether the recorder retains events at all
    pub fn enabled(&self) -> bool {
        self.mode != RecordingMode::Disabled
    }

    /// Capture settings handed to the recorder
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            mode: self.mode,
            redact_patterns: self.redact_patterns.clone(),
            max_data_size: self.max_data_size,
        }
    }
}

/// Evaluation harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Metric weights file
    #[serde(default = "default_metrics_path")]
    pub metrics_path: PathBuf,

    /// Test case set (JSON or YAML)
    #[serde(default = "default_test_cases_path")]
    pub test_cases_path: PathBuf,

    /// Directory evaluation runs are persisted to
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Minimum overall score for a test case to pass
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,

    /// Per test case deadline
    #[serde(default = "default_case_timeout", with = "humantime_serde")]
    pub case_timeout: Duration,

    /// Test cases evaluated at once (1 = sequential)
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_metrics_path() -> PathBuf {
    PathBuf::from("evaluation/metrics.json")
}

fn default_test_cases_path() -> PathBuf {
    PathBuf::from("evaluation/test_cases.json")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("evaluation/results")
}

fn default_pass_threshold() -> f64 {
    0.7
}

fn default_case_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_concurrency() -> usize {
    1
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            metrics_path: default_metrics_path(),
            test_cases_path: default_test_cases_path(),
            results_dir: default_results_dir(),
            pass_threshold: default_pass_threshold(),
            case_timeout: default_case_timeout(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// Scorer tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Subtracted once per anti-pattern found in the response
    #[serde(default = "default_penalty")]
    pub anti_pattern_penalty: f64,

    /// Subtracted per tool call when no tools were expected
    #[serde(default = "default_penalty")]
    pub unexpected_tool_deduction: f64,

    /// Require expected tool arguments to match exactly instead of as a subset
    #[serde(default)]
    pub strict_tool_args: bool,

    /// `expected_behavior` labels the Socratic rubric applies to
    #[serde(default = "default_socratic_behaviors")]
    pub socratic_behaviors: Vec<String>,
}

fn default_penalty() -> f64 {
    0.5
}

fn default_socratic_behaviors() -> Vec<String> {
    vec![
        "socratic_hint".to_string(),
        "socratic_method".to_string(),
        "guided_questioning".to_string(),
    ]
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            anti_pattern_penalty: default_penalty(),
            unexpected_tool_deduction: default_penalty(),
            strict_tool_args: false,
            socratic_behaviors: default_socratic_behaviors(),
        }
    }
}

/// Regression comparator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareConfig {
    /// Largest score drop tolerated before flagging a regression
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_tolerance() -> f64 {
    0.05
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMProviderConfig {
    /// Provider type
    pub provider: LLMProviderKind,

    /// Model name
    #[serde(default)]
    pub model: String,

    /// API key (if needed, prefer env vars)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL (for custom endpoints, e.g., Ollama)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Attempts per model call, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Reply script for the scripted provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,
}

fn default_max_attempts() -> usize {
    3
}

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProviderKind {
    Ollama,
    OpenAI,
    /// Canned replies for offline runs
    Scripted,
}

impl MaieuticConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `maieutic.toml` in the working directory
    /// 3. The file named by `MAIEUTIC_CONFIG_PATH`
    /// 4. `MAIEUTIC_*` environment variables, nested with `__`
    ///    (e.g. `MAIEUTIC_TRACE__MODE=disabled`)
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a source is malformed or validation fails.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(MaieuticConfig::default()))
            .merge(Toml::file("maieutic.toml"));

        if let Ok(path) = std::env::var("MAIEUTIC_CONFIG_PATH") {
            figment = merge_file(figment, Path::new(&path));
        }

        let config: MaieuticConfig = figment
            .merge(Env::prefixed("MAIEUTIC_").split("__").ignore(&["config_path"]))
            .extract()
            .map_err(|e| {
                MaieuticError::Configuration(format!("Failed to load configuration: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path (TOML, YAML or JSON by extension).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        use figment::{Figment, providers::Serialized};

        let path = path.as_ref();
        if !path.exists() {
            return Err(MaieuticError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let figment = Figment::from(Serialized::defaults(MaieuticConfig::default()));
        let config: MaieuticConfig = merge_file(figment, path).extract().map_err(|e| {
            MaieuticError::Configuration(format!("Failed to load configuration file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the offending field.
    pub fn validate(&self) -> Result<()> {
        check_unit_interval("eval.pass_threshold", self.eval.pass_threshold)?;
        check_unit_interval("compare.tolerance", self.compare.tolerance)?;
        check_non_negative("scoring.anti_pattern_penalty", self.scoring.anti_pattern_penalty)?;
        check_non_negative(
            "scoring.unexpected_tool_deduction",
            self.scoring.unexpected_tool_deduction,
        )?;

        if self.eval.max_concurrency == 0 {
            return Err(MaieuticError::Configuration(
                "eval.max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.eval.case_timeout.is_zero() {
            return Err(MaieuticError::Configuration(
                "eval.case_timeout must be greater than zero".to_string(),
            ));
        }
        if self.trace.max_data_size == 0 {
            return Err(MaieuticError::Configuration(
                "trace.max_data_size must be greater than zero".to_string(),
            ));
        }
        for pattern in &self.trace.redact_patterns {
            regex::Regex::new(pattern).map_err(|e| {
                MaieuticError::Configuration(format!(
                    "trace.redact_patterns: invalid pattern '{}': {}",
                    pattern, e
                ))
            })?;
        }
        if let Some(llm) = &self.llm {
            if llm.max_attempts == 0 {
                return Err(MaieuticError::Configuration(
                    "llm.max_attempts must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn merge_file(figment: figment::Figment, path: &Path) -> figment::Figment {
    use figment::providers::{Format, Json, Toml, Yaml};

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => figment.merge(Json::file(path)),
        Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
        _ => figment.merge(Toml::file(path)),
    }
}

fn check_unit_interval(field: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(MaieuticError::Configuration(format!(
            "{} must be within [0, 1], got {}",
            field, value
        )));
    }
    Ok(())
}

fn check_non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(MaieuticError::Configuration(format!(
            "{} must be a non-negative number, got {}",
            field, value
        )));
    }
    Ok(())
}
