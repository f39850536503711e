//! End-to-end evaluation tests
//!
//! These tests drive the tutor agent through file-based configuration the way
//! the CLI does: metric weights, test cases, scripted replies and stub tools
//! all come from disk, and results land in a results directory.

use std::path::Path;
use std::sync::Arc;

use maieutic_core::prelude::*;
use maieutic_core::trace::TRACE_SCHEMA_VERSION;
use serde_json::json;
use tempfile::TempDir;

const METRICS: &str = r#"{
    "test_suite": "dsa_tutor",
    "metrics": [
        {"name": "response_match_score", "description": "keywords present", "weight": 0.4},
        {"name": "tool_trajectory_score", "description": "right tools", "weight": 0.3},
        {"name": "socratic_method_score", "description": "guiding questions", "weight": 0.3}
    ]
}"#;

const TEST_CASES: &str = r#"[
    {
        "id": "tc_001",
        "name": "Hint request",
        "input": "I'm stuck on this problem, can you give me a hint?",
        "expected_keywords": ["hint", "consider", "think", "what if", "try"],
        "expected_behavior": "socratic_hint",
        "anti_patterns": ["the answer is"],
        "difficulty": "easy"
    },
    {
        "id": "tc_002",
        "name": "Easy problem",
        "input": "Give me an easy problem",
        "expected_keywords": ["two sum", "brute force"],
        "expected_tools": ["fetch_leetcode_problem"],
        "expected_tool_args": {"fetch_leetcode_problem": {"difficulty": "easy"}},
        "expected_behavior": "socratic_method"
    },
    {
        "id": "tc_003",
        "name": "Mock interview",
        "input": "interview me on graphs",
        "expected_keywords": ["graph"]
    }
]"#;

const STUBS: &str = r#"{
    "fetch_leetcode_problem": {"value": {"title": "Two Sum", "difficulty": "Easy"}}
}"#;

fn responses(hint_reply: &str) -> String {
    // flat map rules are tried in key order: "hint" before "problem"
    json!({
        "hint": hint_reply,
        "interview": "Tell me how you would detect a cycle in a directed graph.",
        "problem": "Let's look at Two Sum. What would a brute force approach look like?"
    })
    .to_string()
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("metrics.json"), METRICS).unwrap();
        std::fs::write(dir.path().join("test_cases.json"), TEST_CASES).unwrap();
        std::fs::write(dir.path().join("stubs.json"), STUBS).unwrap();

        let root = dir.path().display();
        std::fs::write(
            dir.path().join("maieutic.toml"),
            format!(
                r#"
[trace]
mode = "full"
dir = "{root}/traces"

[eval]
metrics_path = "{root}/metrics.json"
test_cases_path = "{root}/test_cases.json"
results_dir = "{root}/results"
case_timeout = "5s"
max_concurrency = 2
"#
            ),
        )
        .unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    fn config(&self) -> MaieuticConfig {
        MaieuticConfig::from_file(self.path("maieutic.toml")).expect("valid config")
    }

    fn agent(&self, hint_reply: &str) -> Arc<dyn Agent> {
        let script = self.path("responses.json");
        std::fs::write(&script, responses(hint_reply)).unwrap();

        let mut tools = ToolSet::new();
        for stub in StubTool::load_all(self.path("stubs.json")).unwrap() {
            tools.register(Arc::new(stub));
        }
        Arc::new(TutorAgent::new(Arc::new(ScriptedLlm::load(&script).unwrap()), tools))
    }

    async fn run(&self, hint_reply: &str) -> (EvaluationRun, std::path::PathBuf) {
        let config = self.config();
        let metrics = MetricConfig::load(&config.eval.metrics_path).unwrap();
        let test_set = TestSet::load(&config.eval.test_cases_path).unwrap();
        let harness =
            EvaluationHarness::from_config(&config, self.agent(hint_reply), &metrics).unwrap();
        harness
            .run_and_save(&test_set, &ResultsStore::new(&config.eval.results_dir))
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_file_driven_run() {
    let ws = Workspace::new();
    let (run, path) = ws
        .run("Here's a hint: What if you tried sorting the array first?")
        .await;

    assert!(path.starts_with(ws.path("results")));
    assert_eq!(run.suite.as_deref(), Some("dsa_tutor"));
    assert_eq!(run.total_tests, 3);
    assert_eq!(run.passed, 3);
    assert_eq!(run.trace_violations, 0);

    let hint = run.result("tc_001").unwrap();
    assert!((hint.overall_score() - 0.76).abs() < 1e-9);

    let problem = run.result("tc_002").unwrap();
    assert_eq!(problem.metrics.response_match_score, Some(1.0));
    assert_eq!(problem.metrics.tool_trajectory_score, Some(1.0));
    assert_eq!(problem.metrics.socratic_method_score, Some(0.5));
    assert_eq!(problem.tools_called, vec!["fetch_leetcode_problem"]);

    let interview = run.result("tc_003").unwrap();
    assert_eq!(interview.overall_score(), 1.0);

    // every case left a valid trace on disk
    for result in &run.results {
        let trace = TraceSession::load(result.trace_path.as_ref().unwrap()).unwrap();
        assert_eq!(trace.schema_version, TRACE_SCHEMA_VERSION);
        assert!(trace.verify().is_ok());
        assert!(trace.final_response().is_some());
    }

    let interview_trace = TraceSession::load(interview.trace_path.as_ref().unwrap()).unwrap();
    assert_eq!(
        interview_trace.final_response().unwrap().mode,
        AgentMode::Interviewer
    );
    let summary = TraceExporter::export(&interview_trace, TraceFormat::Summary).unwrap();
    assert!(summary.contains("interview me on graphs"));
}

#[tokio::test]
async fn test_regression_between_saved_runs() {
    let ws = Workspace::new();
    ws.run("Here's a hint: What if you tried sorting the array first?")
        .await;
    ws.run("The answer is to use a hash map and return [i, j].")
        .await;

    let config = ws.config();
    let (older, newer) = ResultsStore::new(&config.eval.results_dir)
        .latest_pair()
        .unwrap();
    let report = RegressionComparator::from_config(&config.compare).compare(
        &EvaluationRun::load(&older).unwrap(),
        &EvaluationRun::load(&newer).unwrap(),
    );

    assert!(report.aggregate_regressed);
    assert!(!report.digest_mismatch);
    let regressed: Vec<&str> = report
        .regressed_cases()
        .map(|c| c.test_case_id.as_str())
        .collect();
    assert_eq!(regressed, vec!["tc_001"]);
}

#[test]
fn test_bad_weights_fail_before_running() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metrics.json");
    std::fs::write(
        &path,
        r#"{"metrics": [
            {"name": "response_match_score", "weight": 0.4},
            {"name": "tool_trajectory_score", "weight": 0.3},
            {"name": "socratic_method_score", "weight": 0.2}
        ]}"#,
    )
    .unwrap();

    let err = MetricConfig::load(&path).unwrap_err();
    assert!(matches!(err, MaieuticError::Configuration(_)));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[eval]\nmax_concurrency = 0\n").unwrap();
    assert!(MaieuticConfig::from_file(&path).is_err());
    assert!(MaieuticConfig::from_file(Path::new("/nonexistent/maieutic.toml")).is_err());
}
