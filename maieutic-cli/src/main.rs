//! Maieutic CLI - run evaluations, compare runs, inspect traces

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use maieutic_core::agent::{IntentRouter, KeywordRouter, LlmRouter, TutorAgent};
use maieutic_core::config::MaieuticConfig;
use maieutic_core::eval::{
    EvaluationHarness, EvaluationRun, MetricConfig, RegressionComparator, ResultsStore, TestSet,
};
use maieutic_core::llm::{LLMProvider, LLMProviderFactory, ScriptedLlm};
use maieutic_core::tools::{StubTool, ToolSet};
use maieutic_core::trace::{TraceExporter, TraceFormat, TraceSession};

#[derive(Parser)]
#[command(name = "maieutic")]
#[command(about = "Trace and evaluate tutoring agents", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to maieutic.toml plus MAIEUTIC_* variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the test set against the tutor agent and save the results
    Run {
        /// Scripted model replies (input substring -> reply) instead of the configured model
        #[arg(long, env = "MAIEUTIC_RESPONSES")]
        responses: Option<PathBuf>,

        /// Stub tool definitions
        #[arg(long)]
        tool_stubs: Option<PathBuf>,

        /// Override eval.test_cases_path
        #[arg(long)]
        test_cases: Option<PathBuf>,

        /// Override eval.metrics_path
        #[arg(long)]
        metrics: Option<PathBuf>,

        /// Route intents with the model instead of keyword rules
        #[arg(long)]
        llm_router: bool,
    },
    /// Compare two result files and report regressions
    Compare {
        /// Older results file
        old: Option<PathBuf>,

        /// Newer results file
        new: Option<PathBuf>,

        /// Compare the two most recent runs in eval.results_dir
        #[arg(long, conflicts_with_all = ["old", "new"])]
        latest: bool,

        /// Override compare.tolerance
        #[arg(long)]
        tolerance: Option<f64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a saved trace
    Trace {
        file: PathBuf,

        /// summary, json or pretty
        #[arg(long, default_value = "summary")]
        format: TraceFormat,
    },
    /// Load and validate configuration, metric weights and test cases
    Validate,
    /// Version information
    Version,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("maieutic {}", env!("CARGO_PKG_VERSION"));
        println!("maieutic-core {}", maieutic_core::VERSION);
        return Ok(ExitCode::SUCCESS);
    }

    let config = match &cli.config {
        Some(path) => MaieuticConfig::from_file(path),
        None => MaieuticConfig::load(),
    }
    .context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(config.logging.env_filter())
        .init();

    match cli.command {
        Commands::Run {
            responses,
            tool_stubs,
            test_cases,
            metrics,
            llm_router,
        } => {
            run(
                &config,
                RunArgs {
                    responses,
                    tool_stubs,
                    test_cases,
                    metrics,
                    llm_router,
                },
            )
            .await
        }
        Commands::Compare {
            old,
            new,
            latest,
            tolerance,
            json,
        } => compare(&config, old, new, latest, tolerance, json),
        Commands::Trace { file, format } => {
            let session = TraceSession::load(&file)
                .with_context(|| format!("reading trace {}", file.display()))?;
            if let Err(e) = session.verify() {
                tracing::warn!("{}", e);
            }
            println!("{}", TraceExporter::export(&session, format)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate => validate(&config),
        Commands::Version => Ok(ExitCode::SUCCESS),
    }
}

struct RunArgs {
    responses: Option<PathBuf>,
    tool_stubs: Option<PathBuf>,
    test_cases: Option<PathBuf>,
    metrics: Option<PathBuf>,
    llm_router: bool,
}

async fn run(config: &MaieuticConfig, args: RunArgs) -> Result<ExitCode> {
    let metrics = load_metrics(args.metrics.as_deref().unwrap_or(&config.eval.metrics_path))?;
    let test_set =
        load_test_set(args.test_cases.as_deref().unwrap_or(&config.eval.test_cases_path))?;

    let llm: Arc<dyn LLMProvider> = match (&args.responses, &config.llm) {
        (Some(path), _) => Arc::new(ScriptedLlm::load(path)?),
        (None, Some(llm)) => LLMProviderFactory::create(llm)?,
        (None, None) => {
            bail!("no model configured: add an [llm] section or pass --responses FILE")
        }
    };

    let mut tools = ToolSet::new();
    if let Some(path) = &args.tool_stubs {
        for stub in StubTool::load_all(path)? {
            tools.register(Arc::new(stub));
        }
    }
    #[cfg(feature = "tool-leetcode")]
    if !tools.contains(maieutic_core::tools::FETCH_PROBLEM_TOOL) {
        tools.register(Arc::new(maieutic_core::tools::LeetCodeTool::default()));
    }
    tracing::info!(tools = ?tools.names(), "tools registered");

    let router: Arc<dyn IntentRouter> = if args.llm_router {
        Arc::new(LlmRouter::new(llm.clone()))
    } else {
        Arc::new(KeywordRouter::new())
    };
    let agent = TutorAgent::new(llm, tools)
        .with_router(router)
        .with_temperature(config.llm.as_ref().and_then(|l| l.temperature));

    let harness = EvaluationHarness::from_config(config, Arc::new(agent), &metrics)?;
    let store = ResultsStore::new(&config.eval.results_dir);
    let (run, path) = harness.run_and_save(&test_set, &store).await?;

    print!("{}", run.summary());
    println!("Results saved to {}", path.display());

    if run.trace_violations > 0 {
        eprintln!(
            "{} test case(s) violated the trace ordering rules",
            run.trace_violations
        );
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::SUCCESS)
}

fn compare(
    config: &MaieuticConfig,
    old: Option<PathBuf>,
    new: Option<PathBuf>,
    latest: bool,
    tolerance: Option<f64>,
    json: bool,
) -> Result<ExitCode> {
    let (old, new) = match (old, new) {
        _ if latest => ResultsStore::new(&config.eval.results_dir).latest_pair()?,
        (Some(old), Some(new)) => (old, new),
        _ => bail!("pass OLD and NEW result files, or --latest"),
    };

    let tolerance = tolerance.unwrap_or(config.compare.tolerance);
    if !(0.0..=1.0).contains(&tolerance) {
        bail!("tolerance must be within [0, 1], got {}", tolerance);
    }

    let old_run = load_run(&old)?;
    let new_run = load_run(&new)?;
    let report = RegressionComparator::new(tolerance).compare(&old_run, &new_run);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    Ok(if report.has_regressions() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn validate(config: &MaieuticConfig) -> Result<ExitCode> {
    let metrics = load_metrics(&config.eval.metrics_path)?;
    let test_set = load_test_set(&config.eval.test_cases_path)?;
    if let Some(llm) = &config.llm {
        LLMProviderFactory::create(llm).context("checking [llm]")?;
    }

    println!("Configuration OK");
    println!(
        "  metrics: {} ({})",
        config.eval.metrics_path.display(),
        metrics
            .metrics
            .iter()
            .map(|m| format!("{}={}", m.name, m.weight))
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "  test cases: {} ({} cases, sha256 {})",
        config.eval.test_cases_path.display(),
        test_set.len(),
        test_set.digest()
    );
    println!("  recording: {:?}", config.trace.mode);
    Ok(ExitCode::SUCCESS)
}

fn load_metrics(path: &Path) -> Result<MetricConfig> {
    MetricConfig::load(path).with_context(|| format!("loading metrics {}", path.display()))
}

fn load_test_set(path: &Path) -> Result<TestSet> {
    TestSet::load(path).with_context(|| format!("loading test cases {}", path.display()))
}

fn load_run(path: &Path) -> Result<EvaluationRun> {
    EvaluationRun::load(path).with_context(|| format!("reading results {}", path.display()))
}
