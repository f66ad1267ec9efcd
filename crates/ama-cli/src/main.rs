//! AMA - Automated Memory Assessment CLI
//!
//! The `ama` command builds conversational memory from one dialogue session,
//! probes it with generated questions, repairs it when too many probes fail
//! and prints the session result as JSON.
//!
//! ## Commands
//!
//! - `run` (default): process one session

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn, Level};

use ama_core::config::{DEFAULT_PASS_RATE_THRESHOLD, DEFAULT_QA_COUNT, DEFAULT_SIMILARITY_THRESHOLD, DEFAULT_TOP_K};
use ama_core::metrics::METRICS;
use ama_core::{
    init_tracing, write_session_report, DialogueInput, DialogueSession, Evaluator, KeywordAdapter,
    PipelineConfig, QaPolicy, SessionOrchestrator, SessionResult, DEFAULT_SESSION_ID,
    DEFAULT_USER_ID,
};
use ama_oracle::{OracleConfig, OracleSet, ScorerKind};
use ama_state::{JsonFileStore, MemoryStore, SearchMethod, VectorStore};

/// Session used when no `--dialogue` is given.
const EXAMPLE_SESSION: &str = include_str!("../data/example_session.json");

#[derive(Parser)]
#[command(name = "ama")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated Memory Assessment (AMA)", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate and, if needed, repair memory for one dialogue session
    Run(RunArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StoreArg {
    /// Keyword search over the JSON files
    Json,
    /// Embedding search over the JSON files
    Vector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ScorerArg {
    Embedding,
    Lexical,
}

impl From<ScorerArg> for ScorerKind {
    fn from(arg: ScorerArg) -> Self {
        match arg {
            ScorerArg::Embedding => ScorerKind::Embedding,
            ScorerArg::Lexical => ScorerKind::Lexical,
        }
    }
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Dialogue file, or inline dialogue text (bundled example if omitted)
    #[arg(short, long)]
    dialogue: Option<String>,

    /// User id (overrides the one found in the dialogue file)
    #[arg(long)]
    user_id: Option<String>,

    /// Session id (overrides the one found in the dialogue file)
    #[arg(long)]
    session_id: Option<String>,

    /// Where memory artifacts and reports are written
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Where per-user memory files live
    #[arg(long, default_value = "memory_storage")]
    storage_dir: PathBuf,

    #[arg(long, value_enum, default_value = "json")]
    store: StoreArg,

    #[arg(long, value_enum, default_value = "embedding")]
    scorer: ScorerArg,

    /// Probe questions per evaluation pass
    #[arg(long, env = "AMA_QA_COUNT", default_value_t = DEFAULT_QA_COUNT)]
    qa_count: usize,

    /// Entries retrieved per question
    #[arg(long, env = "AMA_TOP_K", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// keyword, vector or hybrid
    #[arg(long, env = "AMA_SEARCH_METHOD", default_value = "vector")]
    search_method: SearchMethod,

    #[arg(long, env = "AMA_SIMILARITY_THRESHOLD", default_value_t = DEFAULT_SIMILARITY_THRESHOLD)]
    similarity_threshold: f64,

    /// Pass rate (percent) below which memory is reconstructed
    #[arg(long, env = "AMA_PASS_RATE_THRESHOLD", default_value_t = DEFAULT_PASS_RATE_THRESHOLD)]
    pass_rate_threshold: f64,

    /// Failed probes needed before an update strategy is requested
    #[arg(long, env = "AMA_STRATEGY_FAILURE_THRESHOLD", default_value_t = 2)]
    strategy_failure_threshold: usize,

    /// Probes evaluated at once
    #[arg(long, env = "AMA_MAX_CONCURRENCY", default_value_t = 1)]
    max_concurrency: usize,

    /// reuse or regenerate probe questions after reconstruction
    #[arg(long, env = "AMA_QA_POLICY", default_value = "reuse")]
    qa_policy: QaPolicy,

    /// Also write the result JSON and a markdown summary to the output dir
    #[arg(long)]
    report: bool,
}

impl RunArgs {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let config = PipelineConfig {
            qa_count: self.qa_count,
            top_k: self.top_k,
            search_method: self.search_method,
            similarity_threshold: self.similarity_threshold,
            pass_rate_threshold: self.pass_rate_threshold,
            strategy_failure_threshold: self.strategy_failure_threshold,
            max_concurrency: self.max_concurrency,
            qa_policy: self.qa_policy,
        };
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let args = match cli.command {
        Some(Commands::Run(args)) => args,
        None => cli.run,
    };

    // Failures are reported in the result, never through the exit code.
    let result = match cmd_run(&args).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %format!("{e:#}"), "session could not be run");
            SessionResult::failed(
                args.user_id.as_deref().unwrap_or(DEFAULT_USER_ID),
                args.session_id.as_deref().unwrap_or(DEFAULT_SESSION_ID),
                format!("{e:#}"),
            )
        }
    };

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Single-line argument ending in `.json`/`.txt` or containing a path
/// separator.
fn looks_like_path(source: &str) -> bool {
    let source = source.trim();
    if source.is_empty() || source.contains('\n') {
        return false;
    }
    let lower = source.to_ascii_lowercase();
    lower.ends_with(".json")
        || lower.ends_with(".txt")
        || source.contains('/')
        || source.contains('\\')
}

/// Read the dialogue source: an existing file, inline text, or the bundled
/// example.
fn read_dialogue_source(dialogue: Option<&str>) -> Result<String> {
    match dialogue {
        None => Ok(EXAMPLE_SESSION.to_string()),
        Some(source) => {
            let path = Path::new(source);
            if path.is_file() {
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read dialogue file {}", path.display()))
            } else {
                if looks_like_path(source) {
                    warn!(
                        path = %path.display(),
                        "dialogue file not found, using the argument as inline dialogue text"
                    );
                }
                Ok(source.to_string())
            }
        }
    }
}

fn load_session(args: &RunArgs) -> Result<DialogueSession> {
    let raw = read_dialogue_source(args.dialogue.as_deref())?;
    let input = DialogueInput::parse(&raw).context("Failed to parse dialogue")?;
    let session = input
        .into_session(args.user_id.clone(), args.session_id.clone())
        .context("Dialogue has no content")?;
    Ok(session)
}

fn build_store(args: &RunArgs, oracles: &OracleSet) -> Arc<dyn MemoryStore> {
    let json = JsonFileStore::new(&args.storage_dir, Arc::clone(&oracles.summarizer));
    match args.store {
        StoreArg::Json => Arc::new(json),
        StoreArg::Vector => Arc::new(VectorStore::new(json, Arc::clone(&oracles.embedder))),
    }
}

async fn cmd_run(args: &RunArgs) -> Result<SessionResult> {
    let config = args.pipeline_config().context("Invalid pipeline configuration")?;
    let session = load_session(args)?;

    let oracles = OracleSet::openai(OracleConfig::from_env(), args.scorer.into())
        .context("Failed to configure oracles")?;
    let store = build_store(args, &oracles);
    let evaluator = Evaluator::from_oracles(&oracles, config);
    let orchestrator = SessionOrchestrator::new(
        store,
        evaluator,
        Arc::new(KeywordAdapter::new()),
        &args.output_dir,
    );

    info!(
        user_id = %session.user_id,
        session_id = %session.session_id,
        lines = session.line_count(),
        "running session"
    );
    let result = orchestrator.run(&session).await;
    METRICS.flush();

    if args.report {
        match write_session_report(&args.output_dir, &result).await {
            Ok(paths) => info!(
                result = %paths.result_json.display(),
                summary = %paths.summary_md.display(),
                "report written"
            ),
            Err(e) => warn!(error = %e, "report could not be written"),
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Cli {
        Cli::try_parse_from(argv).unwrap()
    }

    fn run_args(cli: Cli) -> RunArgs {
        match cli.command {
            Some(Commands::Run(args)) => args,
            None => cli.run,
        }
    }

    #[test]
    fn test_run_is_the_default_command() {
        let implicit = run_args(parse(&["ama", "--qa-count", "5"]));
        let explicit = run_args(parse(&["ama", "run", "--qa-count", "5"]));
        assert_eq!(implicit.qa_count, 5);
        assert_eq!(explicit.qa_count, 5);
        assert_eq!(implicit.output_dir, PathBuf::from("output"));
        assert_eq!(implicit.store, StoreArg::Json);
    }

    #[test]
    fn test_knobs_map_onto_pipeline_config() {
        let args = run_args(parse(&[
            "ama",
            "--search-method",
            "hybrid",
            "--qa-policy",
            "regenerate",
            "--max-concurrency",
            "4",
        ]));
        let config = args.pipeline_config().unwrap();
        assert_eq!(config.search_method, SearchMethod::Hybrid);
        assert_eq!(config.qa_policy, QaPolicy::Regenerate);
        assert_eq!(config.max_concurrency, 4);
    }

    #[test]
    fn test_invalid_threshold_is_rejected() {
        let args = run_args(parse(&["ama", "--similarity-threshold", "1.5"]));
        assert!(args.pipeline_config().is_err());
    }

    #[test]
    fn test_bundled_example_session() {
        let session = load_session(&run_args(parse(&["ama"]))).unwrap();
        assert_eq!(session.user_id, "user_001");
        assert_eq!(session.session_id, "session_2024_01_15_001");
        assert_eq!(session.metadata["topic"], "Japan Travel Planning");
        assert!(session.line_count() > 20);
    }

    #[test]
    fn test_flags_override_embedded_ids() {
        let session = load_session(&run_args(parse(&[
            "ama",
            "--user-id",
            "u9",
            "--session-id",
            "s9",
        ])))
        .unwrap();
        assert_eq!(session.user_id, "u9");
        assert_eq!(session.session_id, "s9");
    }

    #[test]
    fn test_dialogue_file_of_turns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turns.json");
        std::fs::write(
            &path,
            r#"[{"role": "user", "content": "We fly JAL"}, {"role": "assistant", "content": "Noted"}]"#,
        )
        .unwrap();

        let path = path.to_string_lossy().into_owned();
        let session = load_session(&run_args(parse(&["ama", "--dialogue", &path]))).unwrap();
        assert_eq!(session.text(), "user: We fly JAL\nassistant: Noted");
        assert_eq!(session.user_id, DEFAULT_USER_ID);
    }

    #[test]
    fn test_inline_dialogue_text() {
        let session =
            load_session(&run_args(parse(&["ama", "--dialogue", "user: hello there"]))).unwrap();
        assert_eq!(session.line_count(), 1);
        assert_eq!(session.session_id, DEFAULT_SESSION_ID);
    }

    #[test]
    fn test_path_like_arguments() {
        assert!(looks_like_path("sessions/user_001.json"));
        assert!(looks_like_path("dialogue.TXT"));
        assert!(looks_like_path(r"C:\data\session"));
        assert!(!looks_like_path("user: hello there"));
        assert!(!looks_like_path("user: see a/b\nassistant: ok"));
        assert!(!looks_like_path("   "));
    }

    #[test]
    fn test_missing_dialogue_file_falls_back_to_text() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json").to_string_lossy().into_owned();
        assert!(looks_like_path(&missing));
        assert_eq!(read_dialogue_source(Some(&missing)).unwrap(), missing);
    }

    #[test]
    fn test_blank_dialogue_is_an_error() {
        assert!(load_session(&run_args(parse(&["ama", "--dialogue", "   "]))).is_err());
    }
}
