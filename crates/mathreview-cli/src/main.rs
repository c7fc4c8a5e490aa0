//! Math Review CLI
//!
//! Runs Teacher/Student review sessions with the rule-based engines and
//! writes Markdown and JSON reports.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use mathreview_orchestrator::rules::{AnswerCheckReviewer, FormulationSolver, TemplateProblemSource};
use mathreview_orchestrator::{
    Config, ProblemSpec, ReviewCoordinator, SessionResult, StudentAgent, TeacherAgent,
    TerminalReason,
};
use mathreview_report::{json::JsonGenerator, MarkdownGenerator, Report, ReportGenerator};
use tracing_subscriber::EnvFilter;

/// Exit code when every session finished but not all were accepted.
const EXIT_NOT_ALL_ACCEPTED: u8 = 2;

/// Math Review - bounded Teacher/Student review of generated math problems
///
/// A teacher generates a grade-appropriate problem, a student solves it, and
/// the teacher reviews each attempt until it is accepted or a limit is hit.
#[derive(Parser, Debug)]
#[command(name = "mathreview")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: mathreview.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Problem topic: integers, equations, word_problem or real_life
    #[arg(short, long)]
    topic: Option<String>,

    /// Problem difficulty: easy, intermediate or hard
    #[arg(short, long)]
    difficulty: Option<String>,

    /// Grade level (1-12)
    #[arg(short, long)]
    grade: Option<u32>,

    /// Number of sessions to run concurrently
    #[arg(short = 'n', long, default_value_t = 1)]
    sessions: usize,

    /// Seed for the problem generator
    #[arg(long)]
    seed: Option<u64>,

    /// Probability that the student slips on a first attempt
    #[arg(long)]
    slip_rate: Option<f64>,

    /// Output directory for reports
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Math review starting");
    tracing::debug!(config = ?args.config, "Config file");

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_NOT_ALL_ACCEPTED),
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Runs the configured sessions and writes the reports.
///
/// Returns `true` if every session ended with an accepted solution.
async fn run(args: Args) -> anyhow::Result<bool> {
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    if args.sessions == 0 {
        anyhow::bail!("--sessions must be at least 1");
    }

    let spec = ProblemSpec::try_from(&config.problem_request())?;
    print_config(&config, &spec, args.sessions);

    let source = config
        .seed
        .map_or_else(TemplateProblemSource::from_entropy, TemplateProblemSource::new);
    let seed = source.seed();
    tracing::info!(seed, "Problem generator ready");

    let teacher = TeacherAgent::new(source, AnswerCheckReviewer::new());
    let student = StudentAgent::new(FormulationSolver::with_slips(config.slip_rate, seed));
    let coordinator =
        ReviewCoordinator::new(Arc::new(teacher), Arc::new(student), config.session_config());

    println!();
    println!("Running {} session(s)...", args.sessions);
    let specs = vec![spec; args.sessions];
    let results = coordinator.run_batch(&specs).await?;

    for (index, result) in results.iter().enumerate() {
        print_session(index + 1, result);
    }

    let title = format!("{} / {} / grade {}", spec.topic, spec.difficulty, spec.grade_level);
    let report = ReportGenerator::new(&title, &results).generate();

    println!();
    print_summary(&report);
    generate_reports(&report, Path::new(&config.output_dir))?;

    Ok(report.all_accepted())
}

/// Loads the config from `--config` or from the current directory.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Applies command-line overrides on top of the loaded config.
fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(ref topic) = args.topic {
        config.topic.clone_from(topic);
    }
    if let Some(ref difficulty) = args.difficulty {
        config.difficulty.clone_from(difficulty);
    }
    if let Some(grade) = args.grade {
        config.grade_level = grade;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(slip_rate) = args.slip_rate {
        config.slip_rate = slip_rate;
    }
    if let Some(ref output_dir) = args.output_dir {
        config.output_dir.clone_from(output_dir);
    }
}

fn print_config(config: &Config, spec: &ProblemSpec, sessions: usize) {
    println!("Configuration loaded:");
    println!("  Topic: {}", spec.topic);
    println!("  Difficulty: {}", spec.difficulty);
    println!("  Grade level: {}", spec.grade_level);
    println!("  Sessions: {sessions}");
    println!("  Max iterations: {}", config.max_iterations);
    println!("  Per-iteration timeout: {}s", config.per_iteration_timeout);
    println!("  Total time budget: {}s", config.total_time_budget);
    println!("  Output directory: {}", config.output_dir);
}

fn print_session(number: usize, result: &SessionResult) {
    let answer = result
        .final_solution
        .as_ref()
        .map_or_else(|| "-".to_string(), |s| s.value.to_string());
    println!(
        "  Session {number}: {} after {} iteration(s), final answer {answer}",
        result.terminal_reason.description(),
        result.iterations_used
    );
    if let Some(failure) = &result.failure {
        println!("    Failure: {failure}");
    }
}

fn print_summary(report: &Report) {
    let summary = &report.summary;
    println!("=== Math Review Summary ===");
    println!("Sessions: {}", summary.total_sessions);
    for reason in TerminalReason::ALL {
        println!("  {}: {}", reason.description(), summary.count(reason));
    }
    println!("Acceptance rate: {:.1}%", summary.acceptance_rate * 100.0);
    println!("Average iterations: {:.2}", summary.average_iterations);
}

/// Writes the Markdown and JSON reports into `output_dir`.
fn generate_reports(report: &Report, output_dir: &Path) -> anyhow::Result<()> {
    println!();
    println!("Generating reports...");

    std::fs::create_dir_all(output_dir)?;

    let md_path: PathBuf = output_dir.join("mathreview-report.md");
    std::fs::write(&md_path, MarkdownGenerator::new(report).generate())?;
    println!("  Markdown report: {}", md_path.display());

    let json_path = output_dir.join("mathreview-report.json");
    JsonGenerator::new(report).write_to_file(&json_path, true)?;
    println!("  JSON report: {}", json_path.display());

    Ok(())
}
