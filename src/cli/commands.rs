//! CLI command definitions for mathforge.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::llm::OpenAiAgent;
use crate::metrics::DatasetReport;
use crate::pipeline::{PipelineConfig, PipelineOrchestrator, RunMode};
use crate::storage;

/// Default output directory for stage artifacts.
const DEFAULT_OUTPUT_DIR: &str = "./output";

/// AIME-style math problem dataset generator.
#[derive(Parser)]
#[command(name = "mathforge")]
#[command(about = "Generate, diversify, solve and refine AIME-style math problems")]
#[command(version)]
#[command(
    long_about = "mathforge drives an LLM agent through a four-stage pipeline: base problem \
generation, diversification, solution generation, and iterative quality improvement.\n\n\
Each stage persists one JSON artifact under the output directory.\n\n\
Example usage:\n  mathforge run --mode quick --output ./output\n  mathforge stage 3 --input ./output/stage2_diversified.json\n  mathforge metrics ./output/stage4_improved.json"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the full four-stage pipeline.
    Run(RunArgs),

    /// Run a single stage over an existing artifact.
    Stage(StageArgs),

    /// Report dataset metrics over a stage artifact.
    Metrics(MetricsArgs),
}

/// Arguments for `mathforge run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Run-size preset.
    #[arg(short, long, value_enum, default_value = "full")]
    pub mode: RunMode,

    /// Output directory for stage artifacts.
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// RNG seed for topic/difficulty sampling and fabricated answers.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the preset's number of base problems.
    #[arg(long)]
    pub num_problems: Option<usize>,

    /// Override the preset's number of variations.
    #[arg(long)]
    pub num_variations: Option<usize>,

    /// Override the preset's improvement iteration cap.
    #[arg(long)]
    pub max_iterations: Option<u32>,
}

/// Arguments for `mathforge stage`.
#[derive(Parser, Debug)]
pub struct StageArgs {
    /// Stage to run (1-4).
    pub number: u8,

    /// Input artifact. Ignored by stage 1; other stages default to the
    /// previous stage's artifact under the output directory.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output directory for the stage artifact.
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// RNG seed.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for `mathforge metrics`.
#[derive(Parser, Debug)]
pub struct MetricsArgs {
    /// Stage artifact to analyze.
    pub input: PathBuf,

    /// Emit the report as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Parse CLI arguments from the process environment.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse and run in one step.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Execute a parsed CLI invocation.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_pipeline(args).await,
        Commands::Stage(args) => run_single_stage(args).await,
        Commands::Metrics(args) => report_metrics(args),
    }
}

fn build_config(
    mode: RunMode,
    output: PathBuf,
    seed: Option<u64>,
    num_problems: Option<usize>,
    num_variations: Option<usize>,
    max_iterations: Option<u32>,
) -> PipelineConfig {
    let mut config = PipelineConfig::for_mode(mode).with_output_dir(output);
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    if let Some(num_problems) = num_problems {
        config = config.with_num_problems(num_problems);
    }
    if let Some(num_variations) = num_variations {
        config = config.with_num_variations(num_variations);
    }
    if let Some(max_iterations) = max_iterations {
        config = config.with_max_iterations(max_iterations);
    }
    config
}

async fn run_pipeline(args: RunArgs) -> anyhow::Result<()> {
    let config = build_config(
        args.mode,
        args.output,
        args.seed,
        args.num_problems,
        args.num_variations,
        args.max_iterations,
    );

    // Missing API key fails here, before any stage runs.
    let agent = Arc::new(OpenAiAgent::from_env()?);
    info!(model = agent.model(), "Agent configured");

    let orchestrator = PipelineOrchestrator::new(agent, config)?;
    let records = orchestrator.run_all().await?;

    let report = DatasetReport::compute(&records);
    println!("{}", report.render());
    Ok(())
}

async fn run_single_stage(args: StageArgs) -> anyhow::Result<()> {
    let config = PipelineConfig::default().with_output_dir(args.output);
    let config = match args.seed {
        Some(seed) => config.with_seed(seed),
        None => config,
    };

    let input = if args.number <= 1 {
        Vec::new()
    } else {
        let input_path = match args.input {
            Some(path) => path,
            None => config
                .stage_path(args.number - 1)
                .context("no default input for this stage")?,
        };
        storage::read_artifact(&input_path)
            .with_context(|| format!("reading input artifact {}", input_path.display()))?
    };

    let agent = Arc::new(OpenAiAgent::from_env()?);
    let orchestrator = PipelineOrchestrator::new(agent, config)?;
    let records = orchestrator.run_stage(args.number, input).await?;

    info!(stage = args.number, records = records.len(), "Stage finished");
    Ok(())
}

fn report_metrics(args: MetricsArgs) -> anyhow::Result<()> {
    let records = storage::read_artifact(&args.input)
        .with_context(|| format!("reading artifact {}", args.input.display()))?;
    let report = DatasetReport::compute(&records);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.render());
    }
    Ok(())
}
