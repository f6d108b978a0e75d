//! Run command implementation.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use qbatch_core::Config;
use tracing::debug;

use super::common::{build_backend, load_request, print_results};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Request file (JSON)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Engine URL (overrides the configured engine)
    #[arg(long, conflicts_with = "engine_path")]
    pub engine_url: Option<String>,

    /// Engine executable (overrides the configured engine)
    #[arg(long)]
    pub engine_path: Option<PathBuf>,

    /// Capture the final statevector (runs a single shot)
    #[arg(long)]
    pub statevector: bool,

    /// Number of shots (overrides the request)
    #[arg(short, long)]
    pub shots: Option<u32>,

    /// Simulator seed (overrides the request)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Engine optimization level (overrides the request)
    #[arg(short = 'o', long)]
    pub optimization_level: Option<u32>,

    /// Give up waiting after this many seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Execute the run command.
pub async fn execute(mut config: Config, args: RunArgs) -> Result<()> {
    if let Some(url) = args.engine_url {
        config.engine.url = url;
        config.engine.path = None;
    }
    if let Some(path) = args.engine_path {
        config.engine.path = Some(path);
    }
    config.validate()?;
    debug!(?config, "Effective configuration");

    let mut request = load_request(&args.input)?;
    if let Some(shots) = args.shots {
        request = request.with_shots(shots);
    }
    if let Some(seed) = args.seed {
        request = request.with_seed(seed);
    }
    if let Some(level) = args.optimization_level {
        request = request.with_optimization_level(level);
    }

    let backend = build_backend(&config, args.statevector)?;
    let table = args.format == OutputFormat::Table;

    if table {
        println!(
            "{} Running {} on {} ({} experiments, {} shots)",
            style("→").cyan().bold(),
            style(args.input.display()).green(),
            style(backend.name()).yellow(),
            request.len(),
            request.config.shots
        );
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    if !table {
        spinner.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
    spinner.set_message("Submitting job...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let job = backend.run(request)?;
    spinner.set_message(format!("Running job {}...", job.id()));

    let outcome = job.result(args.timeout.map(Duration::from_secs)).await;
    spinner.finish_and_clear();
    let result = outcome?;

    match args.format {
        OutputFormat::Table => print_results(result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
    }

    Ok(())
}
