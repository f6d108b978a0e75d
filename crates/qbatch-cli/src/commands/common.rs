//! Common utilities for CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use qbatch_adapter_http::HttpTransport;
use qbatch_adapter_process::ProcessTransport;
use qbatch_core::{
    BackendConfiguration, Config, EngineBackend, EngineClient, JobRequest, JobResult, Transport,
    TransportConfig, WorkerPool,
};

/// Load a request from a JSON file.
pub fn load_request(path: &Path) -> Result<JobRequest> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {}", path.display()))?;
    JobRequest::from_json(&contents)
        .with_context(|| format!("Failed to parse request file {}", path.display()))
}

/// Build the transport selected by `config`.
pub fn build_transport(config: &Config) -> Result<Arc<dyn Transport>> {
    let transport: Arc<dyn Transport> = match config.transport() {
        TransportConfig::Http {
            url,
            request_timeout,
        } => Arc::new(HttpTransport::new(url)?.with_request_timeout(request_timeout)),
        TransportConfig::Process { path } => Arc::new(ProcessTransport::new(path)),
    };
    Ok(transport)
}

/// Build a backend from `config`, with its own worker pool.
pub fn build_backend(config: &Config, statevector: bool) -> Result<EngineBackend> {
    let engine = EngineClient::new(build_transport(config)?)
        .with_statevector(statevector)
        .with_default_optimization_level(config.engine.optimization_level)
        .with_dump_dir(config.dump_dir.clone());

    let configuration = if statevector {
        BackendConfiguration::statevector_simulator()
    } else {
        BackendConfiguration::counts_simulator()
    };

    Ok(EngineBackend::from_engine(configuration, engine)
        .with_pool(Arc::new(WorkerPool::new(config.workers))))
}

/// Print a job result as a table of counts per experiment.
pub fn print_results(result: &JobResult) {
    use console::style;

    for experiment in &result.results {
        let total = experiment.total_counts();
        println!(
            "\n{} {} ({} shots, {:.3} s)",
            if experiment.success {
                style("✓").green().bold()
            } else {
                style("✗").red().bold()
            },
            style(&experiment.name).bold(),
            experiment.shots,
            experiment.time_taken
        );

        if !experiment.success {
            println!("  {}", style("engine returned no result").red());
            continue;
        }

        let sorted = experiment.sorted_counts();
        for (outcome, count) in sorted.iter().take(16) {
            let prob = *count as f64 / total.max(1) as f64 * 100.0;
            let bar_len = (prob / 2.0).round() as usize;
            let bar: String = "█".repeat(bar_len);

            println!(
                "  {}: {:>6} ({:>5.2}%) {}",
                style(outcome).cyan(),
                count,
                prob,
                style(bar).green()
            );
        }

        if sorted.len() > 16 {
            println!("  ... and {} more outcomes", sorted.len() - 16);
        }

        if let Some(state) = &experiment.data.statevector {
            println!("  Statevector: {} amplitudes", state.len());
        }
    }

    println!(
        "\n  Engine {} | wall time {} s | engine time {} s",
        style(&result.engine_version).yellow(),
        style(format!("{:.3}", result.metrics.wall_time_secs)).yellow(),
        style(format!("{:.3}", result.metrics.engine_time_secs)).yellow()
    );
}
