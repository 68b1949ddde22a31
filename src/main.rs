use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use grassland::{
    report::{CsvSink, JsonLinesSink},
    Simulation, SimulationConfig,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Grassland predator/prey simulation")]
struct Cli {
    /// Scenario YAML file (reference parameters when omitted)
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Override the random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the first year that is not simulated
    #[arg(long)]
    horizon_year: Option<i32>,

    /// Fail instead of hanging when an agent misses a barrier for this long
    #[arg(long)]
    barrier_timeout_ms: Option<u64>,

    /// Report line format on stdout
    #[arg(long, value_enum, default_value = "csv")]
    format: Format,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut config = match &cli.scenario {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("Failed to load scenario {}", path.display()))?,
        None => SimulationConfig::reference(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(horizon_year) = cli.horizon_year {
        config.clock.horizon_year = horizon_year;
    }
    if cli.barrier_timeout_ms.is_some() {
        config.barrier_timeout_ms = cli.barrier_timeout_ms;
    }

    let out = BufWriter::new(io::stdout());
    let builder = Simulation::builder(config);
    let builder = match cli.format {
        Format::Csv => builder.with_sink(CsvSink::new(out)),
        Format::Json => builder.with_sink(JsonLinesSink::new(out)),
    };

    let summary = builder
        .build()
        .context("Invalid simulation parameters")?
        .run()?;
    info!(months = summary.months_reported, "Simulation completed");
    Ok(())
}
