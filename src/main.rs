//! Command-line interface for drift-sim
//!
//! # Usage Examples
//!
//! ## Batch Generation
//! ```bash
//! # One CSV file from a configuration with a duration
//! drift-sim generate --config simulation.yaml --output out/run.csv --seed 42
//! ```
//!
//! ## Drift Scenarios
//! ```bash
//! # One file per (impact, extension) pair
//! drift-sim scenarios --config simulation.yaml --output-dir out/scenarios \
//!   --ranges 0.2,0.5,0.8 --slide 60000 --window 120000 --duration 3600000
//! ```
//!
//! ## Streaming Server
//! ```bash
//! # Publish to stdout, control over HTTP
//! drift-sim serve --config simulation.yaml --listen 0.0.0.0:8080
//!
//! # Publish to Kafka (needs the `kafka` feature) with a replayable dataset
//! KAFKA_BROKERS=localhost:9092 drift-sim serve --config simulation.yaml \
//!   --dataset bitbang=data/bitbang.csv --exclude timestamp
//!
//! curl 'http://localhost:8080/generator?type=synthetic&frequency=100&impact=0.5&extension=0.2&changeDuration=10000'
//! curl 'http://localhost:8080/stop'
//! ```

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use drift_sim::{
    generate_file, generate_scenarios, server, GeneratorController, ScenarioSweep,
    StdoutPublisherFactory,
};
use sim_core::Configuration;
use sim_driver::PublisherFactory;
use sim_generator::{RealDataset, DEFAULT_ROW_LIMIT};
use sim_sink_csv::CsvOutputArgs;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "drift-sim")]
#[command(about = "A synthetic data stream generator with configurable concept drift")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one CSV file from a configuration
    Generate {
        #[command(flatten)]
        config: ConfigArgs,

        #[command(flatten)]
        output: CsvOutputArgs,
    },

    /// Generate one CSV file per drift impact/extension pair
    Scenarios(ScenarioArgs),

    /// Stream records to a publisher, controlled over HTTP
    Serve(ServeArgs),
}

/// Configuration file and random seed.
#[derive(Args, Clone, Debug)]
struct ConfigArgs {
    /// Simulation configuration (YAML)
    #[arg(long, short = 'c')]
    config: PathBuf,

    /// Random seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Clone, Debug)]
struct ScenarioArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Output directory (one file per scenario)
    #[arg(long)]
    output_dir: PathBuf,

    /// Values swept for both impact and extension
    #[arg(long, value_delimiter = ',', default_value = "0.2,0.5,0.8")]
    ranges: Vec<f64>,

    /// Drift cycle length in milliseconds
    #[arg(long)]
    slide: u64,

    /// Warm-up before the first drift cycle in milliseconds
    #[arg(long)]
    window: u64,

    /// Duration of each scenario in milliseconds
    #[arg(long)]
    duration: u64,
}

#[derive(Args, Clone, Debug)]
struct ServeArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Address of the HTTP control surface
    #[arg(long, env = "DRIFT_SIM_LISTEN", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Topic records are published to
    #[arg(long, env = "DRIFT_SIM_TOPIC", default_value = "drift-sim")]
    topic: String,

    /// Kafka brokers; records go to stdout when unset
    #[arg(long, env = "KAFKA_BROKERS")]
    brokers: Option<String>,

    /// Replayable dataset (format: name=path/to/file.csv)
    #[arg(long = "dataset", value_name = "NAME=PATH")]
    datasets: Vec<String>,

    /// Columns dropped from every dataset
    #[arg(long = "exclude", value_name = "COLUMN")]
    excluded: Vec<String>,

    /// Rows loaded per dataset
    #[arg(long, default_value_t = DEFAULT_ROW_LIMIT)]
    row_limit: usize,
}

fn load_config(args: &ConfigArgs) -> anyhow::Result<Configuration> {
    Configuration::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {:?}", args.config))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { config, output } => {
            let configuration = load_config(&config)?;
            tracing::info!(
                "Generating {} dimensions and {} measures into {:?} (seed={:?})",
                configuration.dimensions().len(),
                configuration.measures().len(),
                output.output,
                config.seed
            );
            let metrics = generate_file(&configuration, &output.output, config.seed).await?;
            tracing::info!(
                "Wrote {} rows ({} bytes) in {:?}",
                metrics.rows_written,
                metrics.file_size_bytes,
                metrics.total_duration
            );
        }
        Commands::Scenarios(args) => {
            let configuration = load_config(&args.config)?;
            let sweep = ScenarioSweep {
                ranges: args.ranges,
                slide: args.slide,
                window: args.window,
                duration: args.duration,
            };
            let written =
                generate_scenarios(&configuration, &args.output_dir, &sweep, args.config.seed)
                    .await?;
            tracing::info!(
                "Wrote {} scenario files to {:?}",
                written.len(),
                args.output_dir
            );
        }
        Commands::Serve(args) => run_serve(args).await?,
    }

    Ok(())
}

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let configuration = load_config(&args.config)?;
    let factory = publisher_factory(args.brokers.as_deref())?;

    let excluded: HashSet<String> = args.excluded.into_iter().collect();
    let mut controller = GeneratorController::new(factory, configuration, args.topic)
        .with_seed(args.config.seed);

    for entry in &args.datasets {
        let (name, path) = entry
            .split_once('=')
            .with_context(|| format!("Invalid dataset '{entry}', expected NAME=PATH"))?;
        let dataset = RealDataset::from_csv_path(name, path, &excluded, args.row_limit)
            .with_context(|| format!("Failed to load dataset '{name}' from {path}"))?;
        controller = controller.with_dataset(dataset);
    }

    server::serve(&args.listen, Arc::new(controller)).await
}

#[cfg(feature = "kafka")]
fn publisher_factory(brokers: Option<&str>) -> anyhow::Result<Arc<dyn PublisherFactory>> {
    let factory: Arc<dyn PublisherFactory> = match brokers {
        Some(brokers) => Arc::new(drift_sim::KafkaPublisherFactory::new(brokers)),
        None => Arc::new(StdoutPublisherFactory),
    };
    Ok(factory)
}

#[cfg(not(feature = "kafka"))]
fn publisher_factory(brokers: Option<&str>) -> anyhow::Result<Arc<dyn PublisherFactory>> {
    if brokers.is_some() {
        anyhow::bail!("Kafka brokers given but drift-sim was built without the `kafka` feature");
    }
    Ok(Arc::new(StdoutPublisherFactory))
}
