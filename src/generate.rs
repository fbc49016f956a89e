//! Offline generation of CSV files.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sim_core::{Configuration, DataVariation};
use sim_driver::{now_millis, CancellationToken, RunOutcome, Simulation};
use sim_generator::SyntheticRecords;
use sim_sink_csv::{CsvFileSink, CsvSinkMetrics};
use std::path::{Path, PathBuf};
use tracing::info;

/// Seeded generator when `seed` is given, OS entropy otherwise.
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Run a batch simulation of `config` into a `time,value` CSV file.
pub async fn generate_file(
    config: &Configuration,
    output: &Path,
    seed: Option<u64>,
) -> Result<CsvSinkMetrics> {
    let simulation = Simulation::batch(config.frequency(), config.duration())
        .context("Batch generation needs a configuration with a duration")?
        .with_start_marker(now_millis());

    let mut records = SyntheticRecords::new(config.clone());
    let mut sink = CsvFileSink::create(output)
        .with_context(|| format!("Failed to create output file {}", output.display()))?;
    let mut rng = make_rng(seed);

    let outcome = simulation
        .run(
            &mut rng,
            |elapsed, rng| records.next_record(elapsed, rng),
            &mut sink,
            &CancellationToken::new(),
        )
        .await
        .with_context(|| format!("Simulation into {} failed", output.display()))?;

    let metrics = sink.finish()?;
    if let RunOutcome::Cancelled { ticks } = outcome {
        anyhow::bail!("Simulation was cancelled after {ticks} records");
    }
    Ok(metrics)
}

/// Drift sweep parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSweep {
    /// Values used for both impact and extension
    pub ranges: Vec<f64>,
    /// Drift cycle length
    pub slide: u64,
    /// Warm-up before the first drift cycle
    pub window: u64,
    pub duration: u64,
}

/// File name of the scenario with the given drift parameters.
pub fn scenario_file_name(impact: f64, extension: f64) -> String {
    format!("impact{impact:?}extension{extension:?}.csv")
}

/// Generate one file per `(extension, impact)` pair of the sweep.
pub async fn generate_scenarios(
    config: &Configuration,
    output_dir: &Path,
    sweep: &ScenarioSweep,
    seed: Option<u64>,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(sweep.ranges.len() * sweep.ranges.len());

    for &extension in &sweep.ranges {
        for &impact in &sweep.ranges {
            let variation = DataVariation::new(sweep.window, sweep.slide, extension, impact)
                .with_context(|| {
                    format!("Invalid drift parameters impact={impact}, extension={extension}")
                })?;
            let scenario = config
                .with_data_variation(Some(variation))?
                .with_duration(Some(sweep.duration));

            let path = output_dir.join(scenario_file_name(impact, extension));
            info!(
                "Generating scenario impact={} extension={} into {}",
                impact,
                extension,
                path.display()
            );
            generate_file(&scenario, &path, seed).await?;
            written.push(path);
        }
    }

    Ok(written)
}
