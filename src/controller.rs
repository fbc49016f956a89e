//! Run controller for the streaming generator.
//!
//! At most one run is active. A run that ends on its own is reaped by the
//! next call to [`start_synthetic`](GeneratorController::start_synthetic),
//! [`start_real`](GeneratorController::start_real),
//! [`start_real_fading`](GeneratorController::start_real_fading),
//! [`stop`](GeneratorController::stop) or
//! [`status`](GeneratorController::status), which also closes its publisher.

use crate::generate::make_rng;
use serde::Serialize;
use sim_core::{ConfigError, Configuration, DataVariation};
use sim_driver::{
    now_millis, CancellationToken, DriverError, Publisher, PublisherFactory, PublisherSink,
    RunOutcome, Simulation, SinkError,
};
use sim_generator::{ColumnFade, FadingRealRecords, RealDataset, RealRecords, SyntheticRecords};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

/// Key of synthetic runs.
pub const SYNTHETIC_KEY: &str = "SYNTHETIC";

/// Time a stopping run gets to observe cancellation before it is aborted.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors returned by [`GeneratorController`].
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Generation is already running.")]
    AlreadyRunning,

    #[error("Generation is not running.")]
    NotRunning,

    #[error("Unknown dataset type '{0}'")]
    UnknownDataset(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid simulation: {0}")]
    Driver(#[from] DriverError),

    #[error("Publisher error: {0}")]
    Publisher(#[from] SinkError),
}

/// How the last run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum LastOutcome {
    Completed { ticks: u64 },
    Cancelled { ticks: u64 },
    /// Stopped by request but did not exit in time.
    Aborted,
    Failed { reason: String },
}

/// Snapshot returned by [`GeneratorController::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerStatus {
    pub running: bool,
    /// Publisher key of the active run
    pub key: Option<String>,
    pub last_outcome: Option<LastOutcome>,
}

type RunResult = Result<RunOutcome, DriverError>;

struct ActiveRun {
    key: String,
    cancel: CancellationToken,
    handle: JoinHandle<RunResult>,
    publisher: Arc<dyn Publisher>,
}

#[derive(Default)]
struct ControllerState {
    active: Option<ActiveRun>,
    last_outcome: Option<LastOutcome>,
}

/// Starts and stops streaming runs into a publisher.
pub struct GeneratorController {
    factory: Arc<dyn PublisherFactory>,
    base_config: Configuration,
    datasets: HashMap<String, Arc<RealDataset>>,
    topic: String,
    seed: Option<u64>,
    stop_timeout: Duration,
    state: Mutex<ControllerState>,
}

impl GeneratorController {
    pub fn new(
        factory: Arc<dyn PublisherFactory>,
        base_config: Configuration,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            factory,
            base_config,
            datasets: HashMap::new(),
            topic: topic.into(),
            seed: None,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            state: Mutex::new(ControllerState::default()),
        }
    }

    /// Register a replayable dataset under its upper-cased name.
    pub fn with_dataset(mut self, dataset: RealDataset) -> Self {
        self.datasets.insert(dataset.key(), Arc::new(dataset));
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether `name` (any case) names a registered dataset.
    pub fn has_dataset(&self, name: &str) -> bool {
        self.datasets.contains_key(&name.to_uppercase())
    }

    /// Start a synthetic run with drift cycles of `change_duration`.
    ///
    /// Returns the publisher key of the run.
    pub async fn start_synthetic(
        &self,
        impact: f64,
        extension: f64,
        change_duration: u64,
        frequency: u64,
    ) -> Result<String, ControlError> {
        let mut state = self.state.lock().await;
        reap(&mut state).await;
        if state.active.is_some() {
            return Err(ControlError::AlreadyRunning);
        }

        let variation = DataVariation::new(change_duration, change_duration, extension, impact)?;
        let config = self
            .base_config
            .with_data_variation(None)?
            .with_frequency(frequency)?
            .with_duration(None)
            .with_data_variation(Some(variation))?;
        let simulation = Simulation::paced(frequency, None)?;

        let key = synthetic_key(impact, extension);
        let mut records = SyntheticRecords::new(config);
        let run = self
            .launch(key, simulation, move |elapsed, rng| {
                records.next_record(elapsed, rng)
            })
            .await?;

        let key = run.key.clone();
        state.active = Some(run);
        Ok(key)
    }

    /// Start replaying the dataset registered as `name`.
    pub async fn start_real(&self, name: &str, frequency: u64) -> Result<String, ControlError> {
        self.start_replay(name, frequency, None).await
    }

    /// Start replaying `name` while the columns of `fade` fade out.
    pub async fn start_real_fading(
        &self,
        name: &str,
        frequency: u64,
        fade: ColumnFade,
    ) -> Result<String, ControlError> {
        self.start_replay(name, frequency, Some(fade)).await
    }

    async fn start_replay(
        &self,
        name: &str,
        frequency: u64,
        fade: Option<ColumnFade>,
    ) -> Result<String, ControlError> {
        let mut state = self.state.lock().await;
        reap(&mut state).await;
        if state.active.is_some() {
            return Err(ControlError::AlreadyRunning);
        }

        let dataset = self
            .datasets
            .get(&name.to_uppercase())
            .cloned()
            .ok_or_else(|| ControlError::UnknownDataset(name.to_string()))?;
        let simulation = Simulation::paced(frequency, None)?;

        let key = dataset.key();
        let run = match fade {
            Some(fade) => {
                info!("Fading columns {:?} of '{}'", fade.columns(), key);
                let mut replay = FadingRealRecords::new(dataset, fade);
                self.launch(key, simulation, move |elapsed, rng| {
                    replay.next_record(elapsed, rng)
                })
                .await?
            }
            None => {
                let mut replay = RealRecords::new(dataset);
                self.launch(key, simulation, move |_, _| replay.next_record())
                    .await?
            }
        };

        let key = run.key.clone();
        state.active = Some(run);
        Ok(key)
    }

    async fn launch<P>(
        &self,
        key: String,
        simulation: Simulation,
        produce: P,
    ) -> Result<ActiveRun, ControlError>
    where
        P: FnMut(u64, &mut rand::rngs::StdRng) -> sim_core::Record + Send + 'static,
    {
        let publisher = self.factory.connect().await?;
        let cancel = CancellationToken::new();

        let mut sink = PublisherSink::new(publisher.clone(), key.clone(), self.topic.clone());
        let task_cancel = cancel.clone();
        let mut rng = make_rng(self.seed);
        let simulation = simulation.with_start_marker(now_millis());

        info!(
            "Starting run '{}' on topic '{}' every {}ms",
            key,
            self.topic,
            simulation.frequency()
        );

        let handle = tokio::spawn(async move {
            simulation
                .run(&mut rng, produce, &mut sink, &task_cancel)
                .await
        });

        Ok(ActiveRun {
            key,
            cancel,
            handle,
            publisher,
        })
    }

    /// Stop the active run and close its publisher.
    pub async fn stop(&self) -> Result<LastOutcome, ControlError> {
        let mut state = self.state.lock().await;
        reap(&mut state).await;
        let Some(mut run) = state.active.take() else {
            return Err(ControlError::NotRunning);
        };

        info!("Stopping run '{}'", run.key);
        run.cancel.cancel();

        let outcome = match tokio::time::timeout(self.stop_timeout, &mut run.handle).await {
            Ok(joined) => outcome_of(&run.key, joined),
            Err(_) => {
                warn!(
                    "Run '{}' did not stop within {:?}, aborting",
                    run.key, self.stop_timeout
                );
                run.handle.abort();
                LastOutcome::Aborted
            }
        };

        close_publisher(&run.key, run.publisher.as_ref()).await;
        state.last_outcome = Some(outcome.clone());
        Ok(outcome)
    }

    /// Current state, after reaping a run that has ended.
    pub async fn status(&self) -> ControllerStatus {
        let mut state = self.state.lock().await;
        reap(&mut state).await;
        ControllerStatus {
            running: state.active.is_some(),
            key: state.active.as_ref().map(|run| run.key.clone()),
            last_outcome: state.last_outcome.clone(),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.status().await.running
    }
}

/// Collect the outcome of a run that ended on its own.
async fn reap(state: &mut ControllerState) {
    let finished = state
        .active
        .as_ref()
        .is_some_and(|run| run.handle.is_finished());
    if !finished {
        return;
    }
    let Some(run) = state.active.take() else {
        return;
    };

    let outcome = outcome_of(&run.key, run.handle.await);
    close_publisher(&run.key, run.publisher.as_ref()).await;
    state.last_outcome = Some(outcome);
}

/// Publisher key: `SYNTHETIC`, or `SYNTHETIC_<impact>_<extension>` when
/// either drift parameter is non-zero.
pub fn synthetic_key(impact: f64, extension: f64) -> String {
    if impact != 0.0 || extension != 0.0 {
        format!("{SYNTHETIC_KEY}_{impact:?}_{extension:?}")
    } else {
        SYNTHETIC_KEY.to_string()
    }
}

fn outcome_of(key: &str, joined: Result<RunResult, JoinError>) -> LastOutcome {
    match joined {
        Ok(Ok(RunOutcome::Completed { ticks })) => {
            info!("Run '{}' completed after {} records", key, ticks);
            LastOutcome::Completed { ticks }
        }
        Ok(Ok(RunOutcome::Cancelled { ticks })) => {
            info!("Run '{}' cancelled after {} records", key, ticks);
            LastOutcome::Cancelled { ticks }
        }
        Ok(Err(e)) => {
            error!("Run '{}' failed: {}", key, e);
            LastOutcome::Failed {
                reason: e.to_string(),
            }
        }
        Err(e) => {
            error!("Run '{}' task failed: {}", key, e);
            LastOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

async fn close_publisher(key: &str, publisher: &dyn Publisher) {
    if let Err(e) = publisher.close().await {
        warn!("Failed to close publisher of run '{}': {}", key, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_key() {
        assert_eq!(synthetic_key(0.0, 0.0), "SYNTHETIC");
        assert_eq!(synthetic_key(0.5, 0.0), "SYNTHETIC_0.5_0.0");
        assert_eq!(synthetic_key(0.2, 0.8), "SYNTHETIC_0.2_0.8");
    }
}
