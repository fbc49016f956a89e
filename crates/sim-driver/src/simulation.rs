//! The simulation loop.

use crate::error::DriverError;
use crate::sink::RecordSink;
use rand::Rng;
use sim_core::Record;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How ticks advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Logical time only; runs as fast as the sink accepts records.
    Batch,
    /// Sleeps `frequency` milliseconds between ticks.
    Paced,
}

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The configured duration was reached.
    Completed { ticks: u64 },
    /// The run was stopped through its cancellation token.
    Cancelled { ticks: u64 },
}

impl RunOutcome {
    /// Number of records written before the run ended.
    pub fn ticks(&self) -> u64 {
        match self {
            RunOutcome::Completed { ticks } | RunOutcome::Cancelled { ticks } => *ticks,
        }
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Drives a record producer into a sink, one record per tick.
///
/// Elapsed time starts at zero and grows by `frequency` per tick. Each
/// record is stamped with `start_marker + elapsed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Simulation {
    mode: Mode,
    frequency: u64,
    duration: Option<u64>,
    start_marker: u64,
}

impl Simulation {
    /// A batch run; terminates when `elapsed >= duration`.
    pub fn batch(frequency: u64, duration: Option<u64>) -> Result<Self, DriverError> {
        let duration = duration.ok_or(DriverError::MissingDuration)?;
        Self::new(Mode::Batch, frequency, Some(duration))
    }

    /// A paced run; without a duration it runs until cancelled.
    pub fn paced(frequency: u64, duration: Option<u64>) -> Result<Self, DriverError> {
        Self::new(Mode::Paced, frequency, duration)
    }

    fn new(mode: Mode, frequency: u64, duration: Option<u64>) -> Result<Self, DriverError> {
        if frequency == 0 {
            return Err(DriverError::InvalidFrequency);
        }
        Ok(Self {
            mode,
            frequency,
            duration,
            start_marker: 0,
        })
    }

    /// Offset added to elapsed time when stamping records.
    pub fn with_start_marker(mut self, start_marker: u64) -> Self {
        self.start_marker = start_marker;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn duration(&self) -> Option<u64> {
        self.duration
    }

    /// Run until the duration is reached or `cancel` fires.
    ///
    /// Cancellation is observed before every tick and during the pacing
    /// sleep. A sink failure ends the run with an error; the sink is left
    /// open for the caller to close.
    pub async fn run<R, P, S>(
        &self,
        rng: &mut R,
        mut produce: P,
        sink: &mut S,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, DriverError>
    where
        R: Rng + ?Sized + Send,
        P: FnMut(u64, &mut R) -> Record + Send,
        S: RecordSink + ?Sized,
    {
        info!(
            "Starting {:?} simulation: frequency={}ms, duration={:?}",
            self.mode, self.frequency, self.duration
        );

        let mut elapsed = 0u64;
        let mut ticks = 0u64;

        let outcome = loop {
            if cancel.is_cancelled() {
                break RunOutcome::Cancelled { ticks };
            }
            if self.duration.is_some_and(|duration| elapsed >= duration) {
                break RunOutcome::Completed { ticks };
            }

            let record = produce(elapsed, rng);
            sink.write(self.start_marker + elapsed, &record).await?;
            ticks += 1;

            if ticks % 10000 == 0 {
                debug!("Written {} records", ticks);
            }

            elapsed += self.frequency;

            if self.mode == Mode::Paced {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        break RunOutcome::Cancelled { ticks };
                    }
                    _ = tokio::time::sleep(Duration::from_millis(self.frequency)) => {}
                }
            }
        };

        info!("Simulation finished: {:?}", outcome);
        Ok(outcome)
    }
}
