//! Simulation driver for drift-sim.
//!
//! [`Simulation`] pulls one record per tick from a producer closure and
//! pushes it into a [`RecordSink`]. Batch runs advance logical time only;
//! paced runs sleep between ticks and can run until cancelled.
//!
//! # Example
//!
//! ```ignore
//! use sim_driver::Simulation;
//! use tokio_util::sync::CancellationToken;
//!
//! let simulation = Simulation::batch(10, Some(1000))?;
//! let outcome = simulation
//!     .run(&mut rng, |t, rng| records.next_record(t, rng), &mut sink, &CancellationToken::new())
//!     .await?;
//! ```

mod error;
pub mod simulation;
pub mod sink;

pub use error::{DriverError, SinkError};
pub use simulation::{now_millis, Mode, RunOutcome, Simulation};
pub use sink::{stream_payload, Publisher, PublisherFactory, PublisherSink, RecordSink};

// Re-exported so callers share the driver's token type
pub use tokio_util::sync::CancellationToken;
