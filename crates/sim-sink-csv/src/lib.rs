//! CSV file sink for drift-sim.
//!
//! Each record becomes one `time,value` row, where `value` is the record's
//! `k=v` serialization.
//!
//! # Example
//!
//! ```ignore
//! use sim_sink_csv::CsvFileSink;
//!
//! let mut sink = CsvFileSink::create("out/run.csv")?;
//! simulation.run(&mut rng, produce, &mut sink, &cancel).await?;
//! let metrics = sink.finish()?;
//! ```

pub mod args;
mod error;
mod writer;

pub use args::CsvOutputArgs;
pub use error::CsvSinkError;
pub use writer::{CsvFileSink, CsvSinkMetrics, DEFAULT_BUFFER_SIZE, HEADER};
