//! Error types for the simulation driver and its sinks.

use thiserror::Error;

/// Errors raised by a record sink or a publisher.
#[derive(Error, Debug)]
pub enum SinkError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Write to the underlying medium failed.
    #[error("Write error: {0}")]
    Write(String),

    /// Publishing to a stream failed.
    #[error("Publish error: {0}")]
    Publish(String),

    /// Sink used after close.
    #[error("Sink is closed")]
    Closed,
}

/// Errors raised by [`Simulation`](crate::Simulation).
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Frequency must be greater than zero")]
    InvalidFrequency,

    #[error("Batch runs require a duration")]
    MissingDuration,

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}
