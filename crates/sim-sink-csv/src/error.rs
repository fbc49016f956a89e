//! Error types for the CSV sink.

use sim_driver::SinkError;
use thiserror::Error;

/// Errors that can occur while writing a CSV output file.
#[derive(Error, Debug)]
pub enum CsvSinkError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Write attempted after the file was closed.
    #[error("CSV file '{0}' is already closed")]
    Closed(String),
}

impl From<CsvSinkError> for SinkError {
    fn from(err: CsvSinkError) -> Self {
        match err {
            CsvSinkError::Io(e) => SinkError::Io(e),
            CsvSinkError::Closed(_) => SinkError::Closed,
            other => SinkError::Write(other.to_string()),
        }
    }
}
