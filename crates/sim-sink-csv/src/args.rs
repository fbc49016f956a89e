//! CLI argument definitions for CSV output.

use clap::Args;
use std::path::PathBuf;

/// CSV output arguments.
#[derive(Args, Clone, Debug)]
pub struct CsvOutputArgs {
    /// Output CSV file (parent directories are created)
    #[arg(long, short = 'o')]
    pub output: PathBuf,
}
