//! Replay of a reference dataset loaded from CSV.

use csv::ReaderBuilder;
use sim_core::{AttributeValue, Record};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Rows loaded when no explicit limit is given.
pub const DEFAULT_ROW_LIMIT: usize = 10_000;

/// Error type for dataset loading.
#[derive(Debug, thiserror::Error)]
pub enum RealDatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Dataset '{0}' contains no rows")]
    EmptyDataset(String),
}

/// An in-memory reference dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct RealDataset {
    name: String,
    records: Vec<Record>,
}

impl RealDataset {
    /// Load the first `limit` rows of a CSV file.
    pub fn from_csv_path<P: AsRef<Path>>(
        name: impl Into<String>,
        path: P,
        excluded: &HashSet<String>,
        limit: usize,
    ) -> Result<Self, RealDatasetError> {
        let file = File::open(path.as_ref())?;
        let dataset = Self::from_reader(name, file, excluded, limit)?;
        info!(
            "Loaded {} rows of dataset '{}' from {}",
            dataset.len(),
            dataset.name,
            path.as_ref().display()
        );
        Ok(dataset)
    }

    /// Load the first `limit` rows from any CSV source with a header row.
    pub fn from_reader<R: Read>(
        name: impl Into<String>,
        reader: R,
        excluded: &HashSet<String>,
        limit: usize,
    ) -> Result<Self, RealDatasetError> {
        let name = name.into();
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);

        let headers = reader.headers()?.clone();
        let columns: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(_, header)| !header.ends_with("[*]") && !excluded.contains(*header))
            .map(|(i, header)| (i, header.to_string()))
            .collect();

        let mut records = Vec::new();
        for row in reader.records().take(limit) {
            let row = row?;
            let record: Record = columns
                .iter()
                .filter_map(|(i, header)| {
                    let cell = row.get(*i)?;
                    parse_cell(cell).map(|value| (header.clone(), Some(value)))
                })
                .collect();
            records.push(record);
        }

        if records.is_empty() {
            return Err(RealDatasetError::EmptyDataset(name));
        }
        Ok(Self { name, records })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key used when publishing records of this dataset.
    pub fn key(&self) -> String {
        self.name.to_uppercase()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Clean and type one cell; `None` drops it from the record.
fn parse_cell(cell: &str) -> Option<AttributeValue> {
    let cell = cell.trim();
    if cell.is_empty() || cell == "null" || (cell.starts_with('[') && cell.ends_with(']')) {
        return None;
    }
    let cleaned = cell.replace(',', "_").replace('=', ":");
    if let Ok(value) = cleaned.parse::<i64>() {
        return Some(AttributeValue::Integer(value));
    }
    if let Ok(value) = cleaned.parse::<f64>() {
        return Some(AttributeValue::Float(value));
    }
    Some(AttributeValue::Text(cleaned))
}

/// Cycles through a dataset, one record per tick.
#[derive(Debug, Clone)]
pub struct RealRecords {
    dataset: Arc<RealDataset>,
    position: usize,
}

impl RealRecords {
    pub fn new(dataset: Arc<RealDataset>) -> Self {
        Self {
            dataset,
            position: 0,
        }
    }

    pub fn dataset(&self) -> &RealDataset {
        &self.dataset
    }

    /// Next record in file order, wrapping to the first after the last.
    pub fn next_record(&mut self) -> Record {
        let records = self.dataset.records();
        let record = records[self.position % records.len()].clone();
        self.position = (self.position + 1) % records.len();
        record
    }
}
