//! `time,value` CSV file sink.

use crate::error::CsvSinkError;
use csv::Writer;
use sim_core::Record;
use sim_driver::{RecordSink, SinkError};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default buffer size for CSV writing.
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Header row of every output file.
pub const HEADER: [&str; 2] = ["time", "value"];

/// Metrics from a finished output file.
#[derive(Debug, Clone, Default)]
pub struct CsvSinkMetrics {
    /// Number of rows written, excluding the header.
    pub rows_written: u64,
    /// Time from file creation to close.
    pub total_duration: Duration,
    /// Time spent serializing and writing rows.
    pub write_duration: Duration,
    /// Output file size in bytes.
    pub file_size_bytes: u64,
}

impl CsvSinkMetrics {
    /// Calculate rows per second.
    pub fn rows_per_second(&self) -> f64 {
        if self.total_duration.as_secs_f64() > 0.0 {
            self.rows_written as f64 / self.total_duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Writes one `time,value` row per record.
///
/// `value` is the record's `k=v` serialization, the same text the stream
/// publisher sends.
pub struct CsvFileSink {
    path: PathBuf,
    writer: Option<Writer<BufWriter<File>>>,
    started: Instant,
    metrics: CsvSinkMetrics,
}

impl CsvFileSink {
    /// Create (or truncate) `path` and write the header row.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, CsvSinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        info!("Writing records to '{}'", path.display());

        let file = File::create(&path)?;
        let buf_writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file);
        let mut writer = Writer::from_writer(buf_writer);
        writer.write_record(HEADER)?;

        Ok(Self {
            path,
            writer: Some(writer),
            started: Instant::now(),
            metrics: CsvSinkMetrics::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> u64 {
        self.metrics.rows_written
    }

    /// Append one row.
    pub fn write_row(&mut self, time: u64, record: &Record) -> Result<(), CsvSinkError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| CsvSinkError::Closed(self.path.display().to_string()))?;

        let write_start = Instant::now();
        writer.write_record([time.to_string(), record.to_kv_string()])?;
        self.metrics.write_duration += write_start.elapsed();
        self.metrics.rows_written += 1;

        if self.metrics.rows_written % 10000 == 0 {
            debug!("Written {} rows", self.metrics.rows_written);
        }
        Ok(())
    }

    fn close_writer(&mut self) -> Result<(), CsvSinkError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.flush()?;
        let inner = writer
            .into_inner()
            .map_err(|e| CsvSinkError::Io(std::io::Error::other(e.to_string())))?;
        drop(inner);

        self.metrics.file_size_bytes = std::fs::metadata(&self.path)?.len();
        self.metrics.total_duration = self.started.elapsed();
        Ok(())
    }

    /// Flush, close the file and report metrics.
    pub fn finish(mut self) -> Result<CsvSinkMetrics, CsvSinkError> {
        self.close_writer()?;

        info!(
            "CSV output complete: {} rows, {} bytes in {:?} ({:.2} rows/sec)",
            self.metrics.rows_written,
            self.metrics.file_size_bytes,
            self.metrics.total_duration,
            self.metrics.rows_per_second()
        );

        Ok(self.metrics)
    }
}

#[async_trait::async_trait]
impl RecordSink for CsvFileSink {
    async fn write(&mut self, time: u64, record: &Record) -> Result<(), SinkError> {
        Ok(self.write_row(time, record)?)
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        Ok(self.close_writer()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::AttributeValue;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn record(pairs: &[(&str, Option<&str>)]) -> Record {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.map(AttributeValue::from)))
            .collect()
    }

    #[test]
    fn test_header_and_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.csv");

        let mut sink = CsvFileSink::create(&path).unwrap();
        sink.write_row(0, &record(&[("x", Some("x-1"))])).unwrap();
        sink.write_row(10, &record(&[("x", Some("x-2")), ("y", None)]))
            .unwrap();
        let metrics = sink.finish().unwrap();

        assert_eq!(metrics.rows_written, 2);
        assert!(metrics.file_size_bytes > 0);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "time,value");
        assert_eq!(lines[1], "0,x=x-1");
        assert_eq!(lines[2], "10,\"x=x-2, y=null\"");
    }

    #[test]
    fn test_rows_read_back_with_csv_reader() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.csv");

        let mut sink = CsvFileSink::create(&path).unwrap();
        let written = record(&[("a", Some("a-1")), ("b", Some("b-3")), ("c", None)]);
        sink.write_row(20, &written).unwrap();
        sink.finish().unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "20");
        assert_eq!(&rows[0][1], "a=a-1, b=b-3, c=null");
    }

    #[test]
    fn test_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/deeper/out.csv");

        let sink = CsvFileSink::create(&path).unwrap();
        sink.finish().unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_write_after_close_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.csv");
        let mut sink = CsvFileSink::create(&path).unwrap();

        tokio_test::block_on(async {
            assert_ok!(RecordSink::write(&mut sink, 0, &record(&[("x", Some("x-1"))])).await);
            assert_ok!(RecordSink::close(&mut sink).await);
            assert_ok!(RecordSink::close(&mut sink).await);

            let error =
                assert_err!(RecordSink::write(&mut sink, 10, &record(&[("x", Some("x-1"))])).await);
            assert!(matches!(error, SinkError::Closed));
        });
        assert_eq!(sink.rows_written(), 1);
    }
}
