//! Record sink and publisher contracts.

use crate::error::SinkError;
use sim_core::Record;
use std::sync::Arc;

/// Destination for the records of a run.
///
/// Records arrive one at a time in tick order. The driver never calls
/// [`close`](RecordSink::close); whoever owns the sink does.
#[async_trait::async_trait]
pub trait RecordSink: Send {
    /// Write one record stamped with `time`.
    async fn write(&mut self, time: u64, record: &Record) -> Result<(), SinkError>;

    /// Flush and release the underlying resource.
    async fn close(&mut self) -> Result<(), SinkError>;
}

/// A keyed message stream (a Kafka topic, stdout, ...).
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `payload` under `key` on `topic`.
    async fn send(&self, key: &str, payload: &str, topic: &str) -> Result<(), SinkError>;

    /// Flush pending messages and drop the connection.
    async fn close(&self) -> Result<(), SinkError>;
}

/// Opens a fresh publisher connection for each run.
#[async_trait::async_trait]
pub trait PublisherFactory: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn Publisher>, SinkError>;
}

/// Stream payload for one record: `<time>,"<k=v, k=v, ...>"`.
pub fn stream_payload(time: u64, record: &Record) -> String {
    format!("{},\"{}\"", time, record.to_kv_string())
}

/// Adapts a [`Publisher`] to the [`RecordSink`] contract.
pub struct PublisherSink {
    publisher: Arc<dyn Publisher>,
    key: String,
    topic: String,
    closed: bool,
}

impl PublisherSink {
    pub fn new(publisher: Arc<dyn Publisher>, key: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            key: key.into(),
            topic: topic.into(),
            closed: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait::async_trait]
impl RecordSink for PublisherSink {
    async fn write(&mut self, time: u64, record: &Record) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        let payload = stream_payload(time, record);
        self.publisher.send(&self.key, &payload, &self.topic).await
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.publisher.close().await
    }
}
