//! Stream publishers.
//!
//! [`StdoutPublisher`] is always available. [`KafkaPublisher`] needs the
//! `kafka` feature (it links librdkafka).

use sim_driver::{Publisher, PublisherFactory, SinkError};
use std::io::Write;
use std::sync::Arc;

/// Prints one `<topic> <key> <payload>` line per message.
#[derive(Debug, Default)]
pub struct StdoutPublisher;

#[async_trait::async_trait]
impl Publisher for StdoutPublisher {
    async fn send(&self, key: &str, payload: &str, topic: &str) -> Result<(), SinkError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{topic} {key} {payload}")?;
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        std::io::stdout().lock().flush()?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct StdoutPublisherFactory;

#[async_trait::async_trait]
impl PublisherFactory for StdoutPublisherFactory {
    async fn connect(&self) -> Result<Arc<dyn Publisher>, SinkError> {
        Ok(Arc::new(StdoutPublisher))
    }
}

#[cfg(feature = "kafka")]
pub use kafka::{KafkaPublisher, KafkaPublisherFactory};

#[cfg(feature = "kafka")]
mod kafka {
    use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
    use rdkafka::ClientConfig;
    use sim_driver::{Publisher, PublisherFactory, SinkError};
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::info;

    /// Delivery timeout for a single message.
    const SEND_TIMEOUT: Duration = Duration::from_secs(30);

    /// Upper bound on flushing queued messages at close.
    const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

    /// Publishes string-keyed, string-valued messages to Kafka.
    pub struct KafkaPublisher {
        producer: FutureProducer,
    }

    impl KafkaPublisher {
        pub fn new(brokers: &str) -> Result<Self, SinkError> {
            let producer: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", brokers)
                .set("message.timeout.ms", "30000")
                .create()
                .map_err(|e| SinkError::Publish(e.to_string()))?;
            info!("Connected Kafka producer to {}", brokers);
            Ok(Self { producer })
        }
    }

    #[async_trait::async_trait]
    impl Publisher for KafkaPublisher {
        async fn send(&self, key: &str, payload: &str, topic: &str) -> Result<(), SinkError> {
            let record = FutureRecord::to(topic).key(key).payload(payload);
            self.producer
                .send(record, SEND_TIMEOUT)
                .await
                .map_err(|(err, _)| SinkError::Publish(err.to_string()))?;
            Ok(())
        }

        async fn close(&self) -> Result<(), SinkError> {
            let producer = self.producer.clone();
            tokio::task::spawn_blocking(move || producer.flush(FLUSH_TIMEOUT))
                .await
                .map_err(|e| SinkError::Publish(e.to_string()))?
                .map_err(|e| SinkError::Publish(e.to_string()))
        }
    }

    /// Opens a new producer per run.
    pub struct KafkaPublisherFactory {
        brokers: String,
    }

    impl KafkaPublisherFactory {
        pub fn new(brokers: impl Into<String>) -> Self {
            Self {
                brokers: brokers.into(),
            }
        }
    }

    #[async_trait::async_trait]
    impl PublisherFactory for KafkaPublisherFactory {
        async fn connect(&self) -> Result<Arc<dyn Publisher>, SinkError> {
            Ok(Arc::new(KafkaPublisher::new(&self.brokers)?))
        }
    }
}
