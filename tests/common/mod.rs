//! Shared helpers for the integration tests.

#![allow(dead_code)]

use sim_core::{Behavior, Configuration, Dimension, Measure};
use sim_driver::{Publisher, PublisherFactory, SinkError};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Collects every published message in memory.
#[derive(Default)]
pub struct MemoryPublisher {
    messages: Mutex<Vec<(String, String, String)>>,
    closes: AtomicUsize,
    fail_sends: bool,
}

impl MemoryPublisher {
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Default::default()
        }
    }

    pub fn messages(&self) -> Vec<(String, String, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Publisher for MemoryPublisher {
    async fn send(&self, key: &str, payload: &str, topic: &str) -> Result<(), SinkError> {
        if self.fail_sends {
            return Err(SinkError::Publish("broker unavailable".to_string()));
        }
        self.messages
            .lock()
            .unwrap()
            .push((key.to_string(), payload.to_string(), topic.to_string()));
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out the same publisher on every connect.
pub struct MemoryPublisherFactory {
    pub publisher: Arc<MemoryPublisher>,
    connects: AtomicUsize,
}

impl MemoryPublisherFactory {
    pub fn new(publisher: MemoryPublisher) -> Self {
        Self {
            publisher: Arc::new(publisher),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PublisherFactory for MemoryPublisherFactory {
    async fn connect(&self) -> Result<Arc<dyn Publisher>, SinkError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.publisher.clone())
    }
}

/// A single always-present dimension `x` with one value.
pub fn single_dimension_config(frequency: u64, duration: Option<u64>) -> Configuration {
    Configuration::new(
        vec![Dimension::new("x", Behavior::fixed(1.0, 1).unwrap())],
        vec![],
        frequency,
        vec![],
        duration,
        None,
    )
    .unwrap()
}

/// A few dimensions in a hierarchy plus a measure.
pub fn retail_config(frequency: u64, duration: Option<u64>) -> Configuration {
    Configuration::new(
        vec![
            Dimension::new("region", Behavior::fixed(1.0, 3).unwrap()),
            Dimension::new("store", Behavior::fixed(0.9, 5).unwrap()),
            Dimension::new("product", Behavior::appear(0.7, 0, 50, 8).unwrap()),
            Dimension::new("promo", Behavior::fixed(0.3, 2).unwrap()),
        ],
        vec![Measure::new("sales", 100.0, 20.0, 0.8).unwrap()],
        frequency,
        vec![vec!["region".to_string(), "store".to_string()]],
        duration,
        None,
    )
    .unwrap()
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition().await
}
