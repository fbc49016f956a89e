//! drift-sim: synthetic data streams with configurable concept drift.
//!
//! The library half of the `drift-sim` binary:
//!
//! - [`generate`] - batch CSV generation and drift scenario sweeps
//! - [`controller`] - start/stop of streaming runs into a publisher
//! - [`server`] - HTTP routes over the controller
//! - [`publisher`] - stdout and Kafka publishers
//!
//! The simulation itself lives in the `sim-*` crates under `crates/`.

pub mod controller;
pub mod generate;
pub mod publisher;
pub mod server;

pub use controller::{
    synthetic_key, ControlError, ControllerStatus, GeneratorController, LastOutcome,
};
pub use generate::{generate_file, generate_scenarios, make_rng, scenario_file_name, ScenarioSweep};
pub use publisher::{StdoutPublisher, StdoutPublisherFactory};

#[cfg(feature = "kafka")]
pub use publisher::{KafkaPublisher, KafkaPublisherFactory};
