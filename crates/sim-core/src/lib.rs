//! Core types for the drift-sim framework.
//!
//! This crate provides the foundational types shared by the generator, the
//! simulation driver and the sinks:
//!
//! - [`Behavior`] - Time-ramp rules for probability and cardinality
//! - [`Configuration`] - Validated simulation configuration loaded from YAML
//! - [`DataVariation`] - Drift parameters
//! - [`Record`] - One generated record, serialized as `k=v` pairs
//!
//! # Architecture
//!
//! ```text
//! sim-core (this crate)
//!    │
//!    ├─── sim-generator   (drift controller, record synthesizer, replay)
//!    ├─── sim-driver      (simulation loop, sink contracts)
//!    └─── sim-sink-csv    (time,value CSV files)
//! ```
//!
//! # Example
//!
//! ```rust
//! use sim_core::Behavior;
//!
//! let behavior = Behavior::appear(0.6, 0, 10, 3).unwrap();
//! assert_eq!(behavior.probability_at(5), 0.3);
//! ```

pub mod behavior;
pub mod config;
pub mod record;

// Re-exports for convenience
pub use behavior::{ramp, Behavior, BehaviorError, BehaviorKind, RampValue};
pub use config::{ConfigError, Configuration, DataVariation, Dimension, Measure};
pub use record::{AttributeValue, Record};
