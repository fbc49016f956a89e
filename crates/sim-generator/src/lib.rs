//! Record generation for drift-sim.
//!
//! - [`SyntheticRecords`] samples records from a [`sim_core::Configuration`],
//!   applying [`DriftController`] cycles when the configuration carries a
//!   data variation.
//! - [`RealRecords`] replays a [`RealDataset`] loaded from CSV.
//! - [`FadingRealRecords`] replays a dataset while selected columns fade out.
//!
//! All randomness comes from a caller-supplied [`rand::Rng`], so a seeded
//! generator reproduces the same record stream.

pub mod drift;
pub mod fade;
pub mod real;
pub mod synthesizer;

pub use drift::{admissible_transitions, DriftController, DriftError, Transition};
pub use fade::{ColumnFade, FadeError, FadingRealRecords, MIN_FADE_PROBABILITY};
pub use real::{RealDataset, RealDatasetError, RealRecords, DEFAULT_ROW_LIMIT};
pub use synthesizer::SyntheticRecords;
