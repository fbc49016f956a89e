//! Time-ramp behaviors for dimensions and measures.
//!
//! A [`Behavior`] describes how the presence probability and the cardinality
//! of an attribute evolve with the elapsed simulation time. Every time-varying
//! variant reuses the single [`ramp`] function; decreasing variants call it
//! with `reverse = true` and their endpoints swapped so that the formula's
//! `end` is always the value held before the change.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Error Types
// ============================================================================

/// Error type for behavior validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BehaviorError {
    /// Probability outside of `[0, 1]` (or not a finite number)
    #[error("The probability must be between 0 and 1, got {0}")]
    ProbabilityOutOfRange(f64),

    /// Probability endpoints do not match the direction of the behavior
    #[error("{kind}: starting probability {from} and wanted probability {to} are not monotonic in the behavior's direction")]
    ProbabilityDirection {
        kind: BehaviorKind,
        from: f64,
        to: f64,
    },

    /// Cardinality endpoints do not match the direction of the behavior
    #[error("{kind}: starting values {from} and wanted values {to} are not monotonic in the behavior's direction")]
    ValuesDirection {
        kind: BehaviorKind,
        from: u32,
        to: u32,
    },
}

// ============================================================================
// Ramp algebra
// ============================================================================

/// A quantity that can follow a ramp.
///
/// Probabilities stay fractional, cardinalities are rounded to the nearest
/// integer (ties to even).
pub trait RampValue: Copy + PartialEq {
    /// `self` scaled by `factor` (in `[0, 1]`).
    fn scale(self, factor: f64) -> Self;
}

impl RampValue for f64 {
    fn scale(self, factor: f64) -> Self {
        self * factor
    }
}

impl RampValue for u32 {
    fn scale(self, factor: f64) -> Self {
        (f64::from(self) * factor)
            .round_ties_even()
            .clamp(0.0, f64::from(u32::MAX)) as u32
    }
}

/// Value of a ramp at `elapsed`.
///
/// Without `reverse` the quantity holds `start` up to `delay`, then follows
/// `end * f` with `f` growing from 0 to 1 until `settle_at`, and holds `end`
/// afterwards. With `reverse` it holds `end` up to `delay`, follows
/// `end * (1 - f)` and holds `start` from `settle_at` on.
///
/// Inside the window the value is scaled from `end` alone, so a non-zero
/// `start` is not a lower bound there.
pub fn ramp<T: RampValue>(
    end: T,
    start: T,
    delay: u64,
    settle_at: u64,
    elapsed: u64,
    reverse: bool,
) -> T {
    if end == start {
        return end;
    }
    if elapsed <= delay {
        return if reverse { end } else { start };
    }

    let effective = elapsed - delay;
    let span = settle_at.saturating_sub(delay);

    if effective < span {
        let progress = effective as f64 / span as f64;
        let factor = if reverse { 1.0 - progress } else { progress };
        end.scale(factor)
    } else if reverse {
        start
    } else {
        end
    }
}

// ============================================================================
// Behavior
// ============================================================================

/// Discriminant of a [`Behavior`], without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BehaviorKind {
    Fixed,
    Appear,
    Disappear,
    IncreaseProbability,
    DecreaseProbability,
    IncreaseValues,
    DecreaseValues,
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BehaviorKind::Fixed => "Fixed",
            BehaviorKind::Appear => "Appear",
            BehaviorKind::Disappear => "Disappear",
            BehaviorKind::IncreaseProbability => "IncreaseProbability",
            BehaviorKind::DecreaseProbability => "DecreaseProbability",
            BehaviorKind::IncreaseValues => "IncreaseValues",
            BehaviorKind::DecreaseValues => "DecreaseValues",
        };
        f.write_str(name)
    }
}

/// How an attribute's probability and cardinality evolve over time.
///
/// Behaviors are immutable snapshots. The serialized form is internally
/// tagged with `type` and uses the field names of the configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Behavior {
    /// Constant probability and cardinality. Measures carry no cardinality.
    Fixed {
        probability: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        values: Option<u32>,
    },

    /// Probability ramps from 0 to `probability` between `delay` and `settle_at`.
    Appear {
        probability: f64,
        #[serde(rename = "behaviorDelay")]
        delay: u64,
        #[serde(rename = "settlingDelay")]
        settle_at: u64,
        values: u32,
    },

    /// Probability ramps from `probability` to 0 between `delay` and `settle_at`.
    Disappear {
        probability: f64,
        #[serde(rename = "behaviorDelay")]
        delay: u64,
        #[serde(rename = "settlingDelay")]
        settle_at: u64,
        values: u32,
    },

    /// Probability ramps up from `from` to `to`.
    IncreaseProbability {
        #[serde(rename = "startingProbability")]
        from: f64,
        #[serde(rename = "wantedProbability")]
        to: f64,
        #[serde(rename = "behaviorDelay")]
        delay: u64,
        #[serde(rename = "settlingDelay")]
        settle_at: u64,
        values: u32,
    },

    /// Probability ramps down from `from` to `to`.
    DecreaseProbability {
        #[serde(rename = "startingProbability")]
        from: f64,
        #[serde(rename = "wantedProbability")]
        to: f64,
        #[serde(rename = "behaviorDelay")]
        delay: u64,
        #[serde(rename = "settlingDelay")]
        settle_at: u64,
        values: u32,
    },

    /// Cardinality ramps up from `from` to `to`.
    IncreaseValues {
        probability: f64,
        #[serde(rename = "behaviorDelay")]
        delay: u64,
        #[serde(rename = "settlingDelay")]
        settle_at: u64,
        #[serde(rename = "startingValues")]
        from: u32,
        #[serde(rename = "wantedValues")]
        to: u32,
    },

    /// Cardinality ramps down from `from` to `to`.
    DecreaseValues {
        probability: f64,
        #[serde(rename = "behaviorDelay")]
        delay: u64,
        #[serde(rename = "settlingDelay")]
        settle_at: u64,
        #[serde(rename = "startingValues")]
        from: u32,
        #[serde(rename = "wantedValues")]
        to: u32,
    },
}

impl Behavior {
    /// Constant behavior for a dimension.
    pub fn fixed(probability: f64, values: u32) -> Result<Self, BehaviorError> {
        Self::Fixed {
            probability,
            values: Some(values),
        }
        .validated()
    }

    /// Constant behavior for a measure (no cardinality).
    pub fn fixed_probability(probability: f64) -> Result<Self, BehaviorError> {
        Self::Fixed {
            probability,
            values: None,
        }
        .validated()
    }

    pub fn appear(
        probability: f64,
        delay: u64,
        settle_at: u64,
        values: u32,
    ) -> Result<Self, BehaviorError> {
        Self::Appear {
            probability,
            delay,
            settle_at,
            values,
        }
        .validated()
    }

    pub fn disappear(
        probability: f64,
        delay: u64,
        settle_at: u64,
        values: u32,
    ) -> Result<Self, BehaviorError> {
        Self::Disappear {
            probability,
            delay,
            settle_at,
            values,
        }
        .validated()
    }

    pub fn increase_probability(
        from: f64,
        to: f64,
        delay: u64,
        settle_at: u64,
        values: u32,
    ) -> Result<Self, BehaviorError> {
        Self::IncreaseProbability {
            from,
            to,
            delay,
            settle_at,
            values,
        }
        .validated()
    }

    pub fn decrease_probability(
        from: f64,
        to: f64,
        delay: u64,
        settle_at: u64,
        values: u32,
    ) -> Result<Self, BehaviorError> {
        Self::DecreaseProbability {
            from,
            to,
            delay,
            settle_at,
            values,
        }
        .validated()
    }

    pub fn increase_values(
        probability: f64,
        delay: u64,
        settle_at: u64,
        from: u32,
        to: u32,
    ) -> Result<Self, BehaviorError> {
        Self::IncreaseValues {
            probability,
            delay,
            settle_at,
            from,
            to,
        }
        .validated()
    }

    pub fn decrease_values(
        probability: f64,
        delay: u64,
        settle_at: u64,
        from: u32,
        to: u32,
    ) -> Result<Self, BehaviorError> {
        Self::DecreaseValues {
            probability,
            delay,
            settle_at,
            from,
            to,
        }
        .validated()
    }

    fn validated(self) -> Result<Self, BehaviorError> {
        self.validate()?;
        Ok(self)
    }

    /// The variant of this behavior.
    pub fn kind(&self) -> BehaviorKind {
        match self {
            Behavior::Fixed { .. } => BehaviorKind::Fixed,
            Behavior::Appear { .. } => BehaviorKind::Appear,
            Behavior::Disappear { .. } => BehaviorKind::Disappear,
            Behavior::IncreaseProbability { .. } => BehaviorKind::IncreaseProbability,
            Behavior::DecreaseProbability { .. } => BehaviorKind::DecreaseProbability,
            Behavior::IncreaseValues { .. } => BehaviorKind::IncreaseValues,
            Behavior::DecreaseValues { .. } => BehaviorKind::DecreaseValues,
        }
    }

    /// Check the construction invariants: probabilities in `[0, 1]` and
    /// endpoints monotonic in the direction named by the variant.
    pub fn validate(&self) -> Result<(), BehaviorError> {
        let kind = self.kind();
        match *self {
            Behavior::Fixed { probability, .. }
            | Behavior::Appear { probability, .. }
            | Behavior::Disappear { probability, .. } => check_probability(probability),
            Behavior::IncreaseProbability { from, to, .. } => {
                check_probability(from)?;
                check_probability(to)?;
                if from > to {
                    return Err(BehaviorError::ProbabilityDirection { kind, from, to });
                }
                Ok(())
            }
            Behavior::DecreaseProbability { from, to, .. } => {
                check_probability(from)?;
                check_probability(to)?;
                if from < to {
                    return Err(BehaviorError::ProbabilityDirection { kind, from, to });
                }
                Ok(())
            }
            Behavior::IncreaseValues {
                probability,
                from,
                to,
                ..
            } => {
                check_probability(probability)?;
                if from > to {
                    return Err(BehaviorError::ValuesDirection { kind, from, to });
                }
                Ok(())
            }
            Behavior::DecreaseValues {
                probability,
                from,
                to,
                ..
            } => {
                check_probability(probability)?;
                if from < to {
                    return Err(BehaviorError::ValuesDirection { kind, from, to });
                }
                Ok(())
            }
        }
    }

    /// Presence probability at `elapsed`.
    pub fn probability_at(&self, elapsed: u64) -> f64 {
        match *self {
            Behavior::Fixed { probability, .. } => probability,
            Behavior::Appear {
                probability,
                delay,
                settle_at,
                ..
            } => ramp(probability, 0.0, delay, settle_at, elapsed, false),
            Behavior::Disappear {
                probability,
                delay,
                settle_at,
                ..
            } => ramp(probability, 0.0, delay, settle_at, elapsed, true),
            Behavior::IncreaseProbability {
                from,
                to,
                delay,
                settle_at,
                ..
            } => ramp(to, from, delay, settle_at, elapsed, false),
            Behavior::DecreaseProbability {
                from,
                to,
                delay,
                settle_at,
                ..
            } => ramp(from, to, delay, settle_at, elapsed, true),
            Behavior::IncreaseValues { probability, .. }
            | Behavior::DecreaseValues { probability, .. } => probability,
        }
    }

    /// Cardinality at `elapsed`, or `None` for a measure's fixed behavior.
    pub fn values_at(&self, elapsed: u64) -> Option<u32> {
        match *self {
            Behavior::Fixed { values, .. } => values,
            Behavior::Appear { values, .. }
            | Behavior::Disappear { values, .. }
            | Behavior::IncreaseProbability { values, .. }
            | Behavior::DecreaseProbability { values, .. } => Some(values),
            Behavior::IncreaseValues {
                delay,
                settle_at,
                from,
                to,
                ..
            } => Some(ramp(to, from, delay, settle_at, elapsed, false)),
            Behavior::DecreaseValues {
                delay,
                settle_at,
                from,
                to,
                ..
            } => Some(ramp(from, to, delay, settle_at, elapsed, true)),
        }
    }
}

fn check_probability(probability: f64) -> Result<(), BehaviorError> {
    if (0.0..=1.0).contains(&probability) {
        Ok(())
    } else {
        Err(BehaviorError::ProbabilityOutOfRange(probability))
    }
}
