//! Random data variation (concept drift).
//!
//! At every cycle boundary the [`DriftController`] picks a random subset of
//! dimensions and gives each of them a new behavior. The new behavior starts
//! from the dimension's current probability and cardinality, moves one of
//! them by `impact`, starts immediately and settles at the end of the cycle.

use rand::seq::index;
use rand::seq::SliceRandom;
use rand::Rng;
use sim_core::{Behavior, BehaviorError, DataVariation, Dimension};
use tracing::{debug, warn};

/// Minimum cardinality a drifted dimension can reach.
pub const MIN_DRIFT_VALUES: u32 = 1;

/// Probability bounds used when drifting presence probability.
pub const PROBABILITY_BOUNDS: (f64, f64) = (0.0, 1.0);

/// Error type for drift operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DriftError {
    /// Bounds passed to the endpoint functions are not admissible
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    /// The drawn behavior cannot be built from the current state
    #[error("Cannot build drifted behavior: {0}")]
    Behavior(#[from] BehaviorError),
}

/// Kind of reassignment a drift cycle can draw for a dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    IncreaseProbability,
    Appear,
    FixedHigherProbability,
    DecreaseProbability,
    Disappear,
    FixedLowerProbability,
    IncreaseValues,
    FixedMoreValues,
    DecreaseValues,
    FixedFewerValues,
}

const INCREASE_PROBABILITY: [Transition; 3] = [
    Transition::IncreaseProbability,
    Transition::Appear,
    Transition::FixedHigherProbability,
];

const DECREASE_PROBABILITY: [Transition; 3] = [
    Transition::DecreaseProbability,
    Transition::Disappear,
    Transition::FixedLowerProbability,
];

const INCREASE_VALUES: [Transition; 2] = [Transition::IncreaseValues, Transition::FixedMoreValues];

const DECREASE_VALUES: [Transition; 2] = [Transition::DecreaseValues, Transition::FixedFewerValues];

/// Transitions allowed from a dimension currently at `probability` with
/// `values` distinct labels.
pub fn admissible_transitions(probability: f64, values: u32) -> Vec<Transition> {
    let groups: Vec<&[Transition]> = if values == 1 && probability == 1.0 {
        vec![&INCREASE_VALUES[..], &DECREASE_PROBABILITY[..]]
    } else if probability == 0.0 {
        vec![&INCREASE_PROBABILITY[..]]
    } else if probability == 1.0 {
        vec![
            &DECREASE_PROBABILITY[..],
            &INCREASE_VALUES[..],
            &DECREASE_VALUES[..],
        ]
    } else if values == 1 {
        vec![
            &INCREASE_VALUES[..],
            &DECREASE_PROBABILITY[..],
            &INCREASE_PROBABILITY[..],
        ]
    } else {
        vec![
            &INCREASE_PROBABILITY[..],
            &DECREASE_PROBABILITY[..],
            &INCREASE_VALUES[..],
            &DECREASE_VALUES[..],
        ]
    };
    groups.iter().flat_map(|group| group.iter().copied()).collect()
}

/// Applies [`DataVariation`] cycles to a dimension list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftController {
    variation: DataVariation,
}

impl DriftController {
    pub fn new(variation: DataVariation) -> Self {
        Self { variation }
    }

    pub fn variation(&self) -> &DataVariation {
        &self.variation
    }

    /// Whether a drift cycle fires at `elapsed`.
    pub fn is_active_at(&self, elapsed: u64) -> bool {
        elapsed % self.variation.frequency == 0 && elapsed >= self.variation.delay
    }

    /// Number of dimensions re-randomized per cycle out of `total`.
    pub fn selection_size(&self, total: usize) -> usize {
        let size = (total as f64 * self.variation.extension).round_ties_even() as usize;
        size.min(total)
    }

    /// Return the dimension list after the drift cycle at `elapsed`.
    ///
    /// Outside a cycle boundary the list is returned unchanged. Otherwise
    /// [`selection_size`](Self::selection_size) dimensions, drawn uniformly
    /// without replacement, get a freshly drawn behavior.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        elapsed: u64,
        dimensions: &[Dimension],
        rng: &mut R,
    ) -> Vec<Dimension> {
        let mut updated = dimensions.to_vec();
        if !self.is_active_at(elapsed) {
            return updated;
        }

        let amount = self.selection_size(dimensions.len());
        for position in index::sample(rng, dimensions.len(), amount).into_vec() {
            let dimension = &dimensions[position];
            match self.reassign(dimension, elapsed, rng) {
                Ok(behavior) => {
                    debug!(
                        "Drift at {} on '{}': {:?} -> {:?}",
                        elapsed, dimension.name, dimension.behavior, behavior
                    );
                    updated[position] = Dimension::new(dimension.name.clone(), behavior);
                }
                Err(e) => {
                    warn!(
                        "Drift at {} kept behavior of '{}' unchanged: {}",
                        elapsed, dimension.name, e
                    );
                }
            }
        }
        updated
    }

    /// Draw and build a new behavior for `dimension` from its state at `elapsed`.
    fn reassign<R: Rng + ?Sized>(
        &self,
        dimension: &Dimension,
        elapsed: u64,
        rng: &mut R,
    ) -> Result<Behavior, DriftError> {
        let probability = dimension.behavior.probability_at(elapsed);
        let values = dimension.behavior.values_at(elapsed).unwrap_or(0);

        let transitions = admissible_transitions(probability, values);
        let transition = transitions
            .choose(rng)
            .copied()
            .unwrap_or(Transition::FixedHigherProbability);

        self.build(transition, probability, values)
    }

    /// Build the behavior for `transition` starting from the current state.
    pub fn build(
        &self,
        transition: Transition,
        probability: f64,
        values: u32,
    ) -> Result<Behavior, DriftError> {
        let (low, high) = PROBABILITY_BOUNDS;
        let delay = 0;
        let settle_at = self.variation.frequency;

        let behavior = match transition {
            Transition::FixedHigherProbability => {
                Behavior::fixed(self.next_probability(probability, true, low, high)?, values)?
            }
            Transition::FixedLowerProbability => {
                Behavior::fixed(self.next_probability(probability, false, low, high)?, values)?
            }
            Transition::FixedMoreValues => Behavior::fixed(
                probability,
                self.next_values(values, true, MIN_DRIFT_VALUES)?,
            )?,
            Transition::FixedFewerValues => Behavior::fixed(
                probability,
                self.next_values(values, false, MIN_DRIFT_VALUES)?,
            )?,
            Transition::Appear => Behavior::appear(
                self.next_probability(probability, true, low, high)?,
                delay,
                settle_at,
                values,
            )?,
            Transition::IncreaseProbability => Behavior::increase_probability(
                probability,
                self.next_probability(probability, true, low, high)?,
                delay,
                settle_at,
                values,
            )?,
            Transition::IncreaseValues => Behavior::increase_values(
                probability,
                delay,
                settle_at,
                values,
                self.next_values(values, true, MIN_DRIFT_VALUES)?,
            )?,
            Transition::Disappear => Behavior::disappear(
                self.next_probability(probability, false, low, high)?,
                delay,
                settle_at,
                values,
            )?,
            Transition::DecreaseProbability => Behavior::decrease_probability(
                probability,
                self.next_probability(probability, false, low, high)?,
                delay,
                settle_at,
                values,
            )?,
            Transition::DecreaseValues => Behavior::decrease_values(
                probability,
                delay,
                settle_at,
                values,
                self.next_values(values, false, MIN_DRIFT_VALUES)?,
            )?,
        };
        Ok(behavior)
    }

    /// Next probability endpoint, `impact` away from `current`.
    ///
    /// At the lower bound the multiplicative step would be zero, so the
    /// candidate is `impact` itself. The result is clamped into
    /// `[lower, upper]`.
    pub fn next_probability(
        &self,
        current: f64,
        increasing: bool,
        lower: f64,
        upper: f64,
    ) -> Result<f64, DriftError> {
        if lower < 0.0 {
            return Err(DriftError::InvalidBounds(format!(
                "probability lower bound must be >= 0, got {lower}"
            )));
        }
        if upper < lower {
            return Err(DriftError::InvalidBounds(format!(
                "probability upper bound {upper} must be >= lower bound {lower}"
            )));
        }

        let impact = self.variation.impact;
        let candidate = if current == lower {
            if increasing {
                impact
            } else {
                -impact
            }
        } else if increasing {
            current + current * impact
        } else {
            current - current * impact
        };
        Ok(candidate.clamp(lower, upper))
    }

    /// Next cardinality endpoint, `impact` away from `current`.
    ///
    /// A step that rounds back to `current` is forced to ±1. The result is
    /// clamped at `lower`, which must be [`MIN_DRIFT_VALUES`].
    pub fn next_values(&self, current: u32, increasing: bool, lower: u32) -> Result<u32, DriftError> {
        if lower != MIN_DRIFT_VALUES {
            return Err(DriftError::InvalidBounds(format!(
                "cardinality lower bound must be {MIN_DRIFT_VALUES}, got {lower}"
            )));
        }

        let current_f = f64::from(current);
        let step = current_f * self.variation.impact;
        let raw = if increasing {
            current_f + step
        } else {
            current_f - step
        };
        let mut candidate = raw.round_ties_even() as i64;
        if candidate == i64::from(current) {
            candidate += if increasing { 1 } else { -1 };
        }
        Ok(candidate.clamp(i64::from(lower), i64::from(u32::MAX)) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use sim_core::BehaviorKind;

    fn controller(delay: u64, frequency: u64, extension: f64, impact: f64) -> DriftController {
        DriftController::new(DataVariation::new(delay, frequency, extension, impact).unwrap())
    }

    fn dimensions(count: usize) -> Vec<Dimension> {
        (0..count)
            .map(|i| Dimension::new(format!("d{i}"), Behavior::fixed(0.5, 4).unwrap()))
            .collect()
    }

    fn changed(before: &[Dimension], after: &[Dimension]) -> usize {
        before.iter().zip(after).filter(|(b, a)| b != a).count()
    }

    #[test]
    fn test_cycle_eligibility() {
        let drift = controller(100, 50, 0.5, 0.5);
        assert!(!drift.is_active_at(0));
        assert!(!drift.is_active_at(50));
        assert!(drift.is_active_at(100));
        assert!(!drift.is_active_at(120));
        assert!(drift.is_active_at(150));
    }

    #[test]
    fn test_selects_exact_count_on_cycle() {
        // impact 0.5 from (0.5, 4) always changes the behavior
        let drift = controller(0, 10, 0.4, 0.5);
        let dims = dimensions(10);
        let mut rng = StdRng::seed_from_u64(7);

        for cycle in 0..20 {
            let after = drift.apply(cycle * 10, &dims, &mut rng);
            assert_eq!(changed(&dims, &after), 4);
            for (b, a) in dims.iter().zip(&after) {
                assert_eq!(b.name, a.name);
            }
        }
    }

    #[test]
    fn test_no_selection_off_cycle() {
        let drift = controller(0, 10, 1.0, 0.5);
        let dims = dimensions(5);
        let mut rng = StdRng::seed_from_u64(7);

        let after = drift.apply(15, &dims, &mut rng);
        assert_eq!(after, dims);
    }

    #[test]
    fn test_selection_size_rounds_ties_to_even() {
        let drift = controller(0, 10, 0.5, 0.5);
        assert_eq!(drift.selection_size(5), 2);
        assert_eq!(drift.selection_size(7), 4);
        assert_eq!(drift.selection_size(0), 0);
    }

    #[test]
    fn test_reassigned_behavior_timing() {
        let drift = controller(0, 40, 1.0, 0.5);
        let dims = dimensions(3);
        let mut rng = StdRng::seed_from_u64(1);

        for dimension in drift.apply(0, &dims, &mut rng) {
            match dimension.behavior {
                Behavior::Fixed { .. } => {}
                Behavior::Appear {
                    delay, settle_at, ..
                }
                | Behavior::Disappear {
                    delay, settle_at, ..
                }
                | Behavior::IncreaseProbability {
                    delay, settle_at, ..
                }
                | Behavior::DecreaseProbability {
                    delay, settle_at, ..
                }
                | Behavior::IncreaseValues {
                    delay, settle_at, ..
                }
                | Behavior::DecreaseValues {
                    delay, settle_at, ..
                } => {
                    assert_eq!(delay, 0);
                    assert_eq!(settle_at, 40);
                }
            }
        }
    }

    #[test]
    fn test_admissible_transitions_at_boundaries() {
        let saturated = admissible_transitions(1.0, 1);
        assert_eq!(saturated.len(), 5);
        assert!(saturated.contains(&Transition::IncreaseValues));
        assert!(saturated.contains(&Transition::Disappear));
        assert!(!saturated.contains(&Transition::DecreaseValues));

        let absent = admissible_transitions(0.0, 5);
        assert_eq!(absent, INCREASE_PROBABILITY.to_vec());

        let certain = admissible_transitions(1.0, 5);
        assert_eq!(certain.len(), 7);
        assert!(!certain.contains(&Transition::Appear));

        let single = admissible_transitions(0.5, 1);
        assert_eq!(single.len(), 8);
        assert!(!single.contains(&Transition::DecreaseValues));

        assert_eq!(admissible_transitions(0.5, 3).len(), 10);
    }

    #[test]
    fn test_absent_dimension_only_increases() {
        let drift = controller(0, 10, 1.0, 0.5);
        let dims = vec![Dimension::new("d", Behavior::fixed(0.0, 3).unwrap())];
        let mut rng = StdRng::seed_from_u64(3);

        for cycle in 0..30 {
            let after = drift.apply(cycle * 10, &dims, &mut rng);
            let kind = after[0].behavior.kind();
            assert!(
                matches!(
                    kind,
                    BehaviorKind::IncreaseProbability | BehaviorKind::Appear | BehaviorKind::Fixed
                ),
                "unexpected {kind}"
            );
            assert!(after[0].behavior.probability_at(10) > 0.0);
        }
    }

    #[test]
    fn test_next_values_impact() {
        let drift = controller(0, 10, 1.0, 0.5);
        assert_eq!(drift.next_values(4, true, MIN_DRIFT_VALUES), Ok(6));
        assert_eq!(drift.next_values(4, false, MIN_DRIFT_VALUES), Ok(2));
    }

    #[test]
    fn test_next_values_forces_minimum_step() {
        let drift = controller(0, 10, 1.0, 0.1);
        // 3 + 0.3 rounds back to 3
        assert_eq!(drift.next_values(3, true, MIN_DRIFT_VALUES), Ok(4));
        assert_eq!(drift.next_values(3, false, MIN_DRIFT_VALUES), Ok(2));
        // clamped at the lower bound
        assert_eq!(drift.next_values(1, false, MIN_DRIFT_VALUES), Ok(1));
    }

    #[test]
    fn test_next_values_rejects_other_bounds() {
        let drift = controller(0, 10, 1.0, 0.5);
        assert!(matches!(
            drift.next_values(4, true, 0),
            Err(DriftError::InvalidBounds(_))
        ));
    }

    #[test]
    fn test_next_probability() {
        let drift = controller(0, 10, 1.0, 0.5);
        assert_eq!(drift.next_probability(0.0, true, 0.0, 1.0), Ok(0.5));
        let up = drift.next_probability(0.4, true, 0.0, 1.0).unwrap();
        assert!((up - 0.6).abs() < 1e-12);
        let down = drift.next_probability(0.4, false, 0.0, 1.0).unwrap();
        assert!((down - 0.2).abs() < 1e-12);
        assert_eq!(drift.next_probability(0.8, true, 0.0, 1.0), Ok(1.0));
        assert_eq!(drift.next_probability(0.0, false, 0.0, 1.0), Ok(0.0));
        assert!(drift.next_probability(0.5, true, 0.5, 0.2).is_err());
        assert!(drift.next_probability(0.5, true, -0.1, 1.0).is_err());
    }

    #[test]
    fn test_zero_cardinality_decrease_keeps_behavior() {
        let drift = controller(0, 10, 1.0, 0.5);
        // raising 0 to the minimum would break the decrease direction
        assert!(drift.build(Transition::DecreaseValues, 0.5, 0).is_err());
        assert!(drift.build(Transition::IncreaseValues, 0.5, 0).is_ok());
    }
}
