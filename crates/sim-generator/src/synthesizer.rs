//! Synthetic record generation.

use crate::drift::DriftController;
use rand::Rng;
use rand_distr::StandardNormal;
use sim_core::{AttributeValue, Configuration, Record};
use tracing::warn;

/// Per-dimension draw for one tick.
#[derive(Debug, Clone, Copy)]
struct Draw {
    present: bool,
    /// Zero-based label index; `None` when the dimension has no values
    index: Option<u32>,
}

/// Produces one record per tick from a [`Configuration`].
///
/// The synthesizer owns its configuration: drift cycles replace the
/// dimension list wholesale before the tick is sampled.
#[derive(Debug, Clone)]
pub struct SyntheticRecords {
    config: Configuration,
    drift: Option<DriftController>,
    /// For each dimension, the positions of its hierarchy chain up to and
    /// including itself, when it is a non-root hierarchy member
    chains: Vec<Option<Vec<usize>>>,
}

impl SyntheticRecords {
    pub fn new(config: Configuration) -> Self {
        let drift = config.data_variation().copied().map(DriftController::new);
        let chains = hierarchy_chains(&config);
        Self {
            config,
            drift,
            chains,
        }
    }

    /// Current configuration, including the latest drifted dimensions.
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Generate the record for `elapsed`.
    pub fn next_record<R: Rng + ?Sized>(&mut self, elapsed: u64, rng: &mut R) -> Record {
        self.apply_drift(elapsed, rng);

        let dimensions = self.config.dimensions();
        let draws: Vec<Draw> = dimensions
            .iter()
            .map(|dimension| {
                let probability = dimension.behavior.probability_at(elapsed).clamp(0.0, 1.0);
                let values = dimension.behavior.values_at(elapsed).unwrap_or(0);
                let present = rng.gen_bool(probability);
                let index = (values > 0).then(|| rng.gen_range(0..values));
                Draw { present, index }
            })
            .collect();

        let mut record = Record::with_capacity(dimensions.len() + self.config.measures().len());

        for (position, dimension) in dimensions.iter().enumerate() {
            let draw = draws[position];
            let value = if !draw.present {
                None
            } else {
                match &self.chains[position] {
                    Some(chain) => chain
                        .iter()
                        .map(|&member| {
                            draws[member]
                                .index
                                .map(|index| label(&dimensions[member].name, index))
                        })
                        .collect::<Option<Vec<_>>>()
                        .map(|labels| labels.join("-")),
                    None => draw.index.map(|index| label(&dimension.name, index)),
                }
            };
            record.insert(dimension.name.clone(), value.map(AttributeValue::Text));
        }

        for measure in self.config.measures() {
            let probability = measure.behavior.probability_at(elapsed).clamp(0.0, 1.0);
            let value = rng.gen_bool(probability).then(|| {
                let z: f64 = rng.sample(StandardNormal);
                AttributeValue::Float(measure.mean + measure.std_dev * z)
            });
            record.insert(measure.name.clone(), value);
        }

        record
    }

    fn apply_drift<R: Rng + ?Sized>(&mut self, elapsed: u64, rng: &mut R) {
        let Some(drift) = self.drift else {
            return;
        };
        if !drift.is_active_at(elapsed) {
            return;
        }
        let dimensions = drift.apply(elapsed, self.config.dimensions(), rng);
        if let Err(e) = self.config.replace_dimensions(dimensions) {
            warn!("Discarding drifted dimensions at {}: {}", elapsed, e);
        }
    }
}

fn label(name: &str, index: u32) -> String {
    format!("{}-{}", name, u64::from(index) + 1)
}

/// Resolve, for every dimension, the chain of the first hierarchy in which it
/// appears at a position other than the first.
fn hierarchy_chains(config: &Configuration) -> Vec<Option<Vec<usize>>> {
    let dimensions = config.dimensions();
    let position_of = |name: &str| dimensions.iter().position(|d| d.name == name);

    dimensions
        .iter()
        .map(|dimension| {
            let hierarchy = config.hierarchies().iter().find(|hierarchy| {
                hierarchy
                    .iter()
                    .position(|member| *member == dimension.name)
                    .is_some_and(|at| at != 0)
            })?;
            let at = hierarchy.iter().position(|member| *member == dimension.name)?;
            hierarchy[..=at]
                .iter()
                .map(|member| position_of(member))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use sim_core::{Behavior, DataVariation, Dimension, Measure};

    fn fixed_dimension(name: &str, probability: f64, values: u32) -> Dimension {
        Dimension::new(name, Behavior::fixed(probability, values).unwrap())
    }

    fn text(record: &Record, name: &str) -> String {
        match record.get(name) {
            Some(AttributeValue::Text(value)) => value.clone(),
            other => panic!("Expected text for {name}, got {other:?}"),
        }
    }

    #[test]
    fn test_single_fixed_dimension() {
        let config = Configuration::new(
            vec![fixed_dimension("x", 1.0, 1)],
            vec![],
            10,
            vec![],
            Some(100),
            None,
        )
        .unwrap();
        let mut synth = SyntheticRecords::new(config);
        let mut rng = StdRng::seed_from_u64(42);

        for t in 0..10 {
            let record = synth.next_record(t * 10, &mut rng);
            assert_eq!(record.len(), 1);
            assert_eq!(text(&record, "x"), "x-1");
        }
    }

    #[test]
    fn test_absent_dimension_is_explicit() {
        let config = Configuration::new(
            vec![fixed_dimension("gone", 0.0, 3)],
            vec![Measure::new("m", 5.0, 1.0, 0.0).unwrap()],
            10,
            vec![],
            None,
            None,
        )
        .unwrap();
        let mut synth = SyntheticRecords::new(config);
        let mut rng = StdRng::seed_from_u64(42);

        let record = synth.next_record(0, &mut rng);
        assert!(record.is_absent("gone"));
        assert!(record.is_absent("m"));
        assert_eq!(record.to_kv_string(), "gone=null, m=null");
    }

    #[test]
    fn test_labels_within_cardinality() {
        let config = Configuration::new(
            vec![fixed_dimension("d", 1.0, 4)],
            vec![],
            10,
            vec![],
            None,
            None,
        )
        .unwrap();
        let mut synth = SyntheticRecords::new(config);
        let mut rng = StdRng::seed_from_u64(9);

        let allowed = ["d-1", "d-2", "d-3", "d-4"];
        for t in 0..200 {
            let record = synth.next_record(t * 10, &mut rng);
            let value = text(&record, "d");
            assert!(allowed.contains(&value.as_str()), "unexpected {value}");
        }
    }

    #[test]
    fn test_hierarchy_composition() {
        let config = Configuration::new(
            vec![
                fixed_dimension("A", 1.0, 5),
                fixed_dimension("B", 1.0, 5),
                fixed_dimension("C", 1.0, 5),
            ],
            vec![],
            10,
            vec![vec!["A".to_string(), "B".to_string(), "C".to_string()]],
            None,
            None,
        )
        .unwrap();
        let mut synth = SyntheticRecords::new(config);
        let mut rng = StdRng::seed_from_u64(5);

        for t in 0..50 {
            let record = synth.next_record(t * 10, &mut rng);
            let a = text(&record, "A");
            let b = text(&record, "B");
            let c = text(&record, "C");

            assert!(a.starts_with("A-") && a.split('-').count() == 2, "{a}");
            assert!(b.starts_with(&format!("{a}-B-")), "{b}");
            assert!(c.starts_with(&format!("{b}-C-")), "{c}");
            assert_eq!(c.split('-').count(), 6);
        }
    }

    #[test]
    fn test_hierarchy_member_absent_regardless_of_ancestors() {
        let config = Configuration::new(
            vec![fixed_dimension("A", 1.0, 2), fixed_dimension("B", 0.0, 2)],
            vec![],
            10,
            vec![vec!["A".to_string(), "B".to_string()]],
            None,
            None,
        )
        .unwrap();
        let mut synth = SyntheticRecords::new(config);
        let mut rng = StdRng::seed_from_u64(5);

        let record = synth.next_record(0, &mut rng);
        assert!(record.get("A").is_some());
        assert!(record.is_absent("B"));
    }

    #[test]
    fn test_ancestor_label_used_even_when_ancestor_absent() {
        let config = Configuration::new(
            vec![fixed_dimension("A", 0.0, 1), fixed_dimension("B", 1.0, 1)],
            vec![],
            10,
            vec![vec!["A".to_string(), "B".to_string()]],
            None,
            None,
        )
        .unwrap();
        let mut synth = SyntheticRecords::new(config);
        let mut rng = StdRng::seed_from_u64(5);

        let record = synth.next_record(0, &mut rng);
        assert!(record.is_absent("A"));
        assert_eq!(text(&record, "B"), "A-1-B-1");
    }

    #[test]
    fn test_zero_cardinality_is_absent() {
        let config = Configuration::new(
            vec![fixed_dimension("empty", 1.0, 0)],
            vec![],
            10,
            vec![],
            None,
            None,
        )
        .unwrap();
        let mut synth = SyntheticRecords::new(config);
        let mut rng = StdRng::seed_from_u64(5);

        assert!(synth.next_record(0, &mut rng).is_absent("empty"));
    }

    #[test]
    fn test_measure_sampling() {
        let config = Configuration::new(
            vec![],
            vec![
                Measure::new("constant", 7.5, 0.0, 1.0).unwrap(),
                Measure::new("noisy", 100.0, 10.0, 1.0).unwrap(),
            ],
            10,
            vec![],
            None,
            None,
        )
        .unwrap();
        let mut synth = SyntheticRecords::new(config);
        let mut rng = StdRng::seed_from_u64(11);

        let mut sum = 0.0;
        for t in 0..500 {
            let record = synth.next_record(t, &mut rng);
            assert_eq!(record.get("constant"), Some(&AttributeValue::Float(7.5)));
            match record.get("noisy") {
                Some(AttributeValue::Float(value)) => sum += value,
                other => panic!("Expected float, got {other:?}"),
            }
        }
        let mean = sum / 500.0;
        assert!((mean - 100.0).abs() < 3.0, "sample mean {mean}");
    }

    #[test]
    fn test_drift_replaces_dimensions() {
        let config = Configuration::new(
            vec![
                fixed_dimension("a", 0.5, 4),
                fixed_dimension("b", 0.5, 4),
                fixed_dimension("c", 0.5, 4),
                fixed_dimension("d", 0.5, 4),
            ],
            vec![],
            10,
            vec![],
            None,
            Some(DataVariation::new(20, 20, 0.5, 0.5).unwrap()),
        )
        .unwrap();
        let before_drift = config.dimensions().to_vec();
        let mut synth = SyntheticRecords::new(config);
        let mut rng = StdRng::seed_from_u64(3);

        synth.next_record(0, &mut rng);
        synth.next_record(10, &mut rng);
        assert_eq!(synth.configuration().dimensions(), before_drift.as_slice());

        synth.next_record(20, &mut rng);
        let changed = synth
            .configuration()
            .dimensions()
            .iter()
            .zip(&before_drift)
            .filter(|(now, before)| now != before)
            .count();
        assert_eq!(changed, 2);
    }

    #[test]
    fn test_deterministic_with_seed() {
        let config = Configuration::new(
            vec![fixed_dimension("a", 0.5, 10), fixed_dimension("b", 0.3, 3)],
            vec![Measure::new("m", 1.0, 2.0, 0.5).unwrap()],
            10,
            vec![],
            None,
            Some(DataVariation::new(0, 50, 1.0, 0.4).unwrap()),
        )
        .unwrap();

        let mut first = SyntheticRecords::new(config.clone());
        let mut second = SyntheticRecords::new(config);
        let mut rng1 = StdRng::seed_from_u64(99);
        let mut rng2 = StdRng::seed_from_u64(99);

        for t in 0..100 {
            assert_eq!(
                first.next_record(t * 10, &mut rng1),
                second.next_record(t * 10, &mut rng2)
            );
        }
    }
}
