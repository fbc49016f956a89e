//! Induced disappearance of columns in a replayed dataset.
//!
//! A [`FadingRealRecords`] replays a [`RealDataset`] untouched during a
//! warm-up window while it observes how often each faded column is present.
//! From the first cycle boundary after the window on, every faded column
//! gets a [`Behavior::Disappear`] ramp that starts at the column's current
//! presence probability (at least [`MIN_FADE_PROBABILITY`]) and reaches zero
//! after two cycles. The ramp restarts at every cycle boundary.

use crate::real::{RealDataset, RealRecords};
use rand::Rng;
use sim_core::{Behavior, Record};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Probability a faded column restarts from when it had already vanished.
pub const MIN_FADE_PROBABILITY: f64 = 0.1;

/// Error type for fade settings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FadeError {
    #[error("Fade cycle length must be > 0")]
    ZeroSlide,

    #[error("No columns to fade")]
    NoColumns,
}

/// Which columns fade, and when.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFade {
    columns: Vec<String>,
    window: u64,
    slide: u64,
}

impl ColumnFade {
    /// `window` is the untouched warm-up, `slide` the cycle length, both in
    /// milliseconds.
    pub fn new(columns: Vec<String>, window: u64, slide: u64) -> Result<Self, FadeError> {
        if slide == 0 {
            return Err(FadeError::ZeroSlide);
        }
        if columns.is_empty() {
            return Err(FadeError::NoColumns);
        }
        Ok(Self {
            columns,
            window,
            slide,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn window(&self) -> u64 {
        self.window
    }

    pub fn slide(&self) -> u64 {
        self.slide
    }

    /// Whether a fade cycle starts at `elapsed`.
    pub fn is_cycle_at(&self, elapsed: u64) -> bool {
        elapsed >= self.window && elapsed % self.slide == 0
    }
}

#[derive(Debug, Clone, Default)]
struct ColumnStats {
    present: usize,
    distinct: HashSet<String>,
}

/// Replays a dataset while fading selected columns.
#[derive(Debug, Clone)]
pub struct FadingRealRecords {
    replay: RealRecords,
    fade: ColumnFade,
    observed: usize,
    stats: HashMap<String, ColumnStats>,
    behaviors: Vec<(String, Behavior)>,
    cycle_start: u64,
}

impl FadingRealRecords {
    pub fn new(dataset: Arc<RealDataset>, fade: ColumnFade) -> Self {
        Self {
            replay: RealRecords::new(dataset),
            fade,
            observed: 0,
            stats: HashMap::new(),
            behaviors: Vec::new(),
            cycle_start: 0,
        }
    }

    pub fn fade(&self) -> &ColumnFade {
        &self.fade
    }

    /// Current behaviors of the faded columns; empty before the first cycle.
    pub fn behaviors(&self) -> &[(String, Behavior)] {
        &self.behaviors
    }

    /// Next replayed record at `elapsed`.
    ///
    /// A faded column the record carries is kept with the probability of its
    /// ramp and set absent otherwise.
    pub fn next_record<R: Rng + ?Sized>(&mut self, elapsed: u64, rng: &mut R) -> Record {
        let mut record = self.replay.next_record();
        if elapsed < self.fade.window {
            self.observe(&record);
            return record;
        }

        if self.fade.is_cycle_at(elapsed) {
            self.start_cycle(elapsed);
        }

        let since = elapsed - self.cycle_start;
        for (column, behavior) in &self.behaviors {
            if record.get(column).is_none() {
                continue;
            }
            let probability = behavior.probability_at(since).clamp(0.0, 1.0);
            if !rng.gen_bool(probability) {
                record.insert(column.clone(), None);
            }
        }
        record
    }

    fn observe(&mut self, record: &Record) {
        self.observed += 1;
        for column in &self.fade.columns {
            if let Some(value) = record.get(column) {
                let stats = self.stats.entry(column.clone()).or_default();
                stats.present += 1;
                stats.distinct.insert(value.to_string());
            }
        }
    }

    fn start_cycle(&mut self, elapsed: u64) {
        let since = elapsed - self.cycle_start;
        let settle_at = self.fade.slide.saturating_mul(2);

        let mut behaviors = Vec::with_capacity(self.fade.columns.len());
        for column in &self.fade.columns {
            let (probability, values) = match self.current(column) {
                Some(behavior) => (
                    behavior.probability_at(since),
                    behavior.values_at(since).unwrap_or(0),
                ),
                None => self.warm_up_state(column),
            };
            let start = probability.max(MIN_FADE_PROBABILITY).min(1.0);
            match Behavior::disappear(start, 0, settle_at, values) {
                Ok(behavior) => behaviors.push((column.clone(), behavior)),
                Err(e) => warn!("Cannot fade column '{}': {}", column, e),
            }
        }

        debug!("Fade cycle at {} over {} columns", elapsed, behaviors.len());
        self.behaviors = behaviors;
        self.cycle_start = elapsed;
    }

    fn current(&self, column: &str) -> Option<&Behavior> {
        self.behaviors
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, behavior)| behavior)
    }

    /// Presence fraction and distinct values seen during the warm-up.
    fn warm_up_state(&self, column: &str) -> (f64, u32) {
        let Some(stats) = self.stats.get(column) else {
            return (0.0, 0);
        };
        let probability = if self.observed == 0 {
            0.0
        } else {
            stats.present as f64 / self.observed as f64
        };
        let values = u32::try_from(stats.distinct.len()).unwrap_or(u32::MAX);
        (probability, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use sim_core::AttributeValue;

    const SAMPLE: &str = "\
id,location,status
1,north,ok
2,south,ok
3,,ok
4,east,ok
";

    fn dataset() -> Arc<RealDataset> {
        let dataset = RealDataset::from_reader("sample", SAMPLE.as_bytes(), &HashSet::new(), 100);
        Arc::new(dataset.unwrap())
    }

    fn fade(window: u64, slide: u64) -> ColumnFade {
        ColumnFade::new(vec!["location".to_string()], window, slide).unwrap()
    }

    #[test]
    fn test_fade_settings_validated() {
        assert_eq!(
            ColumnFade::new(vec!["location".to_string()], 10, 0),
            Err(FadeError::ZeroSlide)
        );
        assert_eq!(ColumnFade::new(Vec::new(), 10, 5), Err(FadeError::NoColumns));
    }

    #[test]
    fn test_cycle_boundaries() {
        let fade = fade(20, 10);
        assert!(!fade.is_cycle_at(10));
        assert!(fade.is_cycle_at(20));
        assert!(!fade.is_cycle_at(25));
        assert!(fade.is_cycle_at(30));
    }

    #[test]
    fn test_warm_up_is_untouched() {
        let mut fading = FadingRealRecords::new(dataset(), fade(1_000, 10));
        let mut replay = RealRecords::new(dataset());
        let mut rng = StdRng::seed_from_u64(5);

        for t in 0..8 {
            assert_eq!(fading.next_record(t, &mut rng), replay.next_record());
        }
        assert!(fading.behaviors().is_empty());
    }

    #[test]
    fn test_first_cycle_starts_from_observed_presence() {
        let mut fading = FadingRealRecords::new(dataset(), fade(4, 2));
        let mut rng = StdRng::seed_from_u64(5);

        // 3 of the 4 warm-up rows carry a location, with 3 distinct values
        for t in 0..4 {
            fading.next_record(t, &mut rng);
        }
        assert!(fading.behaviors().is_empty());

        fading.next_record(4, &mut rng);
        assert_eq!(
            fading.behaviors(),
            &[(
                "location".to_string(),
                Behavior::Disappear {
                    probability: 0.75,
                    delay: 0,
                    settle_at: 4,
                    values: 3,
                }
            )]
        );
    }

    #[test]
    fn test_each_cycle_restarts_from_current_probability() {
        let mut fading = FadingRealRecords::new(dataset(), fade(4, 2));
        let mut rng = StdRng::seed_from_u64(9);

        let mut starts = Vec::new();
        for t in 0..=10 {
            fading.next_record(t, &mut rng);
            if fading.fade().is_cycle_at(t) {
                starts.push(fading.behaviors()[0].1.probability_at(0));
            }
        }
        // halfway down a two-cycle ramp at every boundary, floored at the end
        assert_eq!(starts, vec![0.75, 0.375, 0.1875, MIN_FADE_PROBABILITY]);
        assert_eq!(fading.behaviors()[0].1.values_at(0), Some(3));
    }

    #[test]
    fn test_faded_column_is_mostly_absent() {
        let mut fading = FadingRealRecords::new(dataset(), fade(0, 1_000));
        let mut rng = StdRng::seed_from_u64(11);

        let mut kept = 0;
        let mut absent = 0;
        for t in 0..900 {
            let record = fading.next_record(t, &mut rng);
            if record.get("location").is_some() {
                kept += 1;
            } else if record.is_absent("location") {
                absent += 1;
            }
            assert!(record.contains("id"));
        }
        assert!(kept < 200, "kept {kept}");
        assert!(absent > 400, "absent {absent}");
    }

    #[test]
    fn test_restart_floor_and_other_columns_kept() {
        let mut fading = FadingRealRecords::new(dataset(), fade(0, 5));
        let mut rng = StdRng::seed_from_u64(1);

        // no warm-up, so the ramp starts at the floor
        let record = fading.next_record(0, &mut rng);
        assert_eq!(
            fading.behaviors()[0].1.probability_at(0),
            MIN_FADE_PROBABILITY
        );
        assert_eq!(record.get("status"), Some(&AttributeValue::from("ok")));
        assert_eq!(record.get("id"), Some(&AttributeValue::Integer(1)));
    }
}
