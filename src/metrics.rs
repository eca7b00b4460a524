//! Live typing metrics.
//!
//! WPM is always `CPM / 5`. CPM counts committed characters that are not
//! currently marked as mistakes. Accuracy is measured over every accepted
//! commit in the keystroke log, so characters later removed still count.
//! Consistency is `100 * (1 - cv)` of the keystroke inter-arrival times,
//! clamped to 0..=100.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::session::{Keystroke, Mistake};
use crate::util::coefficient_of_variation;

/// Characters per standard word
pub const CHARS_PER_WORD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveMetrics {
    pub wpm: f64,
    pub cpm: f64,
    pub accuracy: f64,
    pub consistency: f64,
}

impl LiveMetrics {
    /// Metrics before anything has been typed
    pub fn empty() -> Self {
        Self {
            wpm: 0.0,
            cpm: 0.0,
            accuracy: 100.0,
            consistency: 100.0,
        }
    }

    pub fn rounded(&self) -> Self {
        Self {
            wpm: self.wpm.round(),
            cpm: self.cpm.round(),
            accuracy: self.accuracy.round(),
            consistency: self.consistency.round(),
        }
    }
}

impl Default for LiveMetrics {
    fn default() -> Self {
        Self::empty()
    }
}

/// Counters the metrics are derived from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricCounts {
    /// Current committed input length
    pub committed: usize,
    /// Every accepted commit so far, including removed ones
    pub keystrokes: usize,
    /// Mistakes currently on record
    pub mistakes: usize,
}

/// Running mean/variance of inter-keystroke intervals (Welford)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RhythmStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RhythmStats {
    pub fn push(&mut self, interval_ms: f64) {
        self.count += 1;
        let delta = interval_ms - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (interval_ms - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).sqrt()
        }
    }

    pub fn consistency(&self) -> f64 {
        if self.count < 2 || self.mean <= 0.0 {
            return 100.0;
        }
        consistency_from_cv(self.std_dev() / self.mean)
    }
}

fn consistency_from_cv(cv: f64) -> f64 {
    (100.0 * (1.0 - cv)).clamp(0.0, 100.0)
}

/// Assemble metrics from counters; O(1), used on every accepted keystroke.
pub fn from_counts(counts: MetricCounts, elapsed_secs: f64, consistency: f64) -> LiveMetrics {
    let correct = counts.committed.saturating_sub(counts.mistakes) as f64;

    let cpm = if elapsed_secs > 0.0 {
        correct / (elapsed_secs / 60.0)
    } else {
        0.0
    };

    let accuracy = if counts.keystrokes == 0 {
        100.0
    } else {
        let total = counts.keystrokes as f64;
        let wrong = counts.mistakes.min(counts.keystrokes) as f64;
        ((total - wrong) / total * 100.0).clamp(0.0, 100.0)
    };

    LiveMetrics {
        wpm: cpm / CHARS_PER_WORD,
        cpm,
        accuracy,
        consistency,
    }
}

/// Recompute everything from the raw log.
///
/// Gives the same numbers as the incremental path in
/// [`SessionTracker::live_metrics`](crate::session::SessionTracker::live_metrics).
pub fn compute_metrics(
    keystrokes: &[Keystroke],
    mistakes: &BTreeMap<usize, Mistake>,
    committed_len: usize,
    elapsed_secs: f64,
) -> LiveMetrics {
    let intervals: Vec<f64> = keystrokes
        .iter()
        .filter_map(|k| k.interval_ms)
        .map(|ms| ms as f64)
        .collect();

    let consistency = if intervals.len() < 2 {
        100.0
    } else {
        coefficient_of_variation(&intervals).map_or(100.0, consistency_from_cv)
    };

    let counts = MetricCounts {
        committed: committed_len,
        keystrokes: keystrokes.len(),
        mistakes: mistakes.len(),
    };
    from_counts(counts, elapsed_secs, consistency)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(ch: char, at: u64, correct: bool, interval_ms: Option<u64>) -> Keystroke {
        Keystroke {
            ch,
            at,
            correct,
            interval_ms,
        }
    }

    #[test]
    fn test_zero_elapsed_is_zero_speed() {
        let m = from_counts(
            MetricCounts {
                committed: 10,
                keystrokes: 10,
                mistakes: 0,
            },
            0.0,
            100.0,
        );
        assert_eq!(m.cpm, 0.0);
        assert_eq!(m.wpm, 0.0);
        assert_eq!(m.accuracy, 100.0);
    }

    #[test]
    fn test_nan_elapsed_is_zero_speed() {
        let m = from_counts(MetricCounts::default(), f64::NAN, 100.0);
        assert_eq!(m.cpm, 0.0);
    }

    #[test]
    fn test_no_input_is_full_accuracy() {
        let m = from_counts(MetricCounts::default(), 12.0, 100.0);
        assert_eq!(m.accuracy, 100.0);
        assert_eq!(m.cpm, 0.0);
    }

    #[test]
    fn test_cpm_and_wpm() {
        // 50 correct characters in 30 seconds
        let m = from_counts(
            MetricCounts {
                committed: 52,
                keystrokes: 52,
                mistakes: 2,
            },
            30.0,
            100.0,
        );
        assert_eq!(m.cpm, 100.0);
        assert_eq!(m.wpm, 20.0);
    }

    #[test]
    fn test_accuracy_counts_every_commit() {
        let m = from_counts(
            MetricCounts {
                committed: 4,
                keystrokes: 4,
                mistakes: 1,
            },
            10.0,
            100.0,
        );
        assert_eq!(m.accuracy, 75.0);
    }

    #[test]
    fn test_rhythm_matches_batch_std_dev() {
        let intervals = [120.0, 80.0, 100.0, 140.0, 60.0];
        let mut rhythm = RhythmStats::default();
        for i in intervals {
            rhythm.push(i);
        }
        let batch = crate::util::std_dev(&intervals).unwrap();
        assert!((rhythm.std_dev() - batch).abs() < 1e-9);
        assert!((rhythm.mean() - 100.0).abs() < 1e-9);
        assert_eq!(rhythm.count(), 5);
    }

    #[test]
    fn test_steady_rhythm_is_fully_consistent() {
        let mut rhythm = RhythmStats::default();
        for _ in 0..10 {
            rhythm.push(150.0);
        }
        assert_eq!(rhythm.consistency(), 100.0);
    }

    #[test]
    fn test_erratic_rhythm_scores_lower() {
        let mut steady = RhythmStats::default();
        let mut erratic = RhythmStats::default();
        for i in 0..10 {
            steady.push(if i % 2 == 0 { 140.0 } else { 160.0 });
            erratic.push(if i % 2 == 0 { 40.0 } else { 400.0 });
        }
        assert!(erratic.consistency() < steady.consistency());
        assert!(erratic.consistency() >= 0.0);
    }

    #[test]
    fn test_too_few_intervals_is_fully_consistent() {
        let mut rhythm = RhythmStats::default();
        assert_eq!(rhythm.consistency(), 100.0);
        rhythm.push(200.0);
        assert_eq!(rhythm.consistency(), 100.0);
    }

    #[test]
    fn test_compute_metrics_matches_incremental() {
        let keystrokes = vec![
            stroke('t', 0, true, None),
            stroke('e', 150, true, Some(150)),
            stroke('z', 330, false, Some(180)),
            stroke('t', 450, true, Some(120)),
        ];
        let mut mistakes = BTreeMap::new();
        mistakes.insert(
            2,
            Mistake {
                position: 2,
                expected: 's',
                actual: 'z',
            },
        );

        let batch = compute_metrics(&keystrokes, &mistakes, 4, 6.0);

        let mut rhythm = RhythmStats::default();
        for ms in [150.0, 180.0, 120.0] {
            rhythm.push(ms);
        }
        let incremental = from_counts(
            MetricCounts {
                committed: 4,
                keystrokes: 4,
                mistakes: 1,
            },
            6.0,
            rhythm.consistency(),
        );

        assert_eq!(batch.accuracy, 75.0);
        assert_eq!(batch.cpm, 30.0);
        assert_eq!(batch.wpm, 6.0);
        assert!((batch.consistency - incremental.consistency).abs() < 1e-9);
    }

    #[test]
    fn test_rounded() {
        let m = LiveMetrics {
            wpm: 41.6,
            cpm: 208.2,
            accuracy: 97.5,
            consistency: 88.49,
        };
        let r = m.rounded();
        assert_eq!(r.wpm, 42.0);
        assert_eq!(r.cpm, 208.0);
        assert_eq!(r.accuracy, 98.0);
        assert_eq!(r.consistency, 88.0);
    }
}
