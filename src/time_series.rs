use serde::{Deserialize, Serialize};

use crate::util::std_dev;

/// Live WPM sampled at a point in the session (seconds of active time)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub t: f64,
    pub wpm: f64,
}

impl TimeSeriesPoint {
    pub fn new(t: f64, wpm: f64) -> Self {
        Self { t, wpm }
    }
}

/// Spread of the sampled WPM values; 0 with fewer than two samples
pub fn wpm_std_dev(series: &[TimeSeriesPoint]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let values: Vec<f64> = series.iter().map(|p| p.wpm).collect();
    std_dev(&values).unwrap_or(0.0)
}
