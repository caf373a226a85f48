//! Summary statistics over peer-count series.

use serde::{Deserialize, Serialize};

/// Summary of a numeric series. All fields are zero for an empty series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub min: u32,
    pub max: u32,
    pub mean: f64,
    pub p50: u32,
    pub p90: u32,
}

impl SeriesStats {
    pub fn from_values(values: &[u32]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_unstable();

        let sum: u64 = values.iter().map(|&v| u64::from(v)).sum();

        Self {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean: sum as f64 / values.len() as f64,
            p50: percentile(&sorted, 0.5),
            p90: percentile(&sorted, 0.9),
        }
    }
}

/// Percentile of an ascending slice, no interpolation.
///
/// Index is `floor(q * (n - 1))` capped at `n - 1`. Returns 0 for an empty slice.
pub fn percentile(sorted: &[u32], q: f64) -> u32 {
    if sorted.is_empty() {
        return 0;
    }
    let last = sorted.len() - 1;
    let idx = (q.clamp(0.0, 1.0) * last as f64).floor() as usize;
    sorted[idx.min(last)]
}

/// Fraction of `values` equal to `target`; 0.0 for an empty slice
pub fn fraction_equal(values: &[u32], target: u32) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().filter(|&&v| v == target).count() as f64 / values.len() as f64
}
