//! Composite index scores per zone.

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

/// Raw and min-max scaled deprivation index per zone, in table row order.
#[derive(Debug, Clone)]
pub struct IndexScores {
    pub raw: Array1<f64>,
    pub scaled: Array1<f64>,
}

/// Dot each zone's gap row with the indicator weights, then min-max scale
/// across the run so scores are comparable between zones.
pub fn compose(gap: &Array2<f64>, weights: &Array1<f64>) -> Result<IndexScores> {
    let raw = gap.dot(weights);
    let scaled = min_max_scale(&raw)?;
    Ok(IndexScores { raw, scaled })
}

/// Scale to [0, 1] with the minimum zone mapped to 0 and the maximum to 1.
///
/// Identical scores across every zone cannot be spread over the interval;
/// that run fails with a degenerate-range error and the caller decides the
/// fallback (e.g. emit the raw index only).
pub fn min_max_scale(raw: &Array1<f64>) -> Result<Array1<f64>> {
    let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !(range > 0.0) {
        return Err(Error::DegenerateRange { zones: raw.len() });
    }
    Ok(raw.mapv(|v| (v - min) / range))
}
