//! Censored deprivation matrices (Alkire-Foster counting method).

use ndarray::{s, Array1, Array2, Axis};
use polars::prelude::{DataFrame, DataType};

use crate::common::data::require_column;
use crate::config::ThresholdSet;
use crate::error::Result;

/// Raw indicator values extracted in threshold-set column order.
///
/// Nulls become NaN so threshold comparisons treat them as not-deprived.
pub(crate) fn indicator_values(df: &DataFrame, thresholds: &ThresholdSet) -> Result<Array2<f64>> {
    let mut values = Array2::<f64>::zeros((df.height(), thresholds.len()));
    for (j, threshold) in thresholds.iter().enumerate() {
        let column = require_column(df, "zone", &threshold.indicator)?
            .cast(&DataType::Float64)?;
        let column: Vec<f64> = column
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();
        values.slice_mut(s![.., j]).assign(&Array1::from(column));
    }
    Ok(values)
}

/// Binary deprivation matrix `mat_y` plus the pre-censoring deprivation
/// share each zone was censored against.
///
/// The share is kept so the gap matrix is censored from the *same*
/// computation, never a divergent re-derivation.
#[derive(Debug, Clone)]
pub struct BinaryMatrix {
    /// (zones x indicators), entries in {0, 1}.
    pub values: Array2<u8>,
    /// Per-zone count of crossed thresholds, before censoring.
    pub share: Array1<u32>,
}

impl BinaryMatrix {
    /// Threshold every indicator and censor rows with at most `k`
    /// deprivations.
    ///
    /// A zone only counts as multidimensionally deprived once it crosses at
    /// least `k + 1` thresholds at the same time; `k = 0` keeps any single
    /// deprivation. NaN indicator values compare as not-deprived.
    pub fn build(df: &DataFrame, thresholds: &ThresholdSet, k: u32) -> Result<Self> {
        let raw = indicator_values(df, thresholds)?;
        let mut values = Array2::<u8>::zeros(raw.dim());
        for (j, threshold) in thresholds.iter().enumerate() {
            for z in 0..raw.nrows() {
                // NaN >= cutoff is false, so missing values stay not-deprived.
                if raw[[z, j]] >= threshold.cutoff {
                    values[[z, j]] = 1;
                }
            }
        }

        let share = values.map_axis(Axis(1), |row| row.iter().map(|&b| u32::from(b)).sum::<u32>());
        for (z, &count) in share.iter().enumerate() {
            if count <= k {
                values.row_mut(z).fill(0);
            }
        }
        Ok(Self { values, share })
    }

    /// Number of zones with at least one surviving deprivation flag.
    pub fn deprived_zones(&self) -> usize {
        self.values
            .rows()
            .into_iter()
            .filter(|row| row.iter().any(|&b| b != 0))
            .count()
    }

    /// The matrix as floats, for the aggregate statistics.
    pub fn as_f64(&self) -> Array2<f64> {
        self.values.mapv(f64::from)
    }
}

/// Normalized gap matrix `mat_g1`: each zone's relative distance beyond
/// each threshold, censored by the binary matrix.
///
/// NaN cells and negative gaps are replaced with 0. A negative gap means
/// the zone is better-off than the threshold on that indicator; it is
/// clipped rather than allowed to cancel other dimensions.
pub fn normalized_gap(
    df: &DataFrame,
    thresholds: &ThresholdSet,
    binary: &BinaryMatrix,
) -> Result<Array2<f64>> {
    let raw = indicator_values(df, thresholds)?;
    let mut gap = Array2::<f64>::zeros(raw.dim());
    for (j, threshold) in thresholds.iter().enumerate() {
        for z in 0..raw.nrows() {
            let g = (raw[[z, j]] - threshold.cutoff) / threshold.cutoff;
            if g.is_finite() && g > 0.0 && binary.values[[z, j]] == 1 {
                gap[[z, j]] = g;
            }
        }
    }
    Ok(gap)
}

/// Element-wise power gap `mat_g1 ** n`; `n` need not be an integer.
pub fn power_gap(gap: &Array2<f64>, n: f64) -> Array2<f64> {
    gap.mapv(|g| g.powf(n))
}
