//! Scalar Alkire-Foster aggregates over a deprivation or gap matrix.

use ndarray::ArrayView2;

/// Share of deprived zone-indicator cells among zones flagged as deprived
/// (M0 when applied to the binary matrix).
///
/// Returns NaN when no row has a nonzero entry: "no deprivation observed"
/// is a valid outcome of a run, not a crash.
pub fn headcount_ratio(matrix: ArrayView2<'_, f64>) -> f64 {
    let deprived_rows = matrix
        .rows()
        .into_iter()
        .filter(|row| row.iter().any(|&v| v != 0.0))
        .count();
    if deprived_rows == 0 {
        return f64::NAN;
    }
    matrix.sum() / (deprived_rows * matrix.ncols()) as f64
}

/// Average intensity among the deprived (M1): the same formula applied to
/// a gap matrix instead of the binary matrix.
pub fn adjusted_gap(matrix: ArrayView2<'_, f64>) -> f64 {
    headcount_ratio(matrix)
}
