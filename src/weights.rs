//! Factor-analytic indicator weights.
//!
//! Decomposes the gap matrix columns into latent factors (principal-factor
//! extraction over the indicator correlation matrix) and sums each
//! indicator's loadings across the retained components into a weight.
//!
//! The decomposition is sensitive to the numerical conditioning of its
//! input: near-collinear indicators produce unstable loadings. Eigenvalues
//! and communalities are therefore returned alongside the weights for human
//! review; instability is observable, never a hard error.

use std::cmp::Ordering;

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, Axis};

use crate::config::{Rotation, WeightConfig};
use crate::error::{Error, Result};

const VARIMAX_MAX_SWEEPS: usize = 100;
const VARIMAX_TOLERANCE: f64 = 1e-9;

/// Loadings and condition diagnostics from one decomposition.
#[derive(Debug, Clone)]
pub struct WeightEstimate {
    /// (components x indicators) loadings after rotation.
    pub loadings: Array2<f64>,
    /// Per-indicator weight: loadings summed across retained components.
    /// Not normalized to sum to 1.
    pub weights: Array1<f64>,
    /// Full eigenvalue spectrum of the indicator correlation matrix,
    /// descending. Review this when choosing `n_components`.
    pub eigenvalues: Vec<f64>,
    /// Share of total variance explained by each retained component.
    pub explained: Vec<f64>,
    /// Per-indicator communality: variance captured by the retained
    /// components. Values near zero flag indicators the factors ignore.
    pub communalities: Vec<f64>,
}

/// Estimate per-indicator weights from the gap matrix.
///
/// Columns are standardized, their correlation matrix eigendecomposed, and
/// the top `n_components` eigenpairs scaled into loadings
/// (`eigvec * sqrt(eigval)`), optionally varimax-rotated. Callers must
/// treat the result as approximate and inspect the diagnostics.
pub fn estimate_weights(gap: &Array2<f64>, config: &WeightConfig) -> Result<WeightEstimate> {
    let d = gap.ncols();
    if config.n_components == 0 || config.n_components > d {
        return Err(Error::Config(format!(
            "n_components must be in 1..={d}, got {}",
            config.n_components
        )));
    }

    let corr = correlation(gap);
    let eigen = SymmetricEigen::new(DMatrix::from_fn(d, d, |r, c| corr[[r, c]]));

    // nalgebra does not order the spectrum; sort descending by eigenvalue.
    let mut order: Vec<usize> = (0..d).collect();
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(Ordering::Equal)
    });
    let eigenvalues: Vec<f64> = order.iter().map(|&i| eigen.eigenvalues[i]).collect();
    let total_variance: f64 = eigenvalues.iter().map(|&e| e.max(0.0)).sum();

    let mut loadings = Array2::<f64>::zeros((config.n_components, d));
    for (component, &i) in order.iter().take(config.n_components).enumerate() {
        // Tiny negative eigenvalues from round-off clamp to zero loadings.
        let scale = eigen.eigenvalues[i].max(0.0).sqrt();
        for j in 0..d {
            loadings[[component, j]] = eigen.eigenvectors[(j, i)] * scale;
        }
    }

    if config.rotation == Rotation::Varimax {
        varimax(&mut loadings);
    }
    align_signs(&mut loadings);

    let weights = loadings.sum_axis(Axis(0));
    let communalities = (0..d)
        .map(|j| loadings.column(j).iter().map(|l| l * l).sum())
        .collect();
    let explained = eigenvalues
        .iter()
        .take(config.n_components)
        .map(|&e| if total_variance > 0.0 { e.max(0.0) / total_variance } else { 0.0 })
        .collect();

    Ok(WeightEstimate { loadings, weights, eigenvalues, explained, communalities })
}

/// Correlation matrix of the columns of `m`.
///
/// Zero-variance columns cannot be standardized; they contribute zero
/// off-diagonal correlation and keep a unit diagonal.
fn correlation(m: &Array2<f64>) -> Array2<f64> {
    let n = m.nrows() as f64;
    let d = m.ncols();
    let denom = (n - 1.0).max(1.0);

    let mut standardized = m.clone();
    for mut column in standardized.axis_iter_mut(Axis(1)) {
        let mean = column.sum() / n.max(1.0);
        let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / denom;
        let sd = variance.sqrt();
        if sd > 0.0 {
            column.mapv_inplace(|v| (v - mean) / sd);
        } else {
            column.fill(0.0);
        }
    }

    let mut corr = standardized.t().dot(&standardized) / denom;
    for j in 0..d {
        corr[[j, j]] = 1.0;
    }
    corr
}

/// In-place varimax rotation (Kaiser's pairwise algorithm) of a
/// (components x indicators) loadings matrix.
fn varimax(loadings: &mut Array2<f64>) {
    let k = loadings.nrows();
    let d = loadings.ncols();
    if k < 2 || d == 0 {
        return;
    }
    let d_f = d as f64;

    for _ in 0..VARIMAX_MAX_SWEEPS {
        let mut rotated = 0.0f64;
        for p in 0..k {
            for q in (p + 1)..k {
                let (mut a, mut b, mut c, mut e) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
                for j in 0..d {
                    let x = loadings[[p, j]];
                    let y = loadings[[q, j]];
                    let u = x * x - y * y;
                    let w = 2.0 * x * y;
                    a += u;
                    b += w;
                    c += u * u - w * w;
                    e += 2.0 * u * w;
                }
                let numerator = e - 2.0 * a * b / d_f;
                let denominator = c - (a * a - b * b) / d_f;
                let angle = 0.25 * numerator.atan2(denominator);
                if angle.abs() <= VARIMAX_TOLERANCE {
                    continue;
                }
                let (sin, cos) = angle.sin_cos();
                for j in 0..d {
                    let x = loadings[[p, j]];
                    let y = loadings[[q, j]];
                    loadings[[p, j]] = cos * x + sin * y;
                    loadings[[q, j]] = -sin * x + cos * y;
                }
                rotated += angle.abs();
            }
        }
        if rotated < VARIMAX_TOLERANCE {
            break;
        }
    }
}

/// Eigenvector sign is arbitrary; fix each component so its loadings sum
/// non-negative, keeping summed weights stable across runs.
fn align_signs(loadings: &mut Array2<f64>) {
    for mut component in loadings.axis_iter_mut(Axis(0)) {
        if component.sum() < 0.0 {
            component.mapv_inplace(|l| -l);
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr2;

    use super::*;

    fn sample_gap() -> Array2<f64> {
        // Two tightly related columns and one independent column.
        arr2(&[
            [0.0, 0.1, 0.9],
            [0.2, 0.3, 0.0],
            [0.4, 0.5, 0.4],
            [0.6, 0.7, 0.1],
            [0.8, 0.9, 0.6],
            [1.0, 1.1, 0.2],
        ])
    }

    #[test]
    fn shapes_and_diagnostics_are_complete() {
        let config = WeightConfig { n_components: 2, rotation: Rotation::Varimax };
        let estimate = estimate_weights(&sample_gap(), &config).unwrap();

        assert_eq!(estimate.loadings.dim(), (2, 3));
        assert_eq!(estimate.weights.len(), 3);
        assert_eq!(estimate.eigenvalues.len(), 3);
        assert_eq!(estimate.explained.len(), 2);
        assert_eq!(estimate.communalities.len(), 3);

        // Spectrum is descending and sums to the number of indicators
        // (trace of a correlation matrix).
        assert!(estimate.eigenvalues.windows(2).all(|w| w[0] >= w[1]));
        let trace: f64 = estimate.eigenvalues.iter().sum();
        assert!((trace - 3.0).abs() < 1e-9);
    }

    #[test]
    fn communalities_bounded_by_one() {
        let config = WeightConfig { n_components: 2, rotation: Rotation::Varimax };
        let estimate = estimate_weights(&sample_gap(), &config).unwrap();
        for &h in &estimate.communalities {
            assert!(h >= -1e-9 && h <= 1.0 + 1e-9, "communality out of range: {h}");
        }
    }

    #[test]
    fn collinear_columns_load_on_the_same_factor() {
        let config = WeightConfig { n_components: 1, rotation: Rotation::None };
        let estimate = estimate_weights(&sample_gap(), &config).unwrap();
        // Columns 0 and 1 are perfectly correlated; their loadings on the
        // dominant factor should be (nearly) equal.
        assert!((estimate.loadings[[0, 0]] - estimate.loadings[[0, 1]]).abs() < 1e-6);
    }

    #[test]
    fn varimax_preserves_communalities() {
        // Orthogonal rotation redistributes loadings between components but
        // leaves each indicator's captured variance unchanged.
        let unrotated = estimate_weights(
            &sample_gap(),
            &WeightConfig { n_components: 2, rotation: Rotation::None },
        )
        .unwrap();
        let rotated = estimate_weights(
            &sample_gap(),
            &WeightConfig { n_components: 2, rotation: Rotation::Varimax },
        )
        .unwrap();
        for (a, b) in unrotated.communalities.iter().zip(rotated.communalities.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn weights_equal_column_sums_of_loadings() {
        let config = WeightConfig { n_components: 2, rotation: Rotation::Varimax };
        let estimate = estimate_weights(&sample_gap(), &config).unwrap();
        for j in 0..3 {
            let column_sum: f64 = estimate.loadings.column(j).sum();
            assert!((estimate.weights[j] - column_sum).abs() < 1e-12);
        }
    }

    #[test]
    fn constant_columns_do_not_poison_the_decomposition() {
        let gap = arr2(&[
            [0.0, 0.0],
            [0.5, 0.0],
            [1.0, 0.0],
        ]);
        let config = WeightConfig { n_components: 1, rotation: Rotation::None };
        let estimate = estimate_weights(&gap, &config).unwrap();
        assert!(estimate.weights.iter().all(|w| w.is_finite()));
    }

    #[test]
    fn out_of_range_components_rejected() {
        let config = WeightConfig { n_components: 4, rotation: Rotation::None };
        assert!(matches!(
            estimate_weights(&sample_gap(), &config),
            Err(Error::Config(_))
        ));
        let config = WeightConfig { n_components: 0, rotation: Rotation::None };
        assert!(matches!(
            estimate_weights(&sample_gap(), &config),
            Err(Error::Config(_))
        ));
    }
}
