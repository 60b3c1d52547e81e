//! The batch pipeline: derive, threshold, censor, weight, compose, emit.
//!
//! Stages run strictly in sequence; each consumes its input and returns a
//! fresh value, so the pipeline is safe to call from a concurrent
//! orchestrator (one call per run) without any shared state.

use std::path::Path;

use anyhow::Context;
use ndarray::Array2;
use polars::{frame::DataFrame, prelude::{NamedFrom, Series}};

use crate::common::data;
use crate::config::RunConfig;
use crate::derive::{self, MergeReport};
use crate::error::Result;
use crate::index::{self, IndexScores};
use crate::matrix::{self, BinaryMatrix};
use crate::stats;
use crate::weights::{self, WeightEstimate};

/// Everything one run produces: the augmented table plus the diagnostics an
/// orchestrator needs to judge the run without scraping stderr.
#[derive(Debug)]
pub struct RunOutput {
    /// Original columns + `gap_<indicator>` columns + `raw_index` +
    /// `scaled_index`, one row per surviving zone.
    pub table: DataFrame,
    pub merge: MergeReport,
    pub weights: WeightEstimate,
    pub scores: IndexScores,
    pub summary: RunSummary,
}

/// Scalar Alkire-Foster aggregates for the run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    /// Headcount ratio (M0) over the binary matrix; NaN when no zone is
    /// deprived.
    pub headcount_ratio: f64,
    /// Adjusted poverty gap (M1) over the power-gap matrix; NaN likewise.
    pub adjusted_gap: f64,
    /// Zones with at least one surviving deprivation flag.
    pub deprived_zones: usize,
}

/// Run the full index computation over in-memory tables.
///
/// The config is validated up front so no matrix work starts on bad
/// parameters. The binary and gap matrices are censored from the same
/// deprivation-share computation, and the power gap feeds both the weight
/// estimation and the composed index (`n = 1` reduces it to `mat_g1`).
pub fn run(
    config: &RunConfig,
    zones: DataFrame,
    travel: DataFrame,
    verbose: u8,
) -> Result<RunOutput> {
    config.validate()?;

    let (table, merge) = derive::derive_indicators(zones, travel, &config.zone_key, &config.thresholds)?;
    if verbose > 0 {
        eprintln!(
            "[derive] {} zone rows x {} travel zones -> {} merged rows ({} zones dropped, {} rent values backfilled)",
            merge.zone_rows, merge.travel_zones, merge.merged_rows,
            merge.dropped_zones(), merge.rent_backfilled,
        );
    }

    let binary = BinaryMatrix::build(&table, &config.thresholds, config.k)?;
    let gap = matrix::normalized_gap(&table, &config.thresholds, &binary)?;
    let powered = matrix::power_gap(&gap, config.n);

    let binary_f64 = binary.as_f64();
    let summary = RunSummary {
        headcount_ratio: stats::headcount_ratio(binary_f64.view()),
        adjusted_gap: stats::adjusted_gap(powered.view()),
        deprived_zones: binary.deprived_zones(),
    };
    if verbose > 0 {
        eprintln!(
            "[stats] deprived_zones={} headcount_ratio={} adjusted_gap={}",
            summary.deprived_zones, summary.headcount_ratio, summary.adjusted_gap,
        );
    }

    let estimate = weights::estimate_weights(&powered, &config.weighting)?;
    if verbose > 0 {
        eprintln!("[weights] eigenvalues: {:?}", estimate.eigenvalues);
        eprintln!("[weights] explained:   {:?}", estimate.explained);
        eprintln!("[weights] communalities: {:?}", estimate.communalities);
    }

    let scores = index::compose(&powered, &estimate.weights)?;
    let table = augment(table, config, &powered, &scores)?;

    Ok(RunOutput { table, merge, weights: estimate, scores, summary })
}

/// Load the zone and travel CSVs, run the pipeline, and write the augmented
/// table. One scoped read per input, one scoped write for the output; no
/// retries, this is an offline batch job.
pub fn run_files(
    config: &RunConfig,
    zone_path: &Path,
    travel_path: &Path,
    out_path: &Path,
    verbose: u8,
) -> anyhow::Result<RunOutput> {
    let zones = data::read_zone_csv(zone_path, &config.zone_key)
        .with_context(|| format!("failed to load zone table {}", zone_path.display()))?;
    let travel = data::read_zone_csv(travel_path, &config.zone_key)
        .with_context(|| format!("failed to load travel table {}", travel_path.display()))?;

    let mut output = run(config, zones, travel, verbose)?;

    data::write_csv(&mut output.table, out_path)
        .with_context(|| format!("failed to write augmented table {}", out_path.display()))?;
    Ok(output)
}

/// Append the gap columns and both index columns to the merged table.
///
/// Matrices were derived from this table's rows in order, so the columns
/// attach positionally; no re-join is needed.
fn augment(
    mut table: DataFrame,
    config: &RunConfig,
    gap: &Array2<f64>,
    scores: &IndexScores,
) -> Result<DataFrame> {
    for (j, threshold) in config.thresholds.iter().enumerate() {
        let name = format!("gap_{}", threshold.indicator);
        table.with_column(Series::new(name.into(), gap.column(j).to_vec()))?;
    }
    table.with_column(Series::new("raw_index".into(), scores.raw.to_vec()))?;
    table.with_column(Series::new("scaled_index".into(), scores.scaled.to_vec()))?;
    Ok(table)
}
