//! Derived ratios and travel-metric merging.
//!
//! Turns the externally-produced zone table and the raw travel-sample table
//! into a single merged table that carries every indicator the threshold
//! set references.

use std::collections::HashSet;

use polars::prelude::*;

use crate::common::data::require_column;
use crate::config::ThresholdSet;
use crate::error::{Error, Result};

/// Column holding mean rent per zone.
pub const RENT: &str = "RentPrice";
/// Column holding annual median household income per zone.
pub const INCOME: &str = "median_household_income";
/// Derived monthly rent-to-income ratio column.
pub const RTI_RATIO: &str = "RTI_ratio";

/// Row-count bookkeeping for the ratio-derivation merge.
///
/// The travel join is an inner join: zones missing from either source are
/// dropped. That narrowing is deliberate and reported here rather than
/// silently swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    /// Rows in the incoming zone table.
    pub zone_rows: usize,
    /// Distinct zones in the travel table after averaging.
    pub travel_zones: usize,
    /// Rows surviving the inner join.
    pub merged_rows: usize,
    /// Null rent values backfilled with the cross-zone median.
    pub rent_backfilled: usize,
}

impl MergeReport {
    // Zone keys are unique on both sides of the inner join, so
    // merged_rows <= min(zone_rows, travel_zones) and the subtractions
    // below cannot underflow.

    /// Zones dropped because they had no travel samples.
    #[inline] pub fn dropped_zones(&self) -> usize { self.zone_rows - self.merged_rows }

    /// Travel zones dropped because they were absent from the zone table.
    #[inline] pub fn dropped_travel(&self) -> usize { self.travel_zones - self.merged_rows }
}

/// Average the repeated travel samples per zone key.
///
/// Every numeric column other than the key is reduced to its per-zone mean,
/// which covers both time and distance to the CBD without naming them.
pub fn average_travel(travel: DataFrame, zone_key: &str) -> Result<DataFrame> {
    let metric_cols: Vec<String> = travel
        .get_column_names_str()
        .iter()
        .filter(|c| **c != zone_key)
        .map(|c| c.to_string())
        .collect();
    let aggs: Vec<Expr> = metric_cols.iter().map(|c| col(c.as_str()).mean()).collect();
    let averaged = travel
        .lazy()
        .group_by([col(zone_key)])
        .agg(aggs)
        .sort([zone_key], Default::default())
        .collect()?;
    Ok(averaged)
}

/// Reject a table whose zone-key column holds any value twice.
///
/// One row per zone is the data model's invariant; a duplicated key would
/// fan out the inner join and double-count the zone in every matrix.
fn ensure_unique_keys(df: &DataFrame, table: &'static str, zone_key: &str) -> Result<()> {
    let keys = require_column(df, table, zone_key)?.as_materialized_series();
    if keys.n_unique()? == df.height() {
        return Ok(());
    }
    let keys = keys.cast(&DataType::String)?;
    let mut seen = HashSet::new();
    for key in keys.str()?.into_iter().flatten() {
        if !seen.insert(key) {
            return Err(Error::DuplicateKey { table, key: key.to_string() });
        }
    }
    // Only repeated nulls can reach here.
    Err(Error::DuplicateKey { table, key: "null".to_string() })
}

/// Backfill nulls in `column` with the column median, returning the fill
/// count. A no-op when the column is absent or fully populated.
pub fn fill_missing_with_median(df: DataFrame, column: &str) -> Result<(DataFrame, usize)> {
    let nulls = df.column(column).map(|series| series.null_count()).unwrap_or(0);
    if nulls == 0 {
        return Ok((df, 0));
    }
    let filled = df
        .lazy()
        .with_column(col(column).fill_null(col(column).median()))
        .collect()?;
    Ok((filled, nulls))
}

/// Merge travel averages into the zone table and derive the rent-to-income
/// ratio, producing the table the matrix builders consume.
///
/// Fails with a schema error when the zone key is missing from either input
/// or when any indicator named by the threshold set is absent after the
/// merge, and with a duplicate-key error when the zone table repeats a key.
/// The rent-to-income ratio is only derived when the threshold set asks for
/// it, and then requires the rent and income columns.
pub fn derive_indicators(
    zones: DataFrame,
    travel: DataFrame,
    zone_key: &str,
    thresholds: &ThresholdSet,
) -> Result<(DataFrame, MergeReport)> {
    require_column(&zones, "zone", zone_key)?;
    require_column(&travel, "travel", zone_key)?;
    // The travel table is allowed repeated keys (samples); the zone table
    // is not, or the join below would fan out.
    ensure_unique_keys(&zones, "zone", zone_key)?;

    let zone_rows = zones.height();
    let (zones, rent_backfilled) = fill_missing_with_median(zones, RENT)?;

    let averaged = average_travel(travel, zone_key)?;
    let travel_zones = averaged.height();

    let mut merged = zones
        .lazy()
        .join(averaged.lazy(), [col(zone_key)], [col(zone_key)], JoinArgs::new(JoinType::Inner))
        .sort([zone_key], Default::default())
        .collect()?;

    if thresholds.indicators().any(|i| i == RTI_RATIO) {
        require_column(&merged, "merged", RENT)?;
        require_column(&merged, "merged", INCOME)?;
        merged = merged
            .lazy()
            .with_column((col(RENT) / (col(INCOME) / lit(12.0))).alias(RTI_RATIO))
            .collect()?;
    }

    for indicator in thresholds.indicators() {
        require_column(&merged, "merged", indicator)?;
    }

    let report = MergeReport {
        zone_rows,
        travel_zones,
        merged_rows: merged.height(),
        rent_backfilled,
    };
    Ok((merged, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn zone_frame() -> DataFrame {
        DataFrame::new(vec![
            Series::new("zip_code".into(), &["60601", "60602", "60603"]).into(),
            Series::new(RENT.into(), &[Some(1500.0f64), None, Some(900.0)]).into(),
            Series::new(INCOME.into(), &[60000.0f64, 48000.0, 36000.0]).into(),
            Series::new("crime".into(), &[5.0f64, 15.0, 20.0]).into(),
        ])
        .unwrap()
    }

    fn travel_frame() -> DataFrame {
        // Two samples per zone, no samples for 60603.
        DataFrame::new(vec![
            Series::new("zip_code".into(), &["60601", "60601", "60602", "60602", "60699"]).into(),
            Series::new("time_to_cbd".into(), &[10.0f64, 20.0, 30.0, 50.0, 5.0]).into(),
            Series::new("distance_to_cbd".into(), &[1000.0f64, 3000.0, 4000.0, 6000.0, 100.0]).into(),
        ])
        .unwrap()
    }

    #[test]
    fn travel_samples_are_averaged_per_zone() {
        let averaged = average_travel(travel_frame(), "zip_code").unwrap();
        assert_eq!(averaged.height(), 3);
        let time = averaged.column("time_to_cbd").unwrap().f64().unwrap();
        // Sorted by zone key: 60601, 60602, 60699.
        assert_eq!(time.get(0), Some(15.0));
        assert_eq!(time.get(1), Some(40.0));
        assert_eq!(time.get(2), Some(5.0));
    }

    #[test]
    fn inner_join_narrowing_is_reported() {
        let thresholds = ThresholdSet::new([("crime", 10.0), ("time_to_cbd", 30.0)]);
        let (merged, report) =
            derive_indicators(zone_frame(), travel_frame(), "zip_code", &thresholds).unwrap();

        assert_eq!(report.zone_rows, 3);
        assert_eq!(report.travel_zones, 3);
        assert_eq!(report.merged_rows, 2); // 60603 has no travel, 60699 no zone row
        assert_eq!(report.dropped_zones(), 1);
        assert_eq!(report.dropped_travel(), 1);
        assert_eq!(merged.height(), 2);
    }

    #[test]
    fn rent_to_income_ratio_derived_on_demand() {
        let thresholds = ThresholdSet::new([(RTI_RATIO, 0.3)]);
        let (merged, _) =
            derive_indicators(zone_frame(), travel_frame(), "zip_code", &thresholds).unwrap();
        let rti = merged.column(RTI_RATIO).unwrap().f64().unwrap();
        // 60601: 1500 / (60000 / 12) = 0.3
        assert!((rti.get(0).unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn missing_rent_backfilled_with_median() {
        let thresholds = ThresholdSet::new([("crime", 10.0)]);
        let (merged, report) =
            derive_indicators(zone_frame(), travel_frame(), "zip_code", &thresholds).unwrap();
        assert_eq!(report.rent_backfilled, 1);
        assert_eq!(merged.column(RENT).unwrap().null_count(), 0);
        // Median of {1500, 900} = 1200 lands in the formerly-null 60602 row.
        let rent = merged.column(RENT).unwrap().f64().unwrap();
        assert_eq!(rent.get(1), Some(1200.0));
    }

    #[test]
    fn missing_indicator_is_schema_error() {
        let thresholds = ThresholdSet::new([("evictions", 100.0)]);
        let result = derive_indicators(zone_frame(), travel_frame(), "zip_code", &thresholds);
        assert!(matches!(result, Err(Error::Schema { column, .. }) if column == "evictions"));
    }

    #[test]
    fn duplicate_zone_keys_rejected_before_the_join() {
        // A repeated key would fan out the inner join (merged rows beyond
        // the distinct travel zones) and double-count the zone downstream.
        let thresholds = ThresholdSet::new([("crime", 10.0)]);
        let zones = DataFrame::new(vec![
            Series::new("zip_code".into(), &["60601", "60601"]).into(),
            Series::new("crime".into(), &[5.0f64, 15.0]).into(),
        ])
        .unwrap();
        let travel = DataFrame::new(vec![
            Series::new("zip_code".into(), &["60601"]).into(),
            Series::new("time_to_cbd".into(), &[12.0f64]).into(),
        ])
        .unwrap();

        let result = derive_indicators(zones, travel, "zip_code", &thresholds);
        assert!(matches!(
            result,
            Err(Error::DuplicateKey { table: "zone", key }) if key == "60601"
        ));
    }

    #[test]
    fn missing_zone_key_is_schema_error() {
        let thresholds = ThresholdSet::new([("crime", 10.0)]);
        let keyless = zone_frame().drop("zip_code").unwrap();
        let result = derive_indicators(keyless, travel_frame(), "zip_code", &thresholds);
        assert!(matches!(result, Err(Error::Schema { table: "zone", .. })));
    }
}
