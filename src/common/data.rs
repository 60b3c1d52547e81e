//! Flat-file load/store for zone tables.

use std::{fs::File, path::Path, sync::Arc};

use anyhow::{Context, Result};
use polars::{
    frame::DataFrame,
    io::{SerReader, SerWriter},
    prelude::{Column, CsvReadOptions, CsvReader, CsvWriter, DataType, Field, Schema},
};

use crate::error::Error;

/// Reads a CSV file from `path` into a Polars DataFrame.
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    CsvReader::new(file)
        .finish()
        .with_context(|| format!("Failed to read CSV from {}", path.display()))
}

/// Reads a CSV, forcing the zone-key column to be read as strings so zip
/// codes keep their leading zeros.
pub fn read_zone_csv(path: &Path, zone_key: &str) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    let schema = Arc::new(Schema::from_iter([Field::new(zone_key.into(), DataType::String)]));
    let options = CsvReadOptions::default().with_schema_overwrite(Some(schema));
    CsvReader::new(file)
        .with_options(options)
        .finish()
        .with_context(|| format!("Failed to read CSV from {}", path.display()))
}

/// Write a DataFrame to a CSV file.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    CsvWriter::new(file)
        .finish(df)
        .with_context(|| format!("Failed to write CSV to {}", path.display()))
}

/// Fetch a required column, reporting a missing one as a schema error for
/// the named table.
pub(crate) fn require_column<'a>(
    df: &'a DataFrame,
    table: &'static str,
    column: &str,
) -> Result<&'a Column, Error> {
    df.column(column).map_err(|_| Error::Schema { table, column: column.to_string() })
}

#[cfg(test)]
mod tests {
    use polars::prelude::*;

    use super::*;

    #[test]
    fn missing_column_is_schema_error() {
        let df = DataFrame::new(vec![
            Series::new("zip_code".into(), &["60601", "60602"]).into(),
        ])
        .unwrap();
        assert!(require_column(&df, "zone", "zip_code").is_ok());
        match require_column(&df, "zone", "crime") {
            Err(Error::Schema { table, column }) => {
                assert_eq!(table, "zone");
                assert_eq!(column, "crime");
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn csv_round_trip_preserves_zone_key_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zones.csv");

        let mut df = DataFrame::new(vec![
            Series::new("zip_code".into(), &["02127", "60601"]).into(),
            Series::new("crime".into(), &[5.0f64, 15.0]).into(),
        ])
        .unwrap();
        write_csv(&mut df, &path).unwrap();

        let read = read_zone_csv(&path, "zip_code").unwrap();
        let keys: Vec<&str> = read
            .column("zip_code").unwrap()
            .str().unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(keys, vec!["02127", "60601"]); // leading zero intact

        // Without the schema override the zip column is inferred numeric.
        let inferred = read_csv(&path).unwrap();
        assert!(inferred.column("zip_code").unwrap().dtype().is_primitive_numeric());
    }
}
