use polars::error::PolarsError;
use thiserror::Error;

/// Errors surfaced by the index engine.
///
/// Validation failures (schema, config) abort the whole run. Numeric edge
/// cases inside the matrices (NaN cells, negative gaps) are normalized to
/// zero by the matrix builders instead of being reported here, and an
/// aggregate over zero deprived zones yields NaN rather than an error.
#[derive(Debug, Error)]
pub enum Error {
    /// A required column is missing from an input table.
    #[error("missing column `{column}` in {table} table")]
    Schema { table: &'static str, column: String },

    /// An invalid run parameter, caught before any matrix computation starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A zone key appears more than once in an input table. The data model
    /// is one row per zone; a duplicated key would fan out the travel join
    /// and double-count the zone in every downstream matrix.
    #[error("duplicate zone key `{key}` in {table} table")]
    DuplicateKey { table: &'static str, key: String },

    /// Min-max scaling is impossible: every zone has the same raw index.
    #[error("cannot scale index: all {zones} zones share the same raw index value")]
    DegenerateRange { zones: usize },

    #[error(transparent)]
    Frame(#[from] PolarsError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
