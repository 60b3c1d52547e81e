#![doc = "Multidimensional deprivation index engine (Alkire-Foster counting method)"]
mod common;
mod config;
mod derive;
mod error;
mod index;
mod matrix;
mod pipeline;
mod stats;
mod weights;

#[doc(inline)]
pub use config::{RunConfig, Rotation, Threshold, ThresholdSet, WeightConfig};

#[doc(inline)]
pub use error::Error;

#[doc(inline)]
pub use derive::{average_travel, derive_indicators, fill_missing_with_median, MergeReport};

#[doc(inline)]
pub use matrix::{normalized_gap, power_gap, BinaryMatrix};

#[doc(inline)]
pub use stats::{adjusted_gap, headcount_ratio};

#[doc(inline)]
pub use weights::{estimate_weights, WeightEstimate};

#[doc(inline)]
pub use index::{compose, min_max_scale, IndexScores};

#[doc(inline)]
pub use pipeline::{run, run_files, RunOutput, RunSummary};

#[doc(inline)]
pub use common::data::{read_csv, read_zone_csv, write_csv};
