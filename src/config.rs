use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One indicator cutoff: a zone is deprived on `indicator` when its value
/// is at or above `cutoff`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub indicator: String,
    pub cutoff: f64,
}

/// Ordered indicator -> cutoff mapping.
///
/// The listed order is the column order of every matrix derived from it,
/// so runs with the same threshold set are byte-for-byte reproducible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdSet(Vec<Threshold>);

impl ThresholdSet {
    pub fn new<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(indicator, cutoff)| Threshold { indicator: indicator.into(), cutoff })
                .collect(),
        )
    }

    /// Number of indicators (matrix columns).
    #[inline] pub fn len(&self) -> usize { self.0.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Thresholds in matrix column order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Threshold> + '_ {
        self.0.iter()
    }

    /// Indicator names in matrix column order.
    pub fn indicators(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.iter().map(|t| t.indicator.as_str())
    }
}

/// Rotation strategy applied to the factor loadings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    /// Keep the unrotated principal-factor loadings.
    None,
    /// Orthogonal varimax rotation (Kaiser's pairwise algorithm).
    Varimax,
}

impl Default for Rotation {
    fn default() -> Self { Rotation::Varimax }
}

impl Rotation {
    /// Resolve a rotation strategy by name. Oblique strategies (e.g.
    /// "oblimin") are not implemented and are rejected here, before any
    /// decomposition runs.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "none" => Ok(Rotation::None),
            "varimax" => Ok(Rotation::Varimax),
            other => Err(Error::Config(format!(
                "unsupported rotation `{other}` (expected one of: none, varimax)"
            ))),
        }
    }
}

impl FromStr for Rotation {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> { Rotation::from_name(s) }
}

/// Parameters for the factor-analytic weighting step.
///
/// `n_components` is always human-supplied (from scree-plot or eigenvalue
/// review), never auto-selected by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    pub n_components: usize,
    #[serde(default)]
    pub rotation: Rotation,
}

/// Immutable configuration for one computation run.
///
/// Validated once, up front; every pipeline stage then trusts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Name of the zone-key column (zip code) shared by all input tables.
    #[serde(default = "default_zone_key")]
    pub zone_key: String,

    /// Indicator cutoffs; keys define the matrix column order.
    pub thresholds: ThresholdSet,

    /// AF cutoff: a zone must cross at least `k + 1` thresholds at once to
    /// count as multidimensionally deprived. Non-negative by construction.
    pub k: u32,

    /// Power-gap exponent; larger values weight the most-deprived zones
    /// more heavily. Need not be an integer.
    #[serde(default = "default_power")]
    pub n: f64,

    pub weighting: WeightConfig,
}

fn default_zone_key() -> String { "zip_code".to_string() }

fn default_power() -> f64 { 1.0 }

impl RunConfig {
    /// Fail-fast parameter check, run before any matrix computation.
    pub fn validate(&self) -> Result<()> {
        if self.zone_key.is_empty() {
            return Err(Error::Config("zone_key must not be empty".into()));
        }
        if self.thresholds.is_empty() {
            return Err(Error::Config("threshold set must not be empty".into()));
        }
        for (i, threshold) in self.thresholds.iter().enumerate() {
            if !threshold.cutoff.is_finite() || threshold.cutoff <= 0.0 {
                return Err(Error::Config(format!(
                    "threshold for `{}` must be finite and positive, got {}",
                    threshold.indicator, threshold.cutoff
                )));
            }
            // Duplicate names would make matrix columns ambiguous.
            if self.thresholds.iter().take(i).any(|t| t.indicator == threshold.indicator) {
                return Err(Error::Config(format!(
                    "duplicate indicator `{}` in threshold set",
                    threshold.indicator
                )));
            }
        }
        if !self.n.is_finite() || self.n <= 0.0 {
            return Err(Error::Config(format!(
                "power exponent n must be finite and positive, got {}",
                self.n
            )));
        }
        if self.weighting.n_components == 0 || self.weighting.n_components > self.thresholds.len() {
            return Err(Error::Config(format!(
                "n_components must be in 1..={}, got {}",
                self.thresholds.len(),
                self.weighting.n_components
            )));
        }
        Ok(())
    }

    /// Deserialize and validate a config from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RunConfig =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The Chicago configuration the method was originally calibrated on:
    /// crime counts, affordability ratios, and travel access to the Loop.
    /// A convenience starting point; real runs supply their own config.
    pub fn example() -> Self {
        Self {
            zone_key: default_zone_key(),
            thresholds: ThresholdSet::new([
                ("type_i_crime", 10.0),
                ("type_ii_crime", 30.0),
                ("RTI_ratio", 0.3),
                ("house_price_affordability", 4.0),
                ("time_to_cbd", 30.0),
                ("distance_to_cbd", 5000.0),
            ]),
            k: 2,
            n: 1.0,
            weighting: WeightConfig { n_components: 2, rotation: Rotation::Varimax },
        }
    }
}
