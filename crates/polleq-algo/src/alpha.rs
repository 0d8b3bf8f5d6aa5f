//! Calibration of the scaling constant α.
//!
//! α makes `β·α·d` dimensionless: `α = Σ pop·d / Σ pop·d²` over a baseline set of
//! distances. Production runs use [`AlphaVariant::Min`] on the table cleaned for alpha
//! (existing polling places only).

use polleq_core::{DistanceTable, PollError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaVariant {
    /// Every origin-destination row counts once
    All,
    /// Each origin contributes its nearest destination
    #[default]
    Min,
    /// Each origin contributes its mean distance over all destinations
    Mean,
}

impl AlphaVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlphaVariant::All => "all",
            AlphaVariant::Min => "min",
            AlphaVariant::Mean => "mean",
        }
    }
}

impl Display for AlphaVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlphaVariant {
    type Err = PollError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(AlphaVariant::All),
            "min" => Ok(AlphaVariant::Min),
            "mean" => Ok(AlphaVariant::Mean),
            other => Err(PollError::ConfigInvalid(format!(
                "unknown alpha variant '{other}'; supported values: all, min, mean"
            ))),
        }
    }
}

/// `Σ pop·d / Σ pop·d²` over (population, distance) pairs.
fn ratio<I: IntoIterator<Item = (f64, f64)>>(pairs: I) -> Result<f64, PollError> {
    let (num, den) = pairs
        .into_iter()
        .fold((0.0, 0.0), |(num, den), (pop, d)| (num + pop * d, den + pop * d * d));
    if den <= 0.0 || !den.is_finite() {
        return Err(PollError::IntegrityViolation(
            "alpha is undefined: the baseline has no positive population-weighted distance"
                .into(),
        ));
    }
    Ok(num / den)
}

/// Computes α from an alpha-cleaned table. Rows without a distance are ignored.
pub fn compute_alpha(table: &DistanceTable, variant: AlphaVariant) -> Result<f64, PollError> {
    match variant {
        AlphaVariant::All => ratio(
            table
                .records
                .iter()
                .filter_map(|r| r.distance_m.map(|d| (r.population(), d))),
        ),
        AlphaVariant::Min => ratio(
            table
                .min_distance_per_origin()
                .into_values()
                .map(|(d, pop)| (pop, d)),
        ),
        AlphaVariant::Mean => {
            let mut sums: BTreeMap<&str, (f64, f64, usize)> = BTreeMap::new();
            for record in &table.records {
                let Some(d) = record.distance_m else {
                    continue;
                };
                let entry = sums
                    .entry(record.id_orig.as_str())
                    .or_insert((record.population(), 0.0, 0));
                entry.1 += d;
                entry.2 += 1;
            }
            ratio(
                sums.into_values()
                    .map(|(pop, total, n)| (pop, total / n as f64)),
            )
        }
    }
}
