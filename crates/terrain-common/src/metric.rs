//! Aggregation metrics used to build pyramid levels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TerrainError;

/// Function used to reduce a 2x2 block to a single value.
///
/// The set is closed: a new metric is added here and in the reducer table
/// of the pyramid builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Largest of the four values - preserves peaks (e.g. worst crossing cost)
    #[default]
    Maximum,
    /// Smallest of the four values
    Minimum,
    /// Arithmetic mean of the four values
    Average,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Maximum, Metric::Minimum, Metric::Average];

    /// Canonical name, as used in requests and persisted rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Maximum => "maximum",
            Metric::Minimum => "minimum",
            Metric::Average => "average",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = TerrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| TerrainError::UnknownMetric(s.to_string()))
    }
}
