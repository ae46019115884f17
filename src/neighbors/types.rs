use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::lenient;

/// Fraud label as it arrives from the index: usually an integer, sometimes a float, a
/// string or a boolean depending on who wrote the document metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NeighborLabel {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    /// Any other shape. Kept so one odd record does not fail the whole neighbor list.
    Other(JsonValue),
}

impl NeighborLabel {
    /// Integer value of the label, or `None` when it cannot be read as one.
    pub fn parse(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            Self::Float(_) => None,
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Text(s) => lenient::parse_integral(s),
            Self::Other(_) => None,
        }
    }
}

impl From<i64> for NeighborLabel {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// One retrieved historical case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborRecord {
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub transaction_id: Option<i64>,
    #[serde(default)]
    pub label: Option<NeighborLabel>,
    #[serde(default)]
    pub document: String,
    /// Smaller is more similar. `None` when retrieval produced no distance or one that
    /// is not a number.
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub distance: Option<f64>,
}

impl NeighborRecord {
    pub fn parsed_label(&self) -> Option<i64> {
        self.label.as_ref().and_then(NeighborLabel::parse)
    }
}

/// Labeled neighbor counts for one partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionStats {
    pub count: usize,
    pub fraud: usize,
    /// `fraud / count`; `None` (unknown, not "safe") when nothing was counted.
    pub rate: Option<f64>,
}

/// Precedent statistics over a retrieved neighbor set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborStats {
    pub max_distance_used: f64,
    pub all_neighbors: PartitionStats,
    pub close_neighbors: PartitionStats,
    /// Close rate when defined, else the all-neighbor rate.
    pub ui_rate: Option<f64>,
    pub close_rate: Option<f64>,
    pub close_count: usize,
}
