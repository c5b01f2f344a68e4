//! Core identifiers for the medallion pipeline: the [`Layer`] a dataset lives
//! in and the [`PartitionKey`] naming one unit of work within a layer.

use chrono::NaiveDate;
use std::fmt;

/// One stage of the medallion pipeline.
///
/// Data flows through the layers in a fixed order: raw observations land in
/// front of [`Layer::Bronze`], Bronze output feeds [`Layer::Silver`], and
/// Silver output feeds [`Layer::Gold`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Raw observations cast to the typed schema, otherwise untouched.
    Bronze,
    /// Cleaned rows; records without a primary temperature measurement are dropped.
    Silver,
    /// One aggregated summary row per partition key.
    Gold,
}

impl Layer {
    /// Stable identifier used in the watermark table and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Bronze => "bronze",
            Layer::Silver => "silver",
            Layer::Gold => "gold",
        }
    }

    /// Layers in processing order. Each layer's catalog is derived from the
    /// previous layer's committed output, so this order is load-bearing.
    pub fn ordered() -> [Layer; 3] {
        [Layer::Bronze, Layer::Silver, Layer::Gold]
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifies one physical partition: all observations for a single location
/// on a single calendar date.
///
/// Keys are compared and hashed as a pair; pending-set arithmetic treats them
/// as an unordered set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub location: String,
    pub date: NaiveDate,
}

impl PartitionKey {
    pub fn new(location: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            location: location.into(),
            date,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.location, self.date)
    }
}
