//! Layer transforms and the generic partition processor.
//!
//! Each medallion layer is a [`LayerRule`] strategy value: a transform over a
//! lazily scanned upstream partition plus a validation policy over the
//! transformed result. [`processor::LayerProcessor`] drives any rule through
//! the same scan -> transform -> validate -> write -> watermark sequence.

pub mod bronze;
pub mod error;
pub mod gold;
pub mod processor;
pub mod silver;

use crate::types::partition::{Layer, PartitionKey};
use error::LayerError;
use polars::prelude::{DataFrame, LazyFrame};

/// Per-layer transform and validation policy.
pub trait LayerRule: Send + Sync {
    fn layer(&self) -> Layer;

    /// Build the layer's transform over one upstream partition. Errors in the
    /// expressions surface when the frame is collected.
    fn transform(&self, frame: LazyFrame) -> LazyFrame;

    /// Gate the in-flight transformed result. Runs strictly before the write,
    /// so a hard failure here means nothing is committed for this partition.
    fn validate(&self, df: &DataFrame, key: &PartitionKey) -> Result<(), LayerError>;
}

/// Hard gate shared by every layer: a partition that transformed to zero rows
/// is never written or watermarked.
fn require_non_empty(
    layer: Layer,
    df: &DataFrame,
    key: &PartitionKey,
) -> Result<(), LayerError> {
    if df.height() == 0 {
        return Err(LayerError::EmptyPartition {
            layer,
            key: key.clone(),
        });
    }
    Ok(())
}
