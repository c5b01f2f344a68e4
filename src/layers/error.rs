use crate::storage::error::StorageError;
use crate::types::partition::{Layer, PartitionKey};
use crate::watermark::error::WatermarkError;
use polars::error::PolarsError;
use thiserror::Error;

/// Partition-scoped processing failures. These are caught and isolated at the
/// orchestrator's per-partition loop; one partition failing never poisons the
/// others in a run.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("Empty {layer} partition for {key}")]
    EmptyPartition { layer: Layer, key: PartitionKey },

    #[error("{layer} aggregation produced null '{column}' for {key}")]
    NullAggregate {
        layer: Layer,
        key: PartitionKey,
        column: &'static str,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Watermark(#[from] WatermarkError),

    #[error("DataFrame operation failed")]
    Polars(#[from] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
