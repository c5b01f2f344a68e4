use crate::catalog::CatalogError;
use crate::ingest::error::IngestError;
use crate::layers::error::LayerError;
use crate::types::partition::{Layer, PartitionKey};
use crate::watermark::error::WatermarkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeteolakeError {
    #[error(transparent)]
    Watermark(#[from] WatermarkError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// Raised only under fail-fast policy; best-effort runs record partition
    /// failures in the run summary instead.
    #[error("{layer} partition {key} failed")]
    PartitionFailed {
        layer: Layer,
        key: PartitionKey,
        #[source]
        source: LayerError,
    },
}
