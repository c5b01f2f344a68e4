use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid location name '{0}' (must be non-empty, no '/', no leading '.')")]
    InvalidLocation(String),

    #[error("Upstream partition file '{0}' does not exist")]
    MissingPartition(PathBuf),

    #[error("Failed to scan parquet partition '{0}'")]
    Scan(PathBuf, #[source] PolarsError),

    #[error("I/O error writing partition under '{0}'")]
    WriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing parquet file '{0}'")]
    WriteParquet(PathBuf, #[source] PolarsError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}
