//! Physical partition I/O for hive-partitioned parquet datasets.
//!
//! Layout per layer root: `location=<L>/date=<YYYY-MM-DD>/weather.parquet`.
//! Reads are scoped to a single partition leaf with a parameterized guard
//! predicate; writes stage into a temporary directory inside the dataset root
//! and swap it into place, so readers never observe a partial partition.

use crate::storage::error::StorageError;
use crate::types::partition::PartitionKey;
use log::info;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tokio::task;

/// The single columnar file inside every partition leaf directory.
pub const PARTITION_FILE_NAME: &str = "weather.parquet";

/// Prefix of staging directories created during a partition write. Staging
/// dirs live inside the dataset root so the final rename stays on one
/// filesystem; discovery ignores them.
const STAGING_PREFIX: &str = ".staging-";

/// Leaf directory for `key` under `root`.
pub fn partition_dir(root: &Path, key: &PartitionKey) -> PathBuf {
    root.join(format!("location={}", key.location))
        .join(format!("date={}", key.date))
}

/// Reject location values that cannot be encoded as a hive directory name.
pub fn validate_location(location: &str) -> Result<(), StorageError> {
    if location.is_empty() || location.contains('/') || location.starts_with('.') {
        return Err(StorageError::InvalidLocation(location.to_string()));
    }
    Ok(())
}

/// Lazily scan exactly one partition of a dataset.
///
/// Only the key's leaf file is opened (partition pruning by construction),
/// and a `col()`/`lit()` guard predicate re-asserts the key on the row level.
/// Values are never interpolated into a query string.
pub fn scan_partition(root: &Path, key: &PartitionKey) -> Result<LazyFrame, StorageError> {
    let file = partition_dir(root, key).join(PARTITION_FILE_NAME);
    if !file.is_file() {
        return Err(StorageError::MissingPartition(file));
    }

    let frame = LazyFrame::scan_parquet(&file, Default::default())
        .map_err(|e| StorageError::Scan(file, e))?;

    Ok(frame.filter(
        col("location").eq(lit(key.location.as_str())).and(
            col("date")
                .cast(DataType::Date)
                .eq(lit(key.date)),
        ),
    ))
}

/// Durably write `df` as the partition for `key`, replacing any previous
/// contents of that partition wholesale.
///
/// The parquet file is written into a fresh staging directory inside `root`,
/// then the staging directory is renamed over the partition leaf. A crash at
/// any point leaves either the old partition or the new one, never a mix.
pub async fn write_partition(
    root: &Path,
    key: &PartitionKey,
    mut df: DataFrame,
) -> Result<(), StorageError> {
    validate_location(&key.location)?;

    let root = root.to_path_buf();
    let key = key.clone();

    task::spawn_blocking(move || {
        std::fs::create_dir_all(&root)
            .map_err(|e| StorageError::WriteIo(root.clone(), e))?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&root)
            .map_err(|e| StorageError::WriteIo(root.clone(), e))?;

        let staged_file = staging.path().join(PARTITION_FILE_NAME);
        let file = std::fs::File::create(&staged_file)
            .map_err(|e| StorageError::WriteIo(staged_file.clone(), e))?;
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Snappy)
            .finish(&mut df)
            .map_err(|e| StorageError::WriteParquet(staged_file.clone(), e))?;

        let leaf = partition_dir(&root, &key);
        if let Some(parent) = leaf.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::WriteIo(parent.to_path_buf(), e))?;
        }
        if leaf.exists() {
            std::fs::remove_dir_all(&leaf)
                .map_err(|e| StorageError::WriteIo(leaf.clone(), e))?;
        }
        std::fs::rename(staging.into_path(), &leaf)
            .map_err(|e| StorageError::WriteIo(leaf.clone(), e))?;

        info!("written partition {} -> {:?}", key, leaf);
        Ok::<(), StorageError>(())
    })
    .await??;
    Ok(())
}
