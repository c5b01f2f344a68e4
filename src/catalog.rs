//! Partition discovery over a hive-partitioned dataset root.
//!
//! The catalog is read-only: it enumerates the (location, date) pairs that are
//! physically present on disk. Locations are never configured here; a
//! partition exists because its directory and parquet file exist.

use crate::storage::dataset::PARTITION_FILE_NAME;
use crate::types::partition::PartitionKey;
use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read dataset directory '{0}'")]
    ReadDir(PathBuf, #[source] io::Error),
}

/// Enumerate the distinct partition keys present under `root`.
///
/// A key counts as present only when its leaf holds a committed
/// `weather.parquet` file. A missing `root` is the normal state before any
/// data has been written to a layer and yields an empty set. Entries that do
/// not follow the `location=<x>/date=<y>` convention (staging directories,
/// stray files) are skipped.
pub fn discover(root: &Path) -> Result<HashSet<PartitionKey>, CatalogError> {
    let mut keys = HashSet::new();

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("dataset root {:?} does not exist yet; nothing discovered", root);
            return Ok(keys);
        }
        Err(e) => return Err(CatalogError::ReadDir(root.to_path_buf(), e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| CatalogError::ReadDir(root.to_path_buf(), e))?;
        let Some(location) = hive_value(&entry.path(), "location=") else {
            debug!("skipping non-partition entry {:?}", entry.path());
            continue;
        };

        let location_dir = entry.path();
        let date_entries = fs::read_dir(&location_dir)
            .map_err(|e| CatalogError::ReadDir(location_dir.clone(), e))?;

        for date_entry in date_entries {
            let date_entry =
                date_entry.map_err(|e| CatalogError::ReadDir(location_dir.clone(), e))?;
            let Some(date_str) = hive_value(&date_entry.path(), "date=") else {
                debug!("skipping non-partition entry {:?}", date_entry.path());
                continue;
            };
            let Ok(date) = date_str.parse::<NaiveDate>() else {
                warn!(
                    "skipping partition with unparsable date {:?}",
                    date_entry.path()
                );
                continue;
            };
            if !date_entry.path().join(PARTITION_FILE_NAME).is_file() {
                debug!("skipping empty partition leaf {:?}", date_entry.path());
                continue;
            }
            keys.insert(PartitionKey::new(location.clone(), date));
        }
    }

    Ok(keys)
}

/// Extract the value from a `key=value` directory name, if `path` is a
/// directory matching `prefix`.
fn hive_value(path: &Path, prefix: &str) -> Option<String> {
    if !path.is_dir() {
        return None;
    }
    path.file_name()?
        .to_str()?
        .strip_prefix(prefix)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit_leaf(root: &Path, location: &str, date: &str) {
        let leaf = root
            .join(format!("location={location}"))
            .join(format!("date={date}"));
        fs::create_dir_all(&leaf).unwrap();
        fs::write(leaf.join(PARTITION_FILE_NAME), b"parquet").unwrap();
    }

    #[test]
    fn missing_root_yields_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let keys = discover(&dir.path().join("does-not-exist")).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn discovers_committed_partitions() {
        let dir = tempfile::tempdir().unwrap();
        commit_leaf(dir.path(), "London", "2024-01-01");
        commit_leaf(dir.path(), "London", "2024-01-02");
        commit_leaf(dir.path(), "Tokyo", "2024-01-01");

        let keys = discover(dir.path()).unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains(&PartitionKey::new(
            "London",
            "2024-01-02".parse().unwrap()
        )));
    }

    #[test]
    fn skips_uncommitted_and_malformed_entries() {
        let dir = tempfile::tempdir().unwrap();
        commit_leaf(dir.path(), "London", "2024-01-01");

        // Leaf directory without a committed parquet file.
        fs::create_dir_all(
            dir.path()
                .join("location=Tokyo")
                .join("date=2024-01-01"),
        )
        .unwrap();
        // Unparsable date value.
        commit_leaf(dir.path(), "Delhi", "not-a-date");
        // Staging directory and a stray file at the root.
        fs::create_dir_all(dir.path().join(".staging-abc123")).unwrap();
        fs::write(dir.path().join("README.txt"), b"hi").unwrap();

        let keys = discover(dir.path()).unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&PartitionKey::new(
            "London",
            "2024-01-01".parse().unwrap()
        )));
    }
}
