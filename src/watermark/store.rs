//! SQLite-backed watermark table.
//!
//! A watermark row exists for (layer, location, date) iff that partition's
//! output was durably written and passed validation. The store is the single
//! source of truth for "already done" when the orchestrator computes its
//! pending set. Uses a `Mutex<Connection>` for thread safety; upserts touch a
//! single row keyed by the primary key, so concurrent writers for different
//! partitions never contend on data.

use crate::types::partition::{Layer, PartitionKey};
use crate::watermark::error::WatermarkError;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Timestamp format stored in the `completed_at` column (UTC, no suffix).
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Idempotent DDL, safe to run on every open.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS watermarks (
    layer TEXT NOT NULL,
    location TEXT NOT NULL,
    date TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    PRIMARY KEY (layer, location, date)
);
";

/// Persistent record of which partitions each layer has completed.
pub struct WatermarkStore {
    conn: Mutex<Connection>,
}

impl WatermarkStore {
    /// Open or create the watermark database at `path`.
    ///
    /// Creates parent directories and runs the idempotent DDL, so the first
    /// run and every later run go through the same call.
    pub fn open(path: &Path) -> Result<Self, WatermarkError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| WatermarkError::DirCreation(parent.to_path_buf(), e))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| WatermarkError::Open(path.to_path_buf(), e))?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used by tests.
    pub fn in_memory() -> Result<Self, WatermarkError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a watermark exists for (layer, key).
    pub fn is_done(&self, layer: Layer, key: &PartitionKey) -> Result<bool, WatermarkError> {
        let found = self
            .conn()
            .query_row(
                "SELECT 1 FROM watermarks WHERE layer = ?1 AND location = ?2 AND date = ?3",
                params![layer.as_str(), key.location, key.date.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// All partition keys watermarked at `layer`.
    pub fn all_done(&self, layer: Layer) -> Result<HashSet<PartitionKey>, WatermarkError> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT location, date FROM watermarks WHERE layer = ?1")?;
        let rows = stmt.query_map([layer.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut keys = HashSet::new();
        for row in rows {
            let (location, date) = row?;
            let date = date
                .parse()
                .map_err(|e| WatermarkError::CorruptDate { value: date, source: e })?;
            keys.insert(PartitionKey::new(location, date));
        }
        Ok(keys)
    }

    /// Record (layer, key) as done at `completed_at`.
    ///
    /// Idempotent upsert; last write wins. Callers must only invoke this
    /// after the partition's output has been durably written.
    pub fn mark_done(
        &self,
        layer: Layer,
        key: &PartitionKey,
        completed_at: DateTime<Utc>,
    ) -> Result<(), WatermarkError> {
        self.conn().execute(
            "INSERT INTO watermarks (layer, location, date, completed_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (layer, location, date)
             DO UPDATE SET completed_at = excluded.completed_at",
            params![
                layer.as_str(),
                key.location,
                key.date.to_string(),
                completed_at.format(DATETIME_FMT).to_string()
            ],
        )?;
        Ok(())
    }

    /// When (layer, key) completed, if ever.
    pub fn completed_at(
        &self,
        layer: Layer,
        key: &PartitionKey,
    ) -> Result<Option<DateTime<Utc>>, WatermarkError> {
        let value: Option<String> = self
            .conn()
            .query_row(
                "SELECT completed_at FROM watermarks
                 WHERE layer = ?1 AND location = ?2 AND date = ?3",
                params![layer.as_str(), key.location, key.date.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        value
            .map(|v| {
                NaiveDateTime::parse_from_str(&v, DATETIME_FMT)
                    .map(|naive| naive.and_utc())
                    .map_err(|e| WatermarkError::CorruptTimestamp { value: v, source: e })
            })
            .transpose()
    }

    /// Remove all watermarks for a layer.
    pub fn clear(&self, layer: Layer) -> Result<(), WatermarkError> {
        self.conn()
            .execute("DELETE FROM watermarks WHERE layer = ?1", [layer.as_str()])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key(location: &str, date: &str) -> PartitionKey {
        PartitionKey::new(location, date.parse().unwrap())
    }

    #[test]
    fn open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("watermarks.db");

        let store = WatermarkStore::open(&path).unwrap();
        store
            .mark_done(Layer::Bronze, &key("London", "2024-01-01"), Utc::now())
            .unwrap();
        drop(store);

        // Reopening must not error or lose rows.
        let store = WatermarkStore::open(&path).unwrap();
        assert!(store
            .is_done(Layer::Bronze, &key("London", "2024-01-01"))
            .unwrap());
    }

    #[test]
    fn mark_done_is_scoped_to_layer_and_key() {
        let store = WatermarkStore::in_memory().unwrap();
        let london = key("London", "2024-01-01");

        store.mark_done(Layer::Bronze, &london, Utc::now()).unwrap();

        assert!(store.is_done(Layer::Bronze, &london).unwrap());
        assert!(!store.is_done(Layer::Silver, &london).unwrap());
        assert!(!store
            .is_done(Layer::Bronze, &key("Tokyo", "2024-01-01"))
            .unwrap());
        assert!(!store
            .is_done(Layer::Bronze, &key("London", "2024-01-02"))
            .unwrap());
    }

    #[test]
    fn all_done_returns_layer_key_set() {
        let store = WatermarkStore::in_memory().unwrap();
        store
            .mark_done(Layer::Silver, &key("London", "2024-01-01"), Utc::now())
            .unwrap();
        store
            .mark_done(Layer::Silver, &key("Tokyo", "2024-01-02"), Utc::now())
            .unwrap();
        store
            .mark_done(Layer::Gold, &key("Delhi", "2024-01-01"), Utc::now())
            .unwrap();

        let silver = store.all_done(Layer::Silver).unwrap();
        assert_eq!(silver.len(), 2);
        assert!(silver.contains(&key("London", "2024-01-01")));
        assert!(silver.contains(&key("Tokyo", "2024-01-02")));

        assert!(store.all_done(Layer::Bronze).unwrap().is_empty());
    }

    #[test]
    fn upsert_keeps_last_timestamp() {
        let store = WatermarkStore::in_memory().unwrap();
        let k = key("London", "2024-01-01");

        let first = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();

        store.mark_done(Layer::Gold, &k, first).unwrap();
        store.mark_done(Layer::Gold, &k, second).unwrap();

        assert_eq!(store.completed_at(Layer::Gold, &k).unwrap(), Some(second));
        assert_eq!(store.all_done(Layer::Gold).unwrap().len(), 1);
    }

    #[test]
    fn clear_removes_only_that_layer() {
        let store = WatermarkStore::in_memory().unwrap();
        let k = key("London", "2024-01-01");
        store.mark_done(Layer::Bronze, &k, Utc::now()).unwrap();
        store.mark_done(Layer::Silver, &k, Utc::now()).unwrap();

        store.clear(Layer::Bronze).unwrap();

        assert!(!store.is_done(Layer::Bronze, &k).unwrap());
        assert!(store.is_done(Layer::Silver, &k).unwrap());
    }

    #[test]
    fn completed_at_is_none_when_unmarked() {
        let store = WatermarkStore::in_memory().unwrap();
        assert_eq!(
            store
                .completed_at(Layer::Bronze, &key("London", "2024-01-01"))
                .unwrap(),
            None
        );
    }
}
