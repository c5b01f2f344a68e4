//! Writes fetched observations into the raw landing dataset.
//!
//! The landing dataset is the Bronze layer's upstream: one hive partition per
//! (location, date), holding the observations exactly as ingested (dates and
//! timestamps as strings; the raw-to-typed cast is Bronze's job).

use crate::ingest::error::IngestError;
use crate::storage::dataset::{self, validate_location};
use crate::types::observation::RawObservation;
use crate::types::partition::PartitionKey;
use log::info;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

const TIME_FMT: &str = "%Y-%m-%dT%H:%M:%S";

/// Land `observations` under `root`, one partition per (location, date).
///
/// Returns the keys written. An empty batch writes nothing and returns an
/// empty list; partitions are replaced wholesale on rewrite.
pub async fn write_landing(
    root: &Path,
    observations: Vec<RawObservation>,
) -> Result<Vec<PartitionKey>, IngestError> {
    if observations.is_empty() {
        info!("no observations to land; skipping");
        return Ok(Vec::new());
    }

    let mut groups: BTreeMap<PartitionKey, Vec<RawObservation>> = BTreeMap::new();
    for obs in observations {
        validate_location(&obs.location)?;
        groups
            .entry(PartitionKey::new(obs.location.clone(), obs.date))
            .or_default()
            .push(obs);
    }

    let mut written = Vec::with_capacity(groups.len());
    for (key, group) in groups {
        let frame = landing_frame(&group)?;
        dataset::write_partition(root, &key, frame).await?;
        written.push(key);
    }
    info!("landed {} raw partition(s)", written.len());
    Ok(written)
}

fn landing_frame(group: &[RawObservation]) -> Result<DataFrame, PolarsError> {
    df!(
        "location" => group.iter().map(|o| o.location.clone()).collect::<Vec<_>>(),
        "date" => group.iter().map(|o| o.date.to_string()).collect::<Vec<_>>(),
        "observation_time" => group
            .iter()
            .map(|o| o.observation_time.format(TIME_FMT).to_string())
            .collect::<Vec<_>>(),
        "temperature" => group.iter().map(|o| o.temperature).collect::<Vec<_>>(),
        "humidity" => group.iter().map(|o| o.humidity).collect::<Vec<_>>(),
        "wind_speed" => group.iter().map(|o| o.wind_speed).collect::<Vec<_>>(),
        "wind_direction" => group.iter().map(|o| o.wind_direction).collect::<Vec<_>>(),
        "weather_code" => group.iter().map(|o| o.weather_code).collect::<Vec<_>>(),
        "latitude" => group.iter().map(|o| o.latitude).collect::<Vec<_>>(),
        "longitude" => group.iter().map(|o| o.longitude).collect::<Vec<_>>(),
        "ingestion_time" => group
            .iter()
            .map(|o| o.ingestion_time.format(TIME_FMT).to_string())
            .collect::<Vec<_>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::storage::error::StorageError;
    use chrono::NaiveDate;

    fn observation(location: &str, date: &str, temperature: Option<f64>) -> RawObservation {
        let date: NaiveDate = date.parse().unwrap();
        let observation_time = date.and_hms_opt(12, 0, 0).unwrap();
        RawObservation {
            location: location.to_string(),
            latitude: 51.5,
            longitude: -0.1,
            date,
            observation_time,
            temperature,
            humidity: Some(80.0),
            wind_speed: Some(10.0),
            wind_direction: Some(200.0),
            weather_code: Some(2),
            ingestion_time: observation_time,
        }
    }

    #[tokio::test]
    async fn lands_one_partition_per_location_date() {
        let root = tempfile::tempdir().unwrap();
        let written = write_landing(
            root.path(),
            vec![
                observation("London", "2024-01-01", Some(4.5)),
                observation("London", "2024-01-01", Some(5.0)),
                observation("Tokyo", "2024-01-01", Some(9.0)),
                observation("London", "2024-01-02", Some(3.0)),
            ],
        )
        .await
        .unwrap();

        assert_eq!(written.len(), 3);
        let discovered = catalog::discover(root.path()).unwrap();
        assert_eq!(
            discovered,
            written.iter().cloned().collect::<std::collections::HashSet<_>>()
        );

        let london = PartitionKey::new("London", "2024-01-01".parse().unwrap());
        let df = dataset::scan_partition(root.path(), &london)
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 11);
    }

    #[tokio::test]
    async fn empty_batch_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let landing_root = root.path().join("raw");

        let written = write_landing(&landing_root, Vec::new()).await.unwrap();
        assert!(written.is_empty());
        assert!(!landing_root.exists());
    }

    #[tokio::test]
    async fn bad_location_names_are_rejected_before_any_write() {
        let root = tempfile::tempdir().unwrap();
        let err = write_landing(
            root.path(),
            vec![observation("bad/name", "2024-01-01", Some(1.0))],
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            IngestError::Storage(StorageError::InvalidLocation(_))
        ));
    }
}
