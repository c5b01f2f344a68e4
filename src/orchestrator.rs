//! The incremental pipeline orchestrator.
//!
//! One run ingests current observations into the raw landing dataset, then
//! drives each layer in fixed order (Bronze, Silver, Gold) over its pending
//! partitions. The pending set per layer is `discover(upstream)` minus the
//! layer's watermarks, or the full discovered set under a full refresh. Layer
//! order is load-bearing: each layer's catalog is derived from the previous
//! layer's committed output.

use crate::catalog;
use crate::config::PipelineConfig;
use crate::error::MeteolakeError;
use crate::ingest::client::IngestClient;
use crate::ingest::landing;
use crate::layers::bronze::BronzeRule;
use crate::layers::gold::GoldRule;
use crate::layers::processor::LayerProcessor;
use crate::layers::silver::SilverRule;
use crate::layers::LayerRule;
use crate::types::partition::{Layer, PartitionKey};
use crate::watermark::store::WatermarkStore;
use log::{error, info, warn};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-layer counts for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LayerOutcome {
    pub processed: usize,
    pub failed: usize,
    /// Discovered partitions that were already watermarked.
    pub skipped: usize,
}

/// One isolated partition failure, as recorded by a best-effort run.
#[derive(Debug, Clone)]
pub struct RunFailure {
    pub layer: Layer,
    pub key: PartitionKey,
    pub reason: String,
}

/// Aggregated outcome of one orchestrator run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub fetched: usize,
    pub fetch_failures: usize,
    pub bronze: LayerOutcome,
    pub silver: LayerOutcome,
    pub gold: LayerOutcome,
    pub failures: Vec<RunFailure>,
}

impl RunSummary {
    pub fn layer(&self, layer: Layer) -> &LayerOutcome {
        match layer {
            Layer::Bronze => &self.bronze,
            Layer::Silver => &self.silver,
            Layer::Gold => &self.gold,
        }
    }

    fn layer_mut(&mut self, layer: Layer) -> &mut LayerOutcome {
        match layer {
            Layer::Bronze => &mut self.bronze,
            Layer::Silver => &mut self.silver,
            Layer::Gold => &mut self.gold,
        }
    }

    pub fn total_processed(&self) -> usize {
        self.bronze.processed + self.silver.processed + self.gold.processed
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched {} ({} failed); ",
            self.fetched, self.fetch_failures
        )?;
        for layer in Layer::ordered() {
            let outcome = self.layer(layer);
            write!(
                f,
                "{}: {} processed, {} failed, {} skipped; ",
                layer, outcome.processed, outcome.failed, outcome.skipped
            )?;
        }
        Ok(())
    }
}

/// Drives the full ingest -> bronze -> silver -> gold pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    watermarks: Arc<WatermarkStore>,
    ingest: IngestClient,
    shutdown: CancellationToken,
}

impl Pipeline {
    /// Build a pipeline from its configuration. Opens (and if needed
    /// initializes) the watermark store.
    pub fn new(config: PipelineConfig) -> Result<Self, MeteolakeError> {
        let watermarks = Arc::new(WatermarkStore::open(&config.watermark_db)?);
        let ingest = IngestClient::new(
            config.api_url.clone(),
            config.request_timeout,
            config.retry,
            config.fetch_concurrency,
        )?;
        Ok(Self {
            config,
            watermarks,
            ingest,
            shutdown: CancellationToken::new(),
        })
    }

    /// Token observed between partitions: cancelling it stops the orchestrator
    /// from starting new partitions while letting the in-flight partition's
    /// write-then-watermark sequence finish.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn watermarks(&self) -> Arc<WatermarkStore> {
        Arc::clone(&self.watermarks)
    }

    /// One full incremental run: ingest, then process every layer.
    pub async fn run(&self, full_refresh: bool) -> Result<RunSummary, MeteolakeError> {
        let mut summary = RunSummary::default();

        info!("starting ingestion for {} location(s)", self.config.locations.len());
        let outcome = self.ingest.fetch_all(&self.config.locations).await;
        summary.fetched = outcome.observations.len();
        summary.fetch_failures = outcome.failures.len();

        if outcome.is_empty() {
            warn!("no observations fetched; bronze will find nothing new");
        } else {
            landing::write_landing(&self.config.raw_root, outcome.observations).await?;
        }

        self.run_layers_into(full_refresh, &mut summary).await?;
        Ok(summary)
    }

    /// Process the layers without ingesting, e.g. when landing data is
    /// produced out of band.
    pub async fn run_layers(&self, full_refresh: bool) -> Result<RunSummary, MeteolakeError> {
        let mut summary = RunSummary::default();
        self.run_layers_into(full_refresh, &mut summary).await?;
        Ok(summary)
    }

    async fn run_layers_into(
        &self,
        full_refresh: bool,
        summary: &mut RunSummary,
    ) -> Result<(), MeteolakeError> {
        let c = &self.config;
        self.run_layer(BronzeRule, &c.raw_root, &c.bronze_root, full_refresh, summary)
            .await?;
        self.run_layer(SilverRule, &c.bronze_root, &c.silver_root, full_refresh, summary)
            .await?;
        self.run_layer(GoldRule, &c.silver_root, &c.gold_root, full_refresh, summary)
            .await?;

        if summary.has_failures() {
            warn!("run finished with failures: {}", summary);
        } else {
            info!("run finished: {}", summary);
        }
        Ok(())
    }

    async fn run_layer<R: LayerRule>(
        &self,
        rule: R,
        upstream: &Path,
        output: &Path,
        full_refresh: bool,
        summary: &mut RunSummary,
    ) -> Result<(), MeteolakeError> {
        let layer = rule.layer();

        if self.shutdown.is_cancelled() {
            warn!("shutdown requested; {} layer not started", layer);
            return Ok(());
        }

        let discovered = catalog::discover(upstream)?;
        if discovered.is_empty() {
            info!("{}: no upstream partitions available; skipping", layer);
            return Ok(());
        }

        let total = discovered.len();
        let pending: Vec<PartitionKey> = if full_refresh {
            info!("{}: full refresh, reprocessing all {} partition(s)", layer, total);
            discovered.into_iter().collect()
        } else {
            let done = self.watermarks.all_done(layer)?;
            discovered.into_iter().filter(|k| !done.contains(k)).collect()
        };

        summary.layer_mut(layer).skipped = total - pending.len();
        info!("{}: {} partition(s) to process", layer, pending.len());

        let processor = LayerProcessor::new(upstream, output, rule, Arc::clone(&self.watermarks));
        for key in pending {
            if self.shutdown.is_cancelled() {
                warn!("shutdown requested; {} partition {} not started", layer, key);
                break;
            }
            match processor.process(&key).await {
                Ok(()) => summary.layer_mut(layer).processed += 1,
                Err(e) => {
                    error!("{} partition {} failed: {}", layer, key, e);
                    summary.layer_mut(layer).failed += 1;
                    summary.failures.push(RunFailure {
                        layer,
                        key: key.clone(),
                        reason: e.to_string(),
                    });
                    if self.config.fail_fast {
                        return Err(MeteolakeError::PartitionFailed {
                            layer,
                            key,
                            source: e,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::dataset;
    use crate::types::observation::RawObservation;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn key(location: &str, date: &str) -> PartitionKey {
        PartitionKey::new(location, date.parse::<NaiveDate>().unwrap())
    }

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

    fn test_config(dir: &Path, fail_fast: bool) -> PipelineConfig {
        PipelineConfig::builder()
            .raw_root(dir.join("raw"))
            .bronze_root(dir.join("bronze"))
            .silver_root(dir.join("silver"))
            .gold_root(dir.join("gold"))
            .watermark_db(dir.join("watermarks.db"))
            .fail_fast(fail_fast)
            .build()
    }

    fn pipeline(dir: &Path, fail_fast: bool) -> Pipeline {
        Pipeline::new(test_config(dir, fail_fast)).unwrap()
    }

    async fn land(dir: &Path, observations: Vec<crate::types::observation::RawObservation>) {
        landing::write_landing(&dir.join("raw"), observations)
            .await
            .unwrap();
    }

    fn gold_root(dir: &Path) -> PathBuf {
        dir.join("gold")
    }

    #[tokio::test]
    async fn concrete_two_location_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false);
        let a = key("A", "2024-01-01");
        let b = key("B", "2024-01-01");

        // B timed out during ingestion: only A lands.
        land(dir.path(), vec![observation("A", "2024-01-01", Some(4.5))]).await;

        let summary = pipeline.run_layers(false).await.unwrap();
        assert_eq!(summary.bronze.processed, 1);
        assert_eq!(summary.silver.processed, 1);
        assert_eq!(summary.gold.processed, 1);
        assert!(!summary.has_failures());

        let watermarks = pipeline.watermarks();
        for layer in Layer::ordered() {
            assert!(watermarks.is_done(layer, &a).unwrap());
            assert!(!watermarks.is_done(layer, &b).unwrap());
        }

        let gold = dataset::scan_partition(&gold_root(dir.path()), &a)
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(gold.height(), 1);
        let stat = |name: &str| gold.column(name).unwrap().f64().unwrap().get(0).unwrap();
        assert_eq!(stat("avg_temp"), 4.5);
        assert_eq!(stat("min_temp"), 4.5);
        assert_eq!(stat("max_temp"), 4.5);
        assert_eq!(
            gold.column("record_count").unwrap().i64().unwrap().get(0),
            Some(1)
        );
    }

    #[tokio::test]
    async fn second_run_processes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false);
        land(
            dir.path(),
            vec![
                observation("London", "2024-01-01", Some(4.5)),
                observation("Tokyo", "2024-01-01", Some(9.0)),
            ],
        )
        .await;

        let first = pipeline.run_layers(false).await.unwrap();
        assert_eq!(first.total_processed(), 6);

        let second = pipeline.run_layers(false).await.unwrap();
        assert_eq!(second.total_processed(), 0);
        assert_eq!(second.bronze.skipped, 2);
        assert_eq!(second.silver.skipped, 2);
        assert_eq!(second.gold.skipped, 2);
    }

    #[tokio::test]
    async fn empty_landing_skips_every_layer() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false);

        let summary = pipeline.run_layers(false).await.unwrap();
        assert_eq!(summary.total_processed(), 0);
        assert!(!summary.has_failures());
        assert!(pipeline.watermarks().all_done(Layer::Bronze).unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_partition_does_not_poison_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false);
        let bad = key("London", "2024-01-01");
        let good = key("Tokyo", "2024-01-01");

        // London's only observation has no temperature: Bronze passes with a
        // warning, Silver's cleaning empties the partition and hard-fails.
        land(
            dir.path(),
            vec![
                observation("London", "2024-01-01", None),
                observation("Tokyo", "2024-01-01", Some(9.0)),
            ],
        )
        .await;

        let summary = pipeline.run_layers(false).await.unwrap();
        assert_eq!(summary.silver.failed, 1);
        assert_eq!(summary.silver.processed, 1);
        assert!(summary.has_failures());
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].layer, Layer::Silver);
        assert_eq!(summary.failures[0].key, bad);

        let watermarks = pipeline.watermarks();
        assert!(!watermarks.is_done(Layer::Silver, &bad).unwrap());
        assert!(watermarks.is_done(Layer::Silver, &good).unwrap());
        assert!(watermarks.is_done(Layer::Gold, &good).unwrap());
    }

    #[tokio::test]
    async fn fail_fast_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), true);
        land(dir.path(), vec![observation("London", "2024-01-01", None)]).await;

        let err = pipeline.run_layers(false).await.unwrap_err();
        assert!(matches!(
            err,
            MeteolakeError::PartitionFailed {
                layer: Layer::Silver,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn gold_watermarks_are_a_subset_of_silver() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false);
        land(
            dir.path(),
            vec![
                observation("London", "2024-01-01", None),
                observation("Tokyo", "2024-01-01", Some(9.0)),
                observation("Delhi", "2024-01-02", Some(30.0)),
            ],
        )
        .await;

        pipeline.run_layers(false).await.unwrap();

        let watermarks = pipeline.watermarks();
        let silver = watermarks.all_done(Layer::Silver).unwrap();
        let gold = watermarks.all_done(Layer::Gold).unwrap();
        assert!(gold.is_subset(&silver));
    }

    #[tokio::test]
    async fn full_refresh_reprocesses_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false);
        let k = key("London", "2024-01-01");

        land(dir.path(), vec![observation("London", "2024-01-01", Some(4.0))]).await;
        pipeline.run_layers(false).await.unwrap();

        // Upstream data changes, but watermarks say the key is done.
        land(dir.path(), vec![observation("London", "2024-01-01", Some(10.0))]).await;
        let incremental = pipeline.run_layers(false).await.unwrap();
        assert_eq!(incremental.total_processed(), 0);

        let refreshed = pipeline.run_layers(true).await.unwrap();
        assert_eq!(refreshed.total_processed(), 3);
        assert_eq!(refreshed.bronze.skipped, 0);

        let gold = dataset::scan_partition(&gold_root(dir.path()), &k)
            .unwrap()
            .collect()
            .unwrap();
        // Replaced wholesale: one summary row reflecting only the new data.
        assert_eq!(gold.height(), 1);
        assert_eq!(
            gold.column("avg_temp").unwrap().f64().unwrap().get(0),
            Some(10.0)
        );
    }

    #[tokio::test]
    async fn data_without_watermark_is_reprocessed() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false);
        land(dir.path(), vec![observation("London", "2024-01-01", Some(4.0))]).await;
        pipeline.run_layers(false).await.unwrap();

        // Simulate a crash between the bronze write and its watermark: the
        // data exists but the watermark does not.
        pipeline.watermarks().clear(Layer::Bronze).unwrap();

        let summary = pipeline.run_layers(false).await.unwrap();
        assert_eq!(summary.bronze.processed, 1);
        // Downstream layers were already watermarked and stay skipped.
        assert_eq!(summary.silver.processed, 0);
        assert_eq!(summary.gold.processed, 0);
    }

    #[tokio::test]
    async fn cancelled_token_stops_new_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false);
        land(
            dir.path(),
            vec![
                observation("London", "2024-01-01", Some(4.0)),
                observation("Tokyo", "2024-01-01", Some(9.0)),
            ],
        )
        .await;

        pipeline.shutdown_token().cancel();
        let summary = pipeline.run_layers(false).await.unwrap();
        assert_eq!(summary.total_processed(), 0);
        assert!(pipeline.watermarks().all_done(Layer::Bronze).unwrap().is_empty());
    }

    #[tokio::test]
    async fn shutdown_finishes_in_flight_partitions_before_stopping() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), false);
        land(
            dir.path(),
            vec![
                observation("London", "2024-01-01", Some(4.0)),
                observation("Tokyo", "2024-01-01", Some(9.0)),
            ],
        )
        .await;

        // Cancel as soon as the first bronze watermark lands, i.e. while the
        // second bronze partition is in flight.
        let token = pipeline.shutdown_token();
        let watermarks = pipeline.watermarks();
        tokio::spawn(async move {
            loop {
                if !watermarks.all_done(Layer::Bronze).unwrap().is_empty() {
                    token.cancel();
                    break;
                }
                tokio::task::yield_now().await;
            }
        });

        let summary = pipeline.run_layers(false).await.unwrap();
        assert!(!summary.has_failures());

        // The partition already in flight when the token was cancelled still
        // finished its write-then-watermark sequence.
        assert_eq!(summary.bronze.processed, 2);
        assert_eq!(pipeline.watermarks().all_done(Layer::Bronze).unwrap().len(), 2);

        // No later layer started after the cancellation.
        assert_eq!(summary.silver.processed, 0);
        assert_eq!(summary.silver.failed, 0);
        assert!(pipeline.watermarks().all_done(Layer::Silver).unwrap().is_empty());
        assert!(pipeline.watermarks().all_done(Layer::Gold).unwrap().is_empty());
    }
}
