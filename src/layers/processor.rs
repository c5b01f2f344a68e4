//! The generic per-partition processor.
//!
//! Every layer goes through the same sequence for a key: scan exactly that
//! partition upstream, apply the layer's transform, validate the in-flight
//! result, commit the output partition atomically, and only then record the
//! watermark. The data-then-watermark order is the crash-safety invariant: a
//! crash in between leaves data without a watermark, which a later run simply
//! reprocesses and overwrites.

use crate::layers::error::LayerError;
use crate::layers::LayerRule;
use crate::storage::dataset;
use crate::types::partition::{Layer, PartitionKey};
use crate::watermark::store::WatermarkStore;
use chrono::Utc;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task;

pub struct LayerProcessor<R: LayerRule> {
    upstream_root: PathBuf,
    output_root: PathBuf,
    rule: R,
    watermarks: Arc<WatermarkStore>,
}

impl<R: LayerRule> LayerProcessor<R> {
    pub fn new(
        upstream_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        rule: R,
        watermarks: Arc<WatermarkStore>,
    ) -> Self {
        Self {
            upstream_root: upstream_root.into(),
            output_root: output_root.into(),
            rule,
            watermarks,
        }
    }

    pub fn layer(&self) -> Layer {
        self.rule.layer()
    }

    /// Process one partition end to end.
    ///
    /// Any error leaves the output dataset and the watermark store untouched
    /// for this key (the write itself is atomic, and the watermark is only
    /// recorded after the write returns).
    pub async fn process(&self, key: &PartitionKey) -> Result<(), LayerError> {
        let layer = self.rule.layer();
        info!("processing {} partition {}", layer, key);

        let frame = dataset::scan_partition(&self.upstream_root, key)?;
        let transformed = self.rule.transform(frame);
        let df = task::spawn_blocking(move || transformed.collect()).await??;

        self.rule.validate(&df, key)?;

        dataset::write_partition(&self.output_root, key, df).await?;
        self.watermarks.mark_done(layer, key, Utc::now())?;

        info!("finished {} partition {}", layer, key);
        Ok(())
    }
}
