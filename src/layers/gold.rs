//! Gold: one summary row per partition key, aggregated from Silver.

use crate::layers::error::LayerError;
use crate::layers::{require_non_empty, LayerRule};
use crate::types::partition::{Layer, PartitionKey};
use polars::prelude::*;

/// Aggregated measurements that must never be null. A null here means the
/// upstream partition violated an integrity assumption (e.g. every humidity
/// reading missing) and aggregation must not absorb it silently.
const AGGREGATE_COLUMNS: [&str; 4] = ["avg_temp", "min_temp", "max_temp", "avg_humidity"];

pub struct GoldRule;

impl LayerRule for GoldRule {
    fn layer(&self) -> Layer {
        Layer::Gold
    }

    fn transform(&self, frame: LazyFrame) -> LazyFrame {
        frame
            .group_by([col("location"), col("date").cast(DataType::Date)])
            .agg([
                col("temperature").mean().alias("avg_temp"),
                col("temperature").min().alias("min_temp"),
                col("temperature").max().alias("max_temp"),
                col("humidity").mean().alias("avg_humidity"),
                len().cast(DataType::Int64).alias("record_count"),
            ])
    }

    fn validate(&self, df: &DataFrame, key: &PartitionKey) -> Result<(), LayerError> {
        require_non_empty(self.layer(), df, key)?;

        for column in AGGREGATE_COLUMNS {
            if df.column(column)?.null_count() > 0 {
                return Err(LayerError::NullAggregate {
                    layer: self.layer(),
                    key: key.clone(),
                    column,
                });
            }
        }
        Ok(())
    }
}
