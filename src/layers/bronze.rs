//! Bronze: raw landing rows cast to the typed schema, otherwise untouched.

use crate::layers::error::LayerError;
use crate::layers::{require_non_empty, LayerRule};
use crate::types::partition::{Layer, PartitionKey};
use log::warn;
use polars::prelude::*;

/// Measurement columns checked by the soft data-quality gate. Nulls here are
/// logged but do not block the write; Silver's cleaning step deals with them.
const MEASUREMENT_COLUMNS: [&str; 5] = [
    "temperature",
    "humidity",
    "wind_speed",
    "wind_direction",
    "weather_code",
];

pub struct BronzeRule;

impl LayerRule for BronzeRule {
    fn layer(&self) -> Layer {
        Layer::Bronze
    }

    fn transform(&self, frame: LazyFrame) -> LazyFrame {
        frame.select([
            col("location"),
            col("date").cast(DataType::Date),
            col("observation_time").cast(DataType::Datetime(TimeUnit::Milliseconds, None)),
            col("temperature").cast(DataType::Float64),
            col("humidity").cast(DataType::Float64),
            col("wind_speed").cast(DataType::Float64),
            col("wind_direction").cast(DataType::Float64),
            col("weather_code").cast(DataType::Int64),
            col("latitude").cast(DataType::Float64),
            col("longitude").cast(DataType::Float64),
            col("ingestion_time").cast(DataType::Datetime(TimeUnit::Milliseconds, None)),
        ])
    }

    fn validate(&self, df: &DataFrame, key: &PartitionKey) -> Result<(), LayerError> {
        require_non_empty(self.layer(), df, key)?;

        for column in MEASUREMENT_COLUMNS {
            let nulls = df.column(column)?.null_count();
            if nulls > 0 {
                warn!(
                    "bronze partition {}: {} null value(s) in '{}'",
                    key, nulls, column
                );
            }
        }
        Ok(())
    }
}
