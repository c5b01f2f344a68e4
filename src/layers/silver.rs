//! Silver: cleaned rows. Temperature is the primary measurement; rows without
//! one are dropped, and the partition date is normalized to a real `Date`.

use crate::layers::error::LayerError;
use crate::layers::{require_non_empty, LayerRule};
use crate::types::partition::{Layer, PartitionKey};
use polars::prelude::*;

pub struct SilverRule;

impl LayerRule for SilverRule {
    fn layer(&self) -> Layer {
        Layer::Silver
    }

    fn transform(&self, frame: LazyFrame) -> LazyFrame {
        frame
            .filter(col("temperature").is_not_null())
            .select([
                col("location"),
                col("date").cast(DataType::Date),
                col("observation_time"),
                col("temperature"),
                col("humidity"),
                col("wind_speed"),
                col("wind_direction"),
                col("weather_code"),
            ])
    }

    fn validate(&self, df: &DataFrame, key: &PartitionKey) -> Result<(), LayerError> {
        require_non_empty(self.layer(), df, key)
    }
}
