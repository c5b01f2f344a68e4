//! Incremental medallion pipeline for weather observations.
//!
//! Observations are fetched per location from the Open-Meteo API, landed as
//! hive-partitioned parquet, and promoted through Bronze (typed raw), Silver
//! (cleaned) and Gold (aggregated) layers. Each layer processes only the
//! partitions its watermark store has not yet seen; output partitions are
//! committed atomically and watermarked strictly after the data is durable,
//! so a run can crash or be retried at any point without corrupting a layer.

mod catalog;
mod config;
mod error;
mod ingest;
mod layers;
mod orchestrator;
mod storage;
mod types;
mod watermark;

pub use error::MeteolakeError;

pub use catalog::{discover, CatalogError};
pub use config::{PipelineConfig, RetryPolicy, DEFAULT_API_URL};
pub use orchestrator::{LayerOutcome, Pipeline, RunFailure, RunSummary};

pub use ingest::client::{FetchOutcome, IngestClient};
pub use ingest::error::IngestError;
pub use ingest::landing::write_landing;

pub use layers::bronze::BronzeRule;
pub use layers::error::LayerError;
pub use layers::gold::GoldRule;
pub use layers::processor::LayerProcessor;
pub use layers::silver::SilverRule;
pub use layers::LayerRule;

pub use storage::dataset::{partition_dir, scan_partition, write_partition};
pub use storage::error::StorageError;

pub use types::location::LatLon;
pub use types::observation::{CurrentWeather, CurrentWeatherResponse, RawObservation};
pub use types::partition::{Layer, PartitionKey};

pub use watermark::error::WatermarkError;
pub use watermark::store::WatermarkStore;
