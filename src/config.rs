//! Explicit pipeline configuration.
//!
//! Everything the original deployment kept as module-level globals (location
//! lists, output paths, retry constants) lives here and is passed into the
//! orchestrator at construction.

use crate::types::location::LatLon;
use bon::Builder;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default Open-Meteo forecast endpoint.
pub const DEFAULT_API_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Bounded-retry schedule for transient ingestion failures.
///
/// Delay before attempt `n + 1` is `base_delay * 2^(n-1)`, capped at
/// `max_delay` (defaults: 1s, 2s, 4s, ... up to 10s).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Backoff to sleep after a failed `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Configuration for a [`Pipeline`](crate::Pipeline).
///
/// # Examples
///
/// ```
/// use meteolake::{LatLon, PipelineConfig};
/// use std::collections::HashMap;
///
/// let config = PipelineConfig::builder()
///     .raw_root("data/raw")
///     .bronze_root("data/bronze")
///     .silver_root("data/silver")
///     .gold_root("data/gold")
///     .watermark_db("data/watermarks.db")
///     .locations(HashMap::from([
///         ("London".to_string(), LatLon(51.5074, -0.1278)),
///     ]))
///     .build();
/// assert!(!config.fail_fast);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct PipelineConfig {
    /// Landing dataset written by ingestion; the Bronze layer's upstream.
    #[builder(into)]
    pub raw_root: PathBuf,
    #[builder(into)]
    pub bronze_root: PathBuf,
    #[builder(into)]
    pub silver_root: PathBuf,
    #[builder(into)]
    pub gold_root: PathBuf,
    /// SQLite file backing the watermark store.
    #[builder(into)]
    pub watermark_db: PathBuf,
    /// Locations to ingest, keyed by name. Discovery downstream of the
    /// landing dataset never consults this list.
    #[builder(default)]
    pub locations: HashMap<String, LatLon>,
    #[builder(into, default = DEFAULT_API_URL.to_string())]
    pub api_url: String,
    #[builder(default = Duration::from_secs(10))]
    pub request_timeout: Duration,
    #[builder(default)]
    pub retry: RetryPolicy,
    /// Concurrency ceiling for in-flight fetches.
    #[builder(default = 8)]
    pub fetch_concurrency: usize,
    /// When true, the first partition failure aborts the run; otherwise the
    /// run continues and failures are reported in the summary.
    #[builder(default = false)]
    pub fail_fast: bool,
}
