//! Runs one incremental pipeline pass over the default four cities.
//!
//! Usage: `cargo run --example run_pipeline [-- --full-refresh]`
//! Data lands under `./data`; pass `--full-refresh` to reprocess every
//! discovered partition. Ctrl-C stops the run between partitions.

use log::{error, warn};
use meteolake::{LatLon, Pipeline, PipelineConfig};
use std::collections::HashMap;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let full_refresh = std::env::args().any(|arg| arg == "--full-refresh");

    let locations = HashMap::from([
        ("London".to_string(), LatLon(51.5074, -0.1278)),
        ("NewYork".to_string(), LatLon(40.7128, -74.0060)),
        ("Tokyo".to_string(), LatLon(35.6762, 139.6503)),
        ("Delhi".to_string(), LatLon(28.6139, 77.2090)),
    ]);

    let config = PipelineConfig::builder()
        .raw_root("data/raw")
        .bronze_root("data/bronze")
        .silver_root("data/silver")
        .gold_root("data/gold")
        .watermark_db("data/watermarks.db")
        .locations(locations)
        .build();

    let pipeline = match Pipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("failed to build pipeline: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = pipeline.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("shutdown signal received; finishing in-flight partition");
            shutdown.cancel();
        }
    });

    match pipeline.run(full_refresh).await {
        Ok(summary) if summary.has_failures() => {
            error!(
                "run finished with {} failed partition(s): {}",
                summary.failures.len(),
                summary
            );
            ExitCode::FAILURE
        }
        Ok(summary) => {
            log::info!("{summary}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("run aborted: {e}");
            ExitCode::FAILURE
        }
    }
}
