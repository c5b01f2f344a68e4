//! Concurrent ingestion of current-weather observations.
//!
//! Each location is fetched independently with bounded retry and exponential
//! backoff; one location timing out repeatedly never affects the others. The
//! outcome keeps successes and failures side by side so the caller can
//! distinguish a partial success from an empty run.

use crate::config::RetryPolicy;
use crate::ingest::error::IngestError;
use crate::types::location::LatLon;
use crate::types::observation::{CurrentWeatherResponse, RawObservation};
use chrono::{NaiveDateTime, Utc};
use futures_util::{stream, StreamExt};
use log::{error, info, warn};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// Fields requested from the `current` block.
const CURRENT_FIELDS: &str =
    "temperature_2m,relative_humidity_2m,wind_speed_10m,wind_direction_10m,weather_code";

/// Result of one ingestion pass over all configured locations.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub observations: Vec<RawObservation>,
    pub failures: Vec<(String, IngestError)>,
}

impl FetchOutcome {
    /// True when not a single location produced an observation. The Bronze
    /// ingestion step skips cleanly in that case.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// HTTP client for the Open-Meteo current-weather endpoint.
pub struct IngestClient {
    http: Client,
    api_url: String,
    retry: RetryPolicy,
    concurrency: usize,
}

impl IngestClient {
    pub fn new(
        api_url: impl Into<String>,
        request_timeout: Duration,
        retry: RetryPolicy,
        concurrency: usize,
    ) -> Result<Self, IngestError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(IngestError::ClientBuild)?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            retry,
            concurrency: concurrency.max(1),
        })
    }

    /// Fetch all locations concurrently, bounded by the configured
    /// concurrency ceiling. Individual failures are collected, not raised.
    pub async fn fetch_all(&self, locations: &HashMap<String, LatLon>) -> FetchOutcome {
        let fetches = locations.iter().map(|(name, coords)| {
            let name = name.clone();
            let coords = *coords;
            async move {
                let result = self.fetch_location(&name, coords).await;
                (name, result)
            }
        });

        let results: Vec<(String, Result<RawObservation, IngestError>)> =
            stream::iter(fetches)
                .buffer_unordered(self.concurrency)
                .collect()
                .await;

        let mut outcome = FetchOutcome::default();
        for (name, result) in results {
            match result {
                Ok(observation) => outcome.observations.push(observation),
                Err(e) => {
                    error!("ingestion failed for '{}': {}", name, e);
                    outcome.failures.push((name, e));
                }
            }
        }
        info!(
            "ingestion finished: {} fetched, {} failed",
            outcome.observations.len(),
            outcome.failures.len()
        );
        outcome
    }

    /// Fetch one location with bounded retry on timeout-class errors only.
    async fn fetch_location(
        &self,
        location: &str,
        coords: LatLon,
    ) -> Result<RawObservation, IngestError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let err = match self.fetch_once(location, coords).await {
                Ok(observation) => return Ok(observation),
                Err(e) => e,
            };

            if !is_transient(&err) {
                return Err(err);
            }
            if attempt >= self.retry.max_attempts {
                return Err(match err {
                    IngestError::Request { source, .. } => IngestError::RetriesExhausted {
                        location: location.to_string(),
                        attempts: attempt,
                        source,
                    },
                    other => other,
                });
            }

            let delay = self.retry.delay_for(attempt);
            warn!(
                "transient fetch failure for '{}' (attempt {}/{}): {}; retrying in {:?}",
                location, attempt, self.retry.max_attempts, err, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn fetch_once(
        &self,
        location: &str,
        coords: LatLon,
    ) -> Result<RawObservation, IngestError> {
        let response = self
            .http
            .get(&self.api_url)
            .query(&[
                ("latitude", coords.0.to_string()),
                ("longitude", coords.1.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
            ])
            .send()
            .await
            .map_err(|e| IngestError::Request {
                url: self.api_url.clone(),
                source: e,
            })?;

        let response = response.error_for_status().map_err(|e| {
            if let Some(status) = e.status() {
                IngestError::HttpStatus {
                    url: self.api_url.clone(),
                    status,
                    source: e,
                }
            } else {
                IngestError::Request {
                    url: self.api_url.clone(),
                    source: e,
                }
            }
        })?;

        let body: CurrentWeatherResponse =
            response.json().await.map_err(|e| IngestError::Decode {
                location: location.to_string(),
                source: e,
            })?;

        observation_from(location, body, Utc::now().naive_utc())
    }
}

/// Only network timeouts and connection failures are worth retrying; HTTP
/// status and decode errors fail the location immediately.
fn is_transient(err: &IngestError) -> bool {
    matches!(
        err,
        IngestError::Request { source, .. } if source.is_timeout() || source.is_connect()
    )
}

/// Flatten an API response into the raw landing record.
fn observation_from(
    location: &str,
    body: CurrentWeatherResponse,
    ingestion_time: NaiveDateTime,
) -> Result<RawObservation, IngestError> {
    let observation_time = parse_observation_time(&body.current.time).map_err(|e| {
        IngestError::ObservationTime {
            location: location.to_string(),
            value: body.current.time.clone(),
            source: e,
        }
    })?;

    Ok(RawObservation {
        location: location.to_string(),
        latitude: body.latitude,
        longitude: body.longitude,
        date: observation_time.date(),
        observation_time,
        temperature: body.current.temperature_2m,
        humidity: body.current.relative_humidity_2m,
        wind_speed: body.current.wind_speed_10m,
        wind_direction: body.current.wind_direction_10m,
        weather_code: body.current.weather_code,
        ingestion_time,
    })
}

/// The API reports minute resolution; tolerate seconds as well.
fn parse_observation_time(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
}
