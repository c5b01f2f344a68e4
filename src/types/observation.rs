//! Wire types for the Open-Meteo current-weather endpoint and the flattened
//! raw record the ingestion step lands in front of the Bronze layer.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

/// Top-level response body of a current-weather request.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeatherResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub current: CurrentWeather,
}

/// The `current` block of an Open-Meteo response.
///
/// All measurements are optional: the API omits fields it cannot provide, and
/// downstream layers are responsible for deciding what a missing value means
/// (Bronze warns, Silver drops rows without a temperature).
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeather {
    /// Observation timestamp, ISO-8601 with minute resolution (e.g. `2024-01-01T12:00`).
    pub time: String,
    pub temperature_2m: Option<f64>,
    pub relative_humidity_2m: Option<f64>,
    pub wind_speed_10m: Option<f64>,
    pub wind_direction_10m: Option<f64>,
    pub weather_code: Option<i64>,
}

/// One fetched observation, flattened to the raw landing schema.
///
/// `date` is the partition date (the calendar date of `observation_time`);
/// together with `location` it forms the [`PartitionKey`](crate::PartitionKey)
/// the record lands under.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub location: String,
    pub latitude: f64,
    pub longitude: f64,
    pub date: NaiveDate,
    pub observation_time: NaiveDateTime,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<f64>,
    pub weather_code: Option<i64>,
    pub ingestion_time: NaiveDateTime,
}
