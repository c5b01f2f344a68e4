use crate::storage::error::StorageError;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Network request failed for {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Gave up on '{location}' after {attempts} attempt(s)")]
    RetriesExhausted {
        location: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed response body for '{location}'")]
    Decode {
        location: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid observation time '{value}' for '{location}'")]
    ObservationTime {
        location: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Failed to build landing frame")]
    Frame(#[from] PolarsError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
