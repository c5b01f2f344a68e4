use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("Failed to create watermark directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to open watermark database '{0}'")]
    Open(PathBuf, #[source] rusqlite::Error),

    #[error("Watermark query failed")]
    Query(#[from] rusqlite::Error),

    #[error("Corrupt watermark row: invalid date '{value}'")]
    CorruptDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Corrupt watermark row: invalid timestamp '{value}'")]
    CorruptTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}
