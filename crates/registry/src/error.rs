use std::path::PathBuf;

use normcalc_core::error::CoreError;

/// Failures raised by a [`NormSource`](crate::source::NormSource) or while
/// decoding what it returned.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid catalog key '{0}'")]
    InvalidKey(String),
}

impl From<SourceError> for CoreError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Parse { .. } => CoreError::DataIntegrity(err.to_string()),
            SourceError::Io { .. } => CoreError::DataSource(err.to_string()),
            SourceError::InvalidKey(_) => CoreError::Validation(err.to_string()),
        }
    }
}
