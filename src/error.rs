//! Error types for the resale price pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ResaleError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum ResaleError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Unknown category '{value}' in column '{column}'")]
    UnknownCategory { column: String, value: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Malformed artifact: {0}")]
    MalformedArtifact(String),
}

impl ResaleError {
    /// True for the persistence errors a caller may want to branch on
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResaleError::ArtifactNotFound(_))
    }
}

impl From<polars::error::PolarsError> for ResaleError {
    fn from(err: polars::error::PolarsError) -> Self {
        ResaleError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ResaleError {
    fn from(err: serde_json::Error) -> Self {
        ResaleError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for ResaleError {
    fn from(err: bincode::Error) -> Self {
        ResaleError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ResaleError {
    fn from(err: ndarray::ShapeError) -> Self {
        ResaleError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
