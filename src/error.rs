use crate::embedding::{EmbeddingError, VectorIndexError};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for hybridrag
#[derive(Error, Debug)]
pub enum RagError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Corpus file is not a JSON list of strings
    #[error("Invalid corpus: {reason}")]
    InvalidCorpus { reason: String },

    /// Lexical or vector index missing, unbuildable, or built from another corpus
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// Query-time embedding model differs from the one the index was built with
    #[error("Embedding model mismatch: index built with '{expected}', configured '{actual}'")]
    ModelMismatch { expected: String, actual: String },

    /// Retrieval could not produce a complete hybrid evidence set
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Embedding capability errors
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<VectorIndexError> for RagError {
    fn from(err: VectorIndexError) -> Self {
        match err {
            VectorIndexError::ModelMismatch { expected, actual } => {
                RagError::ModelMismatch { expected, actual }
            }
            other => RagError::IndexUnavailable(other.to_string()),
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for hybridrag operations
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_model_mismatch_keeps_its_kind() {
        let err: RagError = VectorIndexError::ModelMismatch {
            expected: "all-MiniLM-L6-v2".to_string(),
            actual: "hash-384".to_string(),
        }
        .into();

        assert!(matches!(err, RagError::ModelMismatch { .. }));
    }

    #[test]
    fn test_other_vector_errors_become_index_unavailable() {
        let err: RagError = VectorIndexError::Corrupt("bad header".to_string()).into();
        assert!(matches!(err, RagError::IndexUnavailable(_)));
        assert!(err.to_string().contains("bad header"));
    }
}
