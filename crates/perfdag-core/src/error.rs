//! Error types for perfdag.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Lookup errors
    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    #[error("Secret provider not configured: {0}")]
    SecretProviderNotConfigured(String),

    #[error("Missing key '{key}' in {layer}")]
    MissingKey { layer: String, key: String },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    // Benchmark tree errors
    #[error("Invalid benchmark specification: {0}")]
    InvalidSpec(String),

    #[error("Benchmark structure error at {path}: {reason}")]
    Structure { path: String, reason: String },

    // Release errors
    #[error("Unsupported platform for {operation}: {platform}")]
    UnsupportedPlatform { platform: String, operation: String },

    #[error("Workflow graph error: {0}")]
    Graph(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl Error {
    pub fn missing(layer: impl Into<String>, key: impl Into<String>) -> Self {
        Error::MissingKey {
            layer: layer.into(),
            key: key.into(),
        }
    }
}
