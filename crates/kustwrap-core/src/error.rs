//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("expected integer value for count. Received: {value}")]
    InvalidReplicaCount { value: String },

    #[error("Invalid environment entry '{entry}': expected NAME=VALUE")]
    InvalidEnvEntry { entry: String },

    #[error("failed to unmarshal manifest: {message}")]
    ManifestParse { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
