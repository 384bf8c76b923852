//! Error types for ChainDrug

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Unknown identity index {0}")]
    UnknownIdentity(u64),
    #[error("Invalid chain: {0}")]
    InvalidChain(String),
    #[error("Invalid block: {0}")]
    InvalidBlock(String),
    #[error("Mining cancelled")]
    MiningCancelled,
    #[error("Chain tip kept moving while mining ({0} attempts)")]
    MiningRace(u32),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        ChainError::NetworkError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
