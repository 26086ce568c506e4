//! Error types for the course engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{path} returned status {status}")]
    Status { path: String, status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("content path not allowed: {0}")]
    InvalidPath(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UnlockError {
    #[error("not enough points: need {needed}, have {available}")]
    InsufficientPoints { needed: u32, available: u32 },

    #[error("module {0} is already unlocked")]
    AlreadyUnlocked(String),

    #[error("module {0} cannot be unlocked with points")]
    NotPurchasable(String),

    #[error("unknown module {0}")]
    UnknownModule(String),

    #[error("storage error: {0}")]
    Storage(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} is not a valid socket address: {value:?}")]
    InvalidAddress { key: &'static str, value: String },
}
