// src/error.rs

//! Unified error handling for the alert engine.

use std::fmt;

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Missing credential, destination or other required setting
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Upstream feed was malformed or unreachable
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Messaging transport rejected or failed the send
    #[error("Transport error for {destination}: {message}")]
    Transport {
        destination: String,
        message: String,
    },

    /// Catalog store or dispatch ledger unavailable
    #[error("Storage error on {key}: {message}")]
    Storage { key: String, message: String },
}

/// Coarse classification used to decide how a failure affects a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Ingestion,
    Transport,
    Storage,
    Other,
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an ingestion error.
    pub fn ingestion(message: impl fmt::Display) -> Self {
        Self::Ingestion(message.to_string())
    }

    /// Create a transport error for a destination.
    pub fn transport(destination: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Transport {
            destination: destination.into(),
            message: message.to_string(),
        }
    }

    /// Create a storage error for a storage key.
    pub fn storage(key: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Storage {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Ingestion(_) => ErrorKind::Ingestion,
            Self::Transport { .. } | Self::Http(_) => ErrorKind::Transport,
            Self::Storage { .. } => ErrorKind::Storage,
            _ => ErrorKind::Other,
        }
    }

    /// Whether this error must abort the current run.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }
}
