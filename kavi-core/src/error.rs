//! Error types for kavi-core

use thiserror::Error;

/// Main error type for the kavi-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A platform collaborator is missing or refused the request
    #[error("platform unavailable: {0}")]
    Platform(String),

    /// A security detector failed during a scan
    #[error("detector {detector} failed: {message}")]
    Detector { detector: String, message: String },
}

/// Result type alias for kavi-core
pub type Result<T> = std::result::Result<T, Error>;
