//! Error types for the glyco_core library.
//!
//! The statistics engine never returns these; they cover the store, the
//! medication catalog, export, backup and configuration.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for glyco_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// User profile name that cannot be used as a storage key
    #[error("Invalid user name: {0:?}")]
    InvalidUser(String),

    /// Entry or medication lookup failed
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input rejected before it reached the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backup envelope could not be read or restored
    #[error("Backup error: {0}")]
    Backup(String),
}
