//! Error types for cardcode

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for cardcode operations
pub type Result<T> = std::result::Result<T, Error>;

/// Crate error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("First line of {} does not contain a modification stamp", .0.display())]
    MissingSentinel(PathBuf),

    #[error("Incorrect time format: {0}")]
    BadTimestamp(String),

    #[error("Could not launch external editor '{program}': {source}")]
    EditorLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("External editor command is empty")]
    EmptyCommand,

    #[error("{0}")]
    Message(String),
}
