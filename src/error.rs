//! Unified error types for Lookout

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Lookout operations
#[derive(Error, Debug)]
pub enum Error {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Config errors
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config validation failed: {0}")]
    ConfigValidation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Host command errors
    #[error("Command '{command}' failed: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Command '{command}' timed out after {seconds} seconds")]
    CommandTimeout { command: String, seconds: u64 },

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Interface '{0}' not found")]
    InterfaceNotFound(String),

    // Remediation errors
    #[error("Failed to lock '{path}': {message}")]
    Lock { path: PathBuf, message: String },

    #[error("Remediation already running (lock held on '{0}')")]
    RemediationInProgress(PathBuf),

    #[error("Invalid remediation transition: {0}")]
    Transition(String),

    // Flapping state errors
    #[error("Flapping state file '{path}': {message}")]
    StateFile { path: PathBuf, message: String },

    // Log sink errors
    #[error("Failed to write log '{path}': {source}")]
    LogWrite { path: PathBuf, source: io::Error },
}

/// Result type alias for Lookout operations
pub type Result<T> = std::result::Result<T, Error>;
