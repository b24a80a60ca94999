//! Error types for maildir ingestion.

use std::path::PathBuf;

/// Top-level error type for the runner.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Pass error: {0}")]
    Pass(#[from] PassError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to move a delivered file from `new/` into `cur/`.
///
/// Anything other than the source vanishing is a filesystem problem, so it
/// aborts the whole pass instead of being handled per file.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("Could not rename maildir file {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The quarantine rename failed; the file stays in progress.
#[derive(Debug, thiserror::Error)]
#[error("Could not quarantine {path}: {source}")]
pub struct QuarantineError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Message loading errors.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed message in {path}")]
    Malformed { path: PathBuf },
}

/// Routing errors. Both end in quarantine.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("Message apparently not for any list")]
    NoRouteFound,

    #[error("Unknown sub-queue: {token}")]
    UnknownSubQueue { token: String },
}

/// Destination queue errors.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue {dir} write failed: {source}")]
    Write {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Queue entry {filebase} not found")]
    NotFound { filebase: String },

    #[error("Queue entry {filebase} is corrupt: {reason}")]
    Corrupt { filebase: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while reading the set of registered lists.
#[derive(Debug, thiserror::Error)]
pub enum ListNamesError {
    #[error("Could not read lists directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures that end a single file in quarantine.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("Load failed: {0}")]
    Load(#[from] LoadError),

    #[error("Routing failed: {0}")]
    Route(#[from] RouteError),

    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] QueueError),

    #[error("Could not remove processed file: {0}")]
    Remove(#[source] std::io::Error),
}

/// Errors that abort a whole pass.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("Error listing maildir directory {path}: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Claim failed: {0}")]
    Claim(#[from] ClaimError),

    #[error("List names unavailable: {0}")]
    ListNames(#[from] ListNamesError),
}

/// Result type alias for the runner.
pub type Result<T> = std::result::Result<T, Error>;
