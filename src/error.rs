//! Error types for squidle-dl
//!
//! This module provides the error taxonomy for the acquisition pipeline:
//! - Transport failures (connection, timeout) surfaced from the HTTP client
//! - Protocol failures (unexpected status, non-JSON bodies, missing fields)
//! - Local failures (filesystem, CSV, configuration, cancellation)
//!
//! Each error can be classified as *systemic* (the whole run must stop) or
//! item-scoped (isolated to one campaign, deployment or image and reported).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for squidle-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for squidle-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "workers")
        key: Option<String>,
    },

    /// Network error (connection, timeout, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// The server answered, but not with the document we expected
    ///
    /// Covers HTML error pages served where JSON was expected and JSON documents
    /// lacking required fields.
    #[error("unexpected response from {url}: {message}")]
    Protocol {
        /// Requested URL
        url: String,
        /// What was wrong with the body
        message: String,
    },

    /// A pose record could not be turned into a manifest row
    #[error("invalid record for media {image_id}: {message}")]
    InvalidRecord {
        /// Media item the record belongs to
        image_id: i64,
        /// Which field was missing or malformed
        message: String,
    },

    /// The base URL or an image URL could not be parsed
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        /// The offending URL text
        url: String,
        /// Parser error
        #[source]
        source: url::ParseError,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error tied to a specific path
    #[error("I/O error at {path}: {source}")]
    IoAt {
        /// File or directory being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding/decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The run was cancelled before this unit started
    #[error("cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an I/O error with the path it happened on
    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::IoAt {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this error means the whole run cannot succeed
    ///
    /// Unreachable servers and rejected credentials abort early instead of
    /// producing a manifest full of identical failures.
    pub fn is_systemic(&self) -> bool {
        match self {
            Error::Network(e) => e.is_connect(),
            Error::Http { status, .. } => matches!(status, 401 | 403),
            Error::Config { .. } => true,
            Error::InvalidUrl { .. } => false,
            Error::Protocol { .. } | Error::InvalidRecord { .. } => false,
            Error::Io(_) | Error::IoAt { .. } | Error::Csv(_) | Error::Serialization(_) => false,
            Error::Cancelled => false,
            Error::Other(_) => false,
        }
    }

    /// Machine-readable error code, used in failure reports
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Network(e) if e.is_timeout() => "timeout",
            Error::Network(_) => "network_error",
            Error::Http { .. } => "http_status",
            Error::Protocol { .. } => "protocol_error",
            Error::InvalidRecord { .. } => "invalid_record",
            Error::InvalidUrl { .. } => "invalid_url",
            Error::Io(_) | Error::IoAt { .. } => "io_error",
            Error::Csv(_) => "csv_error",
            Error::Serialization(_) => "serialization_error",
            Error::Cancelled => "cancelled",
            Error::Other(_) => "internal_error",
        }
    }
}
