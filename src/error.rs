//! Error types for inkbound
//!
//! The error taxonomy mirrors the pipeline's failure isolation units:
//! - [`SourceFetchError`] — one source failed to fetch (transient or permanent)
//! - [`AssetError`] — one image failed to download, decode, or persist
//! - [`RenderError`] — one output format failed to produce its artifact
//!
//! Retry classification for transient failures lives in [`crate::retry`]
//! via the `IsRetryable` trait.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for inkbound operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for inkbound
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "sources.url")
        key: Option<String>,
    },

    /// A source failed to fetch
    #[error("source fetch error: {0}")]
    SourceFetch(#[from] SourceFetchError),

    /// An asset failed to localize
    #[error("asset error: {0}")]
    Asset(#[from] AssetError),

    /// A format renderer failed
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The run was cancelled before it could finish
    #[error("run cancelled")]
    Cancelled,
}

/// Per-source fetch failures
///
/// Every variant carries the source identifier so failures can be attributed
/// in the run summary. Transient vs. permanent classification is done by
/// `IsRetryable` in the retry module: network timeouts/connect failures and
/// 5xx/429 responses are retried, everything else fails immediately.
#[derive(Debug, Error)]
pub enum SourceFetchError {
    /// HTTP transport failure (timeout, connect, protocol)
    #[error("source {source_id}: network error: {cause}")]
    Network {
        /// The source identifier the failure belongs to
        source_id: String,
        /// The underlying transport error
        cause: reqwest::Error,
    },

    /// Non-success HTTP status from the source endpoint
    #[error("source {source_id}: HTTP {status} from {url}")]
    Status {
        /// The source identifier the failure belongs to
        source_id: String,
        /// HTTP status code returned
        status: u16,
        /// The URL that produced the status
        url: String,
    },

    /// The source responded but the payload could not be interpreted
    #[error("source {source_id}: malformed response: {reason}")]
    Malformed {
        /// The source identifier the failure belongs to
        source_id: String,
        /// Why the payload was rejected
        reason: String,
    },

    /// The source rejected the request credentials
    #[error("source {source_id}: authentication failed")]
    Auth {
        /// The source identifier the failure belongs to
        source_id: String,
    },

    /// The fetch was abandoned because the run is shutting down
    #[error("source {source_id}: cancelled")]
    Cancelled {
        /// The source identifier the failure belongs to
        source_id: String,
    },
}

impl SourceFetchError {
    /// The identifier of the source this failure belongs to
    pub fn source_id(&self) -> &str {
        match self {
            SourceFetchError::Network { source_id, .. }
            | SourceFetchError::Status { source_id, .. }
            | SourceFetchError::Malformed { source_id, .. }
            | SourceFetchError::Auth { source_id }
            | SourceFetchError::Cancelled { source_id } => source_id,
        }
    }
}

/// Per-image localization failures
#[derive(Debug, Error)]
pub enum AssetError {
    /// HTTP transport failure while downloading the image
    #[error("image {url}: download failed: {cause}")]
    Download {
        /// The remote image URL
        url: String,
        /// The underlying transport error
        cause: reqwest::Error,
    },

    /// Non-success HTTP status for the image URL
    #[error("image {url}: HTTP {status}")]
    Status {
        /// The remote image URL
        url: String,
        /// HTTP status code returned
        status: u16,
    },

    /// The response body was not an image
    #[error("image {url}: unsupported content type {content_type:?}")]
    UnsupportedType {
        /// The remote image URL
        url: String,
        /// The content-type header that was rejected
        content_type: String,
    },

    /// The response body exceeded the configured size cap
    #[error("image {url}: {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// The remote image URL
        url: String,
        /// Size of the rejected body
        size: u64,
        /// The configured cap
        limit: u64,
    },

    /// Failed to persist the image in the asset store
    #[error("asset store write failed at {path}: {cause}")]
    Store {
        /// The target path in the store
        path: PathBuf,
        /// The underlying filesystem error
        cause: std::io::Error,
    },

    /// Every image referenced by an item failed to localize
    #[error("item {item}: all {count} images failed to localize")]
    AllImagesFailed {
        /// The item identifier
        item: String,
        /// How many images were attempted
        count: usize,
    },
}

/// Per-format render failures
#[derive(Debug, Error)]
pub enum RenderError {
    /// Filesystem failure while writing the artifact
    #[error("{format}: I/O error at {path}: {cause}")]
    Io {
        /// Name of the output format
        format: &'static str,
        /// The path being written
        path: PathBuf,
        /// The underlying filesystem error
        cause: std::io::Error,
    },

    /// The format's packaging layer rejected the content
    #[error("{format}: packaging failed: {reason}")]
    Packaging {
        /// Name of the output format
        format: &'static str,
        /// Why packaging failed
        reason: String,
    },

    /// The external raster engine could not be found
    #[error("raster engine unavailable: {reason}")]
    EngineUnavailable {
        /// Why the engine is unavailable (missing binary, bad path)
        reason: String,
    },

    /// The external raster engine ran but did not produce output
    #[error("raster engine failed: {reason}")]
    EngineFailed {
        /// What the engine reported
        reason: String,
    },
}
