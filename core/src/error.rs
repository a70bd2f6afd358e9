//! Error types for the request pipeline.
//!
//! # Design
//! `ClassifiedError` is the single failure type a completion ever sees. Setup
//! errors are raised before any I/O; the remaining variants are produced by
//! the executor after the transport returns. `ManagerError` and `ConfigError`
//! cover construction of the manager itself and never reach a completion.

use thiserror::Error;

/// Failure reported by a transport while issuing a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("transport error: {0}")]
    Other(String),
}

/// Errors delivered to a request's completion.
#[derive(Error, Debug)]
pub enum ClassifiedError {
    /// The URL was rejected before any network activity.
    #[error("setup error: invalid or too-short URL")]
    SetupInvalidUrl,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("response carried no data")]
    NoResponseData,

    /// Status outside `200..=299`.
    #[error("bad status code: {0}")]
    BadStatusCode(u16),

    #[error("bad MIME type: got {got}, expected {expected}")]
    BadMimeType { got: String, expected: String },

    /// The body did not decode into the requested type.
    #[error("decode failure: {0}")]
    DecodeFailure(#[source] serde_json::Error),
}

/// Errors raised while constructing a `RequestManager`.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("max_concurrent must be at least 1")]
    InvalidConcurrency,

    #[error("no Tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// Errors raised while loading a `ManagerConfig`.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}
