//! Error types for the harvester
//!
//! Application-level plumbing uses [`crate::Result`] (`anyhow`); the enums here
//! cover the failures callers branch on: fetch outcomes, candidate rejections
//! and configuration mistakes.

use thiserror::Error;

/// Failure to retrieve a source document.
///
/// Every variant is counted as a network error and the URL is skipped for the
/// current cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with something other than `200 OK`
    #[error("HTTP status {0}")]
    Status(u16),

    /// The server answered `200 OK` with no content
    #[error("empty response body")]
    EmptyBody,

    /// Connection, TLS, timeout or decoding failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Reason a captured (server, port, secret) candidate was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    /// The pattern matched without producing all three fields
    #[error("pattern did not capture server, port and secret")]
    MissingCapture,

    /// A raw capture exceeded its field ceiling before normalization
    #[error("raw capture exceeds field limits")]
    CaptureLength,

    #[error("server length {0} outside 4..=253")]
    ServerLength(usize),

    #[error("port is not an integer in 1..=65535")]
    InvalidPort,

    #[error("secret length {0} outside 16..=511")]
    SecretLength(usize),

    #[error("secret contains disallowed character {0:?}")]
    SecretCharacter(char),

    /// Fewer than 16 valid characters or fewer than 8 hex digits
    #[error("secret has too few hex digits")]
    SecretTooSparse,
}

/// Invalid harvester configuration, detected before the main loop starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("source catalog is empty")]
    EmptyCatalog,
}
