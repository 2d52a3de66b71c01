// src/error.rs
//! Error taxonomy for the ingestion pipeline.
//!
//! Per-record and per-source errors are converted into counters and run-log entries where they
//! occur; only [`AuthError`] aborts work, and it does so before a cycle starts.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Network-level failure reaching a source. Non-fatal: the source is logged as `failed`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("render service error for {url}: {message}")]
    Render { url: String, message: String },

    #[error("rendering engine is not available")]
    NoRenderer,

    #[error("search provider error: {0}")]
    Search(String),
}

impl FetchError {
    /// Map a reqwest error, keeping timeouts distinguishable.
    pub fn from_reqwest(url: &str, timeout: Duration, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                after: timeout,
            }
        } else if let Some(status) = e.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Http {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

/// Failure of a single source collection.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Locators could not be applied (e.g. an invalid selector). Logged as `partial`.
    #[error("extraction failed: {0}")]
    Extraction(String),
}

/// Candidate rejected by the legitimacy heuristics. Discarded silently.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty name")]
    EmptyName,

    #[error("placeholder keyword `{0}`")]
    Placeholder(&'static str),

    #[error("not enough content")]
    TooShort,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(Uuid),

    #[error("source `{0}` not found")]
    SourceNotFound(String),

    #[error("invalid record: {0}")]
    Invalid(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,

    #[error("invalid bearer token")]
    Invalid,

    #[error("trigger token not configured")]
    NotConfigured,
}
