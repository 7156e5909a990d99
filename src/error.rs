//! Error taxonomy for the collection pipeline.
//!
//! Transport and malformed-record errors are recovered where they are detected
//! and only reach callers as entries in a report. Query errors are returned to
//! the caller as values.

use thiserror::Error;

/// Failure while fetching a catalog page. Aborts pagination for the current run.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("page request timed out after {secs}s")]
    Timeout { secs: u64 },
    #[error("catalog returned HTTP {status}: {body_snippet}")]
    Status { status: u16, body_snippet: String },
    #[error("malformed catalog response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Map a reqwest error, separating timeouts from other transport failures.
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            TransportError::Timeout { secs: timeout_secs }
        } else if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Http(err)
        }
    }
}

/// A raw record that cannot be normalized.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedRecordError {
    #[error("record has no object id")]
    MissingId,
    #[error("record has a non-integer object id: {0}")]
    InvalidId(String),
}

/// A single record's replace/insert sequence failed and was rolled back.
#[derive(Debug, Error)]
#[error("storing object {id} failed: {source}")]
pub struct StorageWriteError {
    pub id: i64,
    #[source]
    pub source: sqlx::Error,
}

/// A user-supplied read query was rejected or failed in the engine.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query text is empty")]
    Empty,
    #[error("only single read-only statements are allowed: {0}")]
    Forbidden(String),
    #[error("query failed: {0}")]
    Engine(#[from] sqlx::Error),
}
