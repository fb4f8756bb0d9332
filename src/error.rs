use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

/// Everything that can go wrong between the NHL API and a composed view.
///
/// The cache absorbs upstream and normalization failures into stale-serving
/// whenever a prior successful fetch exists; callers only ever see
/// `NoDataAvailable` (cold start) or `InvalidRequest`.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("upstream request timed out")]
    UpstreamTimeout,

    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("upstream returned HTTP {0}")]
    UpstreamBadStatus(StatusCode),

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("unexpected payload shape: {0}")]
    SchemaMismatch(String),

    /// First-ever fetch for a key failed, so there is no previous entry to
    /// fall back to. The shared source is the loader failure that caused it.
    #[error("no data available")]
    NoDataAvailable {
        #[source]
        source: Arc<DataError>,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl DataError {
    /// Map a reqwest failure onto the typed taxonomy.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DataError::UpstreamTimeout
        } else if err.is_connect() || err.is_request() {
            DataError::UpstreamUnreachable(err.to_string())
        } else if err.is_decode() {
            DataError::MalformedResponse(err.to_string())
        } else {
            DataError::UpstreamUnreachable(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
