use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Coarse classification used by callers and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingErrorKind {
    NoRoute,
    Timeout,
    HttpError,
    Malformed,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RoutingError {
    #[error("routing service found no route between the requested points")]
    NoRoute,

    #[error("routing request timed out after {0:?}")]
    Timeout(Duration),

    #[error("routing service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("routing request failed: {0}")]
    Transport(String),

    #[error("malformed routing response: {0}")]
    Malformed(String),
}

impl RoutingError {
    pub fn kind(&self) -> RoutingErrorKind {
        match self {
            Self::NoRoute => RoutingErrorKind::NoRoute,
            Self::Timeout(_) => RoutingErrorKind::Timeout,
            Self::Status { .. } | Self::Transport(_) => RoutingErrorKind::HttpError,
            Self::Malformed(_) => RoutingErrorKind::Malformed,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Error body of OSRM-compatible services.
#[derive(Debug, Deserialize)]
pub(crate) struct OsrmErrorPayload {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
}
