use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;

/// Transport failures. All of them are transient from the loop's point of view.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("gateway did not answer within {0:?}")]
    Timeout(Duration),

    #[error("gateway unreachable: {0}")]
    Connection(String),

    #[error("gateway returned HTTP {0}")]
    Gateway(StatusCode),
}

/// The payload could not be parsed at all.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("payload top level is {0}, expected an object")]
    NotAnObject(&'static str),
}

/// Anything that makes a poll cycle produce no record.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Connection,
    Gateway,
    Decode,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Connection => "connection",
            FailureKind::Gateway => "gateway_status",
            FailureKind::Decode => "decode",
        }
    }
}

impl CycleError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CycleError::Fetch(FetchError::Timeout(_)) => FailureKind::Timeout,
            CycleError::Fetch(FetchError::Connection(_)) => FailureKind::Connection,
            CycleError::Fetch(FetchError::Gateway(_)) => FailureKind::Gateway,
            CycleError::Decode(_) => FailureKind::Decode,
        }
    }
}

/// Sustained unavailability; the only condition reported to the host as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error(
    "gateway failed {consecutive_failures} consecutive polls (ceiling {ceiling}); last error: {last_error}"
)]
pub struct HardFailure {
    pub consecutive_failures: u32,
    pub ceiling: u32,
    pub last_error: String,
    /// Timestamp of the last record produced before the outage, if any.
    pub last_success: Option<i64>,
}
