//! Error taxonomy for page fetching and worker execution

use std::time::Duration;

/// Outcome classification for a single fetch attempt.
///
/// `Transient` failures (timeouts, connection resets, 5xx, rate-limit
/// responses, proxy blocks) are retried with a fresh proxy identity.
/// `Permanent` failures (other 4xx) are logged and never retried.
#[derive(Debug)]
pub enum FetchError {
    Transient {
        reason: String,
        /// Server-provided retry hint (Retry-After on 429), if any
        retry_after: Option<Duration>,
    },
    Permanent {
        reason: String,
    },
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient { reason, .. } => write!(f, "transient: {reason}"),
            Self::Permanent { reason } => write!(f, "permanent: {reason}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
            retry_after: None,
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::Permanent {
            reason: reason.into(),
        }
    }

    /// Classify an HTTP status code.
    ///
    /// 403 is the archive's "egress identity blocked" answer and 429 its
    /// rate-limit answer; both are identity-level transient failures.
    /// Remaining 4xx are permanent, 5xx transient.
    pub fn from_status(status: u16, retry_after: Option<Duration>) -> Self {
        match status {
            403 | 429 => Self::Transient {
                reason: format!("HTTP {status}"),
                retry_after,
            },
            400..=499 => Self::Permanent {
                reason: format!("HTTP {status}"),
            },
            _ => Self::Transient {
                reason: format!("HTTP {status}"),
                retry_after: None,
            },
        }
    }

    /// Map a reqwest error: connect/timeout/body errors are transient,
    /// status errors go through [`from_status`](Self::from_status).
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::from_status(status.as_u16(), None),
            None => Self::Transient {
                reason: e.to_string(),
                retry_after: None,
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient { retry_after, .. } => *retry_after,
            Self::Permanent { .. } => None,
        }
    }
}

/// Fatal error that terminates a single worker.
///
/// Neither variant is retried: an exhausted proxy pool means every
/// identity has been retired, and a checkpoint or shard write failure
/// must stop the worker rather than risk lost or duplicated work on
/// resume.
#[derive(Debug)]
pub enum WorkerError {
    PoolExhausted,
    Checkpoint(std::io::Error),
    Output(std::io::Error),
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PoolExhausted => write!(f, "proxy pool exhausted"),
            Self::Checkpoint(e) => write!(f, "checkpoint write failed: {e}"),
            Self::Output(e) => write!(f, "output shard write failed: {e}"),
        }
    }
}

impl std::error::Error for WorkerError {}
