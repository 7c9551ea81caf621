//! Error types for the poller.

use crate::OperationStatus;
use std::time::Duration;

/// Errors raised by caller-supplied operations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The result type used throughout rust-lro.
pub type Result<T, E = LroError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum LroError {
    /// Rejected at construction time (bad interval, missing closure).
    #[error("invalid poller configuration: {0}")]
    InvalidConfig(String),

    /// A façade method was called with an argument it cannot honor.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `activate()` failed. Not cached; the next attacher retries.
    #[error("activation failed: {source}")]
    Activation {
        #[source]
        source: BoxError,
    },

    /// An explicit single poll failed. The poll loop never surfaces this.
    #[error("poll failed: {source}")]
    Poll {
        #[source]
        source: BoxError,
    },

    #[error("cancellation failed: {source}")]
    Cancel {
        #[source]
        source: BoxError,
    },

    /// The cancel function still asked for a current response after the extra poll.
    #[error("cancel still requires a current poll response after re-polling")]
    CancelRequiresPollResponse,

    #[error("fetching final result failed: {source}")]
    FetchResult {
        #[source]
        source: BoxError,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The loop reached a terminal status without ever reporting `target`.
    #[error("status {target} was not observed; operation ended with {ended}")]
    StatusNotObserved {
        target: OperationStatus,
        ended: OperationStatus,
    },

    #[error("operation has not reached a terminal status (currently {0})")]
    NotComplete(OperationStatus),

    /// A blocking wrapper could not build a runtime to drive the wait.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl LroError {
    pub(crate) fn activation(source: BoxError) -> Self {
        Self::Activation { source }
    }

    pub(crate) fn poll(source: BoxError) -> Self {
        Self::Poll { source }
    }

    pub(crate) fn cancel(source: BoxError) -> Self {
        Self::Cancel { source }
    }

    pub(crate) fn fetch_result(source: BoxError) -> Self {
        Self::FetchResult { source }
    }

    /// True for errors that leave the operation itself untouched and may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Activation { .. } | Self::Poll { .. } | Self::Timeout(_))
    }
}
