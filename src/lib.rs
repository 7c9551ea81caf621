//! Long-running operation (LRO) poller.
//!
//! Turns a one-shot "start operation" call plus a repeated "poll status" call
//! into a completion protocol. It provides:
//!
//! - Public data model: `OperationStatus`, `PollResponse`, `CancelOutcome`
//! - Caller seam: the `LongRunningOperation` trait and the closure-based
//!   `FnOperation`
//! - `Poller`: single-flight activation shared by every observer, push-style
//!   `Subscription` streams and pull-style `SyncPoller` façades
//!
//! The engine spawns no tasks and performs no I/O of its own; it runs the
//! caller's operations on whatever tokio runtime drives it.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub mod config;
pub mod error;
pub mod operation;
pub mod poller;

pub use config::{PollerConfig, PollerConfigBuilder};
pub use error::{BoxError, LroError, Result};
pub use operation::{FnOperation, FnOperationBuilder, LongRunningOperation};
pub use poller::activation::{ActivationGate, Attach};
pub use poller::poll_loop::{PollingState, poll_delay, poll_loop};
pub use poller::result::fetch_final_result;
pub use poller::sync::SyncPoller;
pub use poller::{AsyncPollResponse, Poller, Subscription};

/// Status of a long-running operation as last reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    /// Accepted but not yet picked up. Every activation response carries this.
    NotStarted,
    InProgress,
    Succeeded,
    Failed,
    /// Cancelled by a caller, either remotely or by stopping a subscription.
    UserCancelled,
}

impl OperationStatus {
    /// True for the terminal statuses: `Succeeded`, `Failed`, `UserCancelled`.
    pub fn is_complete(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::UserCancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::UserCancelled => "USER_CANCELLED",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationStatus {
    type Err = LroError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NOT_STARTED" => Ok(Self::NotStarted),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            "USER_CANCELLED" => Ok(Self::UserCancelled),
            other => Err(LroError::InvalidArgument(format!("unknown operation status: {other}"))),
        }
    }
}

/// One immutable observation of an operation's status.
///
/// `retry_after_ms` is the server-suggested delay before the next poll. It is
/// signed because services do send zero or negative hints; the poll loop
/// falls back to its default interval for those.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResponse<T> {
    status: OperationStatus,
    value: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retry_after_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    properties: HashMap<String, serde_json::Value>,
}

impl<T> PollResponse<T> {
    pub fn new(status: OperationStatus, value: T) -> Self {
        Self {
            status,
            value,
            retry_after_ms: None,
            properties: HashMap::new(),
        }
    }

    /// Attach a server-suggested delay. Durations too large for `i64` millis saturate.
    pub fn with_retry_after(self, delay: Duration) -> Self {
        let ms = i64::try_from(delay.as_millis()).unwrap_or(i64::MAX);
        self.with_retry_after_ms(ms)
    }

    pub fn with_retry_after_ms(mut self, ms: i64) -> Self {
        self.retry_after_ms = Some(ms);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn retry_after_ms(&self) -> Option<i64> {
        self.retry_after_ms
    }

    pub fn properties(&self) -> &HashMap<String, serde_json::Value> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    pub fn is_complete(&self) -> bool {
        self.status.is_complete()
    }
}

/// Answer of a caller's cancel function.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome<T> {
    /// The service accepted the cancellation.
    Cancelled(T),
    /// Cancelling needs data only a current poll response carries (e.g. a
    /// cancellation token absent from the activation payload). `SyncPoller`
    /// polls once and retries.
    NeedsCurrentResponse,
}
