#![allow(dead_code)]

use async_trait::async_trait;
use rust_lro::{BoxError, CancelOutcome, LongRunningOperation, OperationStatus, PollResponse, PollerConfig};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Config with a one-second default poll interval, handy under a paused clock.
pub fn fast_config() -> PollerConfig {
    PollerConfig::builder()
        .default_poll_interval(Duration::from_secs(1))
        .build()
        .unwrap()
}

pub fn resp(status: OperationStatus, value: &str) -> PollResponse<String> {
    PollResponse::new(status, value.to_string())
}

/// Operation whose poll and cancel answers come from fixed scripts, with
/// call counters for every caller-supplied function.
#[derive(Default)]
pub struct ScriptedOperation {
    pub activate_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    activate_failures: AtomicUsize,
    activate_delay: Duration,
    polls: Mutex<VecDeque<Result<PollResponse<String>, String>>>,
    last_scripted: Mutex<Option<PollResponse<String>>>,
    cancels: Mutex<VecDeque<CancelOutcome<String>>>,
    pub cancel_calls: Mutex<Vec<Option<PollResponse<String>>>>,
    pub fetched_with: Mutex<Vec<PollResponse<String>>>,
}

impl ScriptedOperation {
    pub fn new(polls: Vec<Result<PollResponse<String>, String>>) -> Self {
        Self {
            polls: Mutex::new(polls.into()),
            ..Default::default()
        }
    }

    pub fn statuses(statuses: &[OperationStatus]) -> Self {
        Self::new(statuses.iter().map(|s| Ok(resp(*s, s.as_str()))).collect())
    }

    /// Fail the first `n` activations.
    pub fn with_activate_failures(mut self, n: usize) -> Self {
        self.activate_failures = AtomicUsize::new(n);
        self
    }

    pub fn with_activate_delay(mut self, delay: Duration) -> Self {
        self.activate_delay = delay;
        self
    }

    pub fn with_cancels(self, outcomes: Vec<CancelOutcome<String>>) -> Self {
        *self.cancels.lock().unwrap() = outcomes.into();
        self
    }

    pub fn activate_count(&self) -> usize {
        self.activate_calls.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LongRunningOperation for ScriptedOperation {
    type Value = String;
    type Output = String;

    async fn activate(&self) -> Result<String, BoxError> {
        self.activate_calls.fetch_add(1, Ordering::SeqCst);
        if !self.activate_delay.is_zero() {
            tokio::time::sleep(self.activate_delay).await;
        }
        let should_fail = self
            .activate_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err("service unavailable".into());
        }
        Ok("accepted".to_string())
    }

    async fn poll(&self, _activation: &PollResponse<String>, _last: &PollResponse<String>) -> Result<PollResponse<String>, BoxError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.polls.lock().unwrap().pop_front();
        match next {
            Some(Ok(response)) => {
                *self.last_scripted.lock().unwrap() = Some(response.clone());
                Ok(response)
            }
            Some(Err(e)) => Err(e.into()),
            // Script exhausted: the service keeps reporting its last state.
            None => match self.last_scripted.lock().unwrap().clone() {
                Some(response) => Ok(response),
                None => Ok(resp(OperationStatus::InProgress, "in progress")),
            },
        }
    }

    async fn cancel(
        &self,
        _activation: &PollResponse<String>,
        current: Option<&PollResponse<String>>,
    ) -> Result<CancelOutcome<String>, BoxError> {
        self.cancel_calls.lock().unwrap().push(current.cloned());
        let next = self.cancels.lock().unwrap().pop_front();
        next.ok_or_else(|| "no scripted cancel outcome".into())
    }

    async fn fetch_result(&self, _activation: &PollResponse<String>, terminal: &PollResponse<String>) -> Result<String, BoxError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched_with.lock().unwrap().push(terminal.clone());
        match terminal.status() {
            OperationStatus::Failed => Err(format!("operation failed: {}", terminal.value()).into()),
            _ => Ok(format!("result:{}", terminal.value())),
        }
    }
}
