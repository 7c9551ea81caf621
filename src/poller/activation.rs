use crate::error::{BoxError, LroError, Result};
use crate::{OperationStatus, PollResponse};
use std::future::Future;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Answer of a non-blocking attach attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Attach<T> {
    /// Activation finished; here is the shared response.
    Ready(PollResponse<T>),
    /// Another caller is running `activate()` right now. Ask again later.
    Busy,
}

/// Single-flight start for one logical operation.
///
/// The first caller to win the busy flag runs `activate()`. A success is
/// cached as a `NotStarted` response and replayed to every later caller; a
/// failure releases the flag so the next attacher retries. Losers never block.
#[derive(Debug)]
pub struct ActivationGate<T> {
    activation: OnceLock<PollResponse<T>>,
    busy: AtomicBool,
}

impl<T: Clone> Default for ActivationGate<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the busy flag unless disarmed, so a winner dropped mid-activation
/// (e.g. its caller timed out) does not strand every other attacher.
struct BusyGuard<'a> {
    busy: &'a AtomicBool,
    armed: bool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.busy.store(false, Ordering::Release);
        }
    }
}

impl<T: Clone> ActivationGate<T> {
    pub fn new() -> Self {
        Self {
            activation: OnceLock::new(),
            busy: AtomicBool::new(false),
        }
    }

    /// The cached activation response, if any caller has completed activation.
    pub fn get(&self) -> Option<PollResponse<T>> {
        self.activation.get().cloned()
    }

    pub fn is_activated(&self) -> bool {
        self.activation.get().is_some()
    }

    /// Get the cached response, or register intent to activate. Returns
    /// `Busy` without waiting when another caller holds the flag.
    pub async fn try_attach<F, Fut>(&self, activate: F) -> Result<Attach<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        if let Some(cached) = self.activation.get() {
            return Ok(Attach::Ready(cached.clone()));
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(Attach::Busy);
        }
        let mut guard = BusyGuard {
            busy: &self.busy,
            armed: true,
        };
        // A previous winner may have finished between the fast path and our CAS.
        if let Some(cached) = self.activation.get() {
            guard.armed = false;
            return Ok(Attach::Ready(cached.clone()));
        }

        debug!("activation: invoking activate");
        match activate().await {
            Ok(value) => {
                let response = self
                    .activation
                    .get_or_init(|| PollResponse::new(OperationStatus::NotStarted, value))
                    .clone();
                // The flag stays busy: activation never runs again once cached.
                guard.armed = false;
                info!("activation: operation started");
                Ok(Attach::Ready(response))
            }
            Err(e) => {
                warn!(error = %e, "activation: activate failed; releasing gate for the next attacher");
                drop(guard);
                Err(LroError::activation(e))
            }
        }
    }

    /// Retry `try_attach` until a response is cached or this caller wins and
    /// finishes. Only the attempt this caller ran can fail it.
    pub async fn attach<F, Fut>(&self, activate: F, retry_delay: Duration) -> Result<PollResponse<T>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        loop {
            match self.try_attach(&activate).await? {
                Attach::Ready(response) => return Ok(response),
                Attach::Busy => tokio::time::sleep(retry_delay).await,
            }
        }
    }
}
