use crate::operation::LongRunningOperation;
use crate::{OperationStatus, PollResponse};
use futures::Stream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-subscriber polling state.
///
/// Built fresh for every subscription and moved into its loop; never stored
/// in shared fields. The cancel flag is shared only with the owning
/// subscriber's handle.
#[derive(Debug)]
pub struct PollingState<T> {
    last_response: PollResponse<T>,
    cancelled: Arc<AtomicBool>,
    consecutive_errors: u32,
}

impl<T: Clone> PollingState<T> {
    /// Seed a new state, normally from the shared activation response.
    pub fn new(seed: PollResponse<T>) -> Self {
        Self {
            last_response: seed,
            cancelled: Arc::new(AtomicBool::new(false)),
            consecutive_errors: 0,
        }
    }

    pub fn last_response(&self) -> &PollResponse<T> {
        &self.last_response
    }

    /// Stop polling. Takes effect before the next poll; an in-flight poll finishes.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub(crate) fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    fn cancelled_response(&self) -> PollResponse<T> {
        PollResponse::new(OperationStatus::UserCancelled, self.last_response.value().clone())
    }
}

/// Delay before the next poll: the server's positive retry-after hint, or
/// `default` when the hint is absent, zero or negative.
pub fn poll_delay<T>(last: &PollResponse<T>, default: Duration) -> Duration {
    match last.retry_after_ms() {
        Some(ms) if ms > 0 => Duration::from_millis(ms.unsigned_abs()),
        _ => default,
    }
}

/// Drive `op.poll` until a terminal response, yielding every successful
/// response in order and ending right after the terminal one.
///
/// Poll errors are logged and swallowed: the status only changes on an
/// explicit response from the service, so a failing endpoint is retried
/// indefinitely. Bound the wait on the consumer side if that matters.
/// If the state is cancelled, a synthetic `UserCancelled` response carrying
/// the last value ends the stream.
pub fn poll_loop<O>(
    op: Arc<O>,
    activation: PollResponse<O::Value>,
    state: PollingState<O::Value>,
    default_interval: Duration,
) -> impl Stream<Item = PollResponse<O::Value>> + Send + 'static
where
    O: LongRunningOperation,
{
    let activation = Arc::new(activation);
    let seed = if state.last_response.is_complete() {
        None
    } else {
        Some(state)
    };
    futures::stream::unfold(seed, move |state| {
        let op = op.clone();
        let activation = activation.clone();
        async move {
            let Some(mut state) = state else {
                return None;
            };
            loop {
                if state.is_cancelled() {
                    debug!("poll loop: subscriber cancelled before poll");
                    return Some((state.cancelled_response(), None));
                }
                let delay = poll_delay(&state.last_response, default_interval);
                debug!(delay_ms = delay.as_millis() as u64, "poll loop: waiting before next poll");
                tokio::time::sleep(delay).await;
                if state.is_cancelled() {
                    debug!("poll loop: subscriber cancelled during delay");
                    return Some((state.cancelled_response(), None));
                }

                match op.poll(&activation, &state.last_response).await {
                    Ok(response) => {
                        state.consecutive_errors = 0;
                        state.last_response = response.clone();
                        if response.is_complete() {
                            info!(status = %response.status(), "poll loop: operation reached terminal status");
                            return Some((response, None));
                        }
                        debug!(status = %response.status(), "poll loop: status update");
                        return Some((response, Some(state)));
                    }
                    Err(e) => {
                        state.consecutive_errors = state.consecutive_errors.saturating_add(1);
                        warn!(
                            error = %e,
                            consecutive_errors = state.consecutive_errors,
                            "poll loop: poll failed; keeping last status and retrying"
                        );
                    }
                }
            }
        }
    })
}
