use super::block_on;
use super::poll_loop::{PollingState, poll_loop};
use super::result::fetch_final_result;
use crate::error::{LroError, Result};
use crate::operation::LongRunningOperation;
use crate::{CancelOutcome, OperationStatus, PollResponse};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Pull-style façade over one logical operation.
///
/// Remembers the last response it saw and, once observed, the terminal
/// response. That state belongs to this instance alone; other pollers of
/// the same operation keep their own.
pub struct SyncPoller<O: LongRunningOperation> {
    op: Arc<O>,
    activation: PollResponse<O::Value>,
    last_response: PollResponse<O::Value>,
    terminal_response: Option<PollResponse<O::Value>>,
    advanced: bool,
    poll_interval: Duration,
}

impl<O: LongRunningOperation> SyncPoller<O> {
    pub(crate) fn new(op: Arc<O>, activation: PollResponse<O::Value>, poll_interval: Duration) -> Self {
        Self {
            op,
            last_response: activation.clone(),
            activation,
            terminal_response: None,
            advanced: false,
            poll_interval,
        }
    }

    pub fn activation(&self) -> &PollResponse<O::Value> {
        &self.activation
    }

    pub fn last_response(&self) -> &PollResponse<O::Value> {
        &self.last_response
    }

    pub fn terminal_response(&self) -> Option<&PollResponse<O::Value>> {
        self.terminal_response.as_ref()
    }

    /// True once any poll has moved past the activation response.
    pub fn has_advanced(&self) -> bool {
        self.advanced
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Default delay for later waits; the server's retry-after still wins when positive.
    pub fn set_poll_interval(&mut self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(LroError::InvalidArgument("poll interval must be positive".to_string()));
        }
        self.poll_interval = interval;
        Ok(())
    }

    fn record(&mut self, response: PollResponse<O::Value>) {
        if response.is_complete() {
            self.terminal_response = Some(response.clone());
        }
        self.last_response = response;
        self.advanced = true;
    }

    /// Exactly one status call, no delay. Also allowed after a terminal
    /// status: the service is asked again.
    pub async fn poll(&mut self) -> Result<PollResponse<O::Value>> {
        let response = self
            .op
            .poll(&self.activation, &self.last_response)
            .await
            .map_err(LroError::poll)?;
        debug!(status = %response.status(), "sync poller: polled");
        self.record(response.clone());
        Ok(response)
    }

    /// Run a poll loop from the remembered response until `matches` accepts
    /// an element. Returns the match, or the final element if the loop ended
    /// first. Does not touch `self` so a timed-out wait leaves no trace.
    async fn observe<P>(&self, matches: P) -> Option<PollResponse<O::Value>>
    where
        P: Fn(&PollResponse<O::Value>) -> bool,
    {
        let state = PollingState::new(self.last_response.clone());
        let mut stream = std::pin::pin!(poll_loop(
            self.op.clone(),
            self.activation.clone(),
            state,
            self.poll_interval
        ));
        let mut seen = None;
        while let Some(response) = stream.next().await {
            if matches(&response) {
                return Some(response);
            }
            seen = Some(response);
        }
        seen
    }

    /// Block until the operation reaches a terminal status.
    pub async fn wait_for_completion(&mut self) -> Result<PollResponse<O::Value>> {
        if let Some(terminal) = &self.terminal_response {
            return Ok(terminal.clone());
        }
        match self.observe(|response| response.is_complete()).await {
            Some(terminal) => {
                info!(status = %terminal.status(), "sync poller: operation completed");
                self.record(terminal.clone());
                Ok(terminal)
            }
            None => Err(LroError::NotComplete(self.last_response.status())),
        }
    }

    /// `wait_for_completion` bounded by `timeout`. On timeout nothing is recorded.
    pub async fn wait_for_completion_timeout(&mut self, timeout: Duration) -> Result<PollResponse<O::Value>> {
        check_timeout(timeout)?;
        tokio::time::timeout(timeout, self.wait_for_completion())
            .await
            .map_err(|_| LroError::Timeout(timeout))?
    }

    /// Block until the first response with `status`, terminal or not.
    ///
    /// Fails with `StatusNotObserved` if the operation completes without
    /// ever reporting `status`.
    pub async fn wait_until(&mut self, status: OperationStatus) -> Result<PollResponse<O::Value>> {
        if self.last_response.status() == status {
            return Ok(self.last_response.clone());
        }
        if self.last_response.is_complete() {
            return Err(LroError::StatusNotObserved {
                target: status,
                ended: self.last_response.status(),
            });
        }
        match self.observe(|response| response.status() == status).await {
            Some(response) => {
                self.record(response.clone());
                if response.status() == status {
                    Ok(response)
                } else {
                    Err(LroError::StatusNotObserved {
                        target: status,
                        ended: response.status(),
                    })
                }
            }
            None => Err(LroError::StatusNotObserved {
                target: status,
                ended: self.last_response.status(),
            }),
        }
    }

    pub async fn wait_until_timeout(
        &mut self,
        status: OperationStatus,
        timeout: Duration,
    ) -> Result<PollResponse<O::Value>> {
        check_timeout(timeout)?;
        tokio::time::timeout(timeout, self.wait_until(status))
            .await
            .map_err(|_| LroError::Timeout(timeout))?
    }

    /// Final result of the operation, waiting for completion first if no
    /// terminal response has been recorded. Never polls once one has.
    pub async fn final_result(&mut self) -> Result<O::Output> {
        let terminal = match &self.terminal_response {
            Some(terminal) => terminal.clone(),
            None => self.wait_for_completion().await?,
        };
        fetch_final_result(self.op.as_ref(), &self.activation, &terminal).await
    }

    /// Cancel the remote operation.
    ///
    /// The cancel function is first offered only the activation response.
    /// Before any poll has moved past activation that answer is final and no
    /// poll is made. Afterwards a `NeedsCurrentResponse` answer triggers one
    /// extra poll and cancel is retried with the fresh response.
    pub async fn cancel_operation(&mut self) -> Result<O::Value> {
        debug!(advanced = self.advanced, "sync poller: cancelling operation");
        let outcome = self
            .op
            .cancel(&self.activation, None)
            .await
            .map_err(LroError::cancel)?;
        match outcome {
            CancelOutcome::Cancelled(value) => return Ok(value),
            CancelOutcome::NeedsCurrentResponse if !self.advanced => {
                return Err(LroError::CancelRequiresPollResponse);
            }
            CancelOutcome::NeedsCurrentResponse => {}
        }

        debug!("sync poller: cancel needs a current response; polling once");
        let current = self.poll().await?;
        match self
            .op
            .cancel(&self.activation, Some(&current))
            .await
            .map_err(LroError::cancel)?
        {
            CancelOutcome::Cancelled(value) => Ok(value),
            CancelOutcome::NeedsCurrentResponse => Err(LroError::CancelRequiresPollResponse),
        }
    }

    pub fn poll_blocking(&mut self) -> Result<PollResponse<O::Value>> {
        block_on(self.poll())?
    }

    /// Blocking wrapper around `wait_for_completion`; `None` waits without bound.
    pub fn wait_for_completion_blocking(&mut self, timeout: Option<Duration>) -> Result<PollResponse<O::Value>> {
        match timeout {
            Some(timeout) => block_on(self.wait_for_completion_timeout(timeout))?,
            None => block_on(self.wait_for_completion())?,
        }
    }

    pub fn wait_until_blocking(
        &mut self,
        status: OperationStatus,
        timeout: Option<Duration>,
    ) -> Result<PollResponse<O::Value>> {
        match timeout {
            Some(timeout) => block_on(self.wait_until_timeout(status, timeout))?,
            None => block_on(self.wait_until(status))?,
        }
    }

    pub fn final_result_blocking(&mut self) -> Result<O::Output> {
        block_on(self.final_result())?
    }

    pub fn cancel_operation_blocking(&mut self) -> Result<O::Value> {
        block_on(self.cancel_operation())?
    }
}

fn check_timeout(timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        return Err(LroError::InvalidArgument("timeout must be positive".to_string()));
    }
    Ok(())
}
