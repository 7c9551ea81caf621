use crate::config::PollerConfig;
use crate::error::{LroError, Result};
use crate::operation::LongRunningOperation;
use crate::{CancelOutcome, OperationStatus, PollResponse};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tokio::runtime::RuntimeFlavor;
use tracing::debug;

pub mod activation;
pub mod poll_loop;
pub mod result;
pub mod sync;

use activation::{ActivationGate, Attach};
use poll_loop::{PollingState, poll_loop};
use sync::SyncPoller;

/// Entry point for one logical long-running operation.
///
/// Clones share the operation and its activation gate, so any number of
/// tasks can attach; `activate()` still runs at most once per success. Each
/// `subscribe()` and `sync_poller()` call gets independent polling state.
pub struct Poller<O: LongRunningOperation> {
    op: Arc<O>,
    gate: Arc<ActivationGate<O::Value>>,
    config: PollerConfig,
}

impl<O: LongRunningOperation> Clone for Poller<O> {
    fn clone(&self) -> Self {
        Self {
            op: self.op.clone(),
            gate: self.gate.clone(),
            config: self.config.clone(),
        }
    }
}

impl<O: LongRunningOperation> Poller<O> {
    /// Poller with the default configuration (10 s poll interval).
    pub fn new(op: O) -> Self {
        Self {
            op: Arc::new(op),
            gate: Arc::new(ActivationGate::new()),
            config: PollerConfig::default(),
        }
    }

    /// Poller with a custom configuration; rejects zero intervals.
    pub fn with_config(op: O, config: PollerConfig) -> Result<Self> {
        Self::from_arc(Arc::new(op), config)
    }

    pub fn from_arc(op: Arc<O>, config: PollerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            op,
            gate: Arc::new(ActivationGate::new()),
            config,
        })
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn operation(&self) -> &Arc<O> {
        &self.op
    }

    pub fn is_activated(&self) -> bool {
        self.gate.is_activated()
    }

    /// Shared activation response, starting the operation if nobody has yet.
    pub async fn activation(&self) -> Result<PollResponse<O::Value>> {
        let op: &O = &self.op;
        self.gate
            .attach(move || op.activate(), self.config.activation_retry_delay())
            .await
    }

    /// Non-blocking variant of `activation`: `Busy` while another caller activates.
    pub async fn try_activation(&self) -> Result<Attach<O::Value>> {
        let op: &O = &self.op;
        self.gate.try_attach(move || op.activate()).await
    }

    /// Attach and start a fresh poll loop seeded from the activation response.
    pub async fn subscribe(&self) -> Result<Subscription<O>> {
        let activation = self.activation().await?;
        let state = PollingState::new(activation.clone());
        let cancelled = state.cancel_flag();
        let inner = poll_loop(
            self.op.clone(),
            activation.clone(),
            state,
            self.config.default_poll_interval(),
        )
        .boxed();
        debug!("poller: new subscription");
        Ok(Subscription {
            inner,
            cancelled,
            op: self.op.clone(),
            activation: Arc::new(activation),
        })
    }

    /// Attach and build a pull-style façade with its own remembered state.
    pub async fn sync_poller(&self) -> Result<SyncPoller<O>> {
        let activation = self.activation().await?;
        Ok(SyncPoller::new(
            self.op.clone(),
            activation,
            self.config.default_poll_interval(),
        ))
    }

    /// Subscribe and drain to the terminal response.
    pub async fn last(&self) -> Result<AsyncPollResponse<O>> {
        let subscription = self.subscribe().await?;
        let activation = subscription.activation.clone();
        match subscription.fold(None, |_, item| async move { Some(item) }).await {
            Some(item) => Ok(item),
            // Only reachable when the loop had nothing to poll.
            None => Err(LroError::NotComplete(activation.status())),
        }
    }
}

/// Push-style stream of status updates for one subscriber.
///
/// Ends after the first terminal response, or with a synthetic
/// `UserCancelled` response after `stop()`. Dropping it stops observing
/// without cancelling the remote operation.
pub struct Subscription<O: LongRunningOperation> {
    inner: BoxStream<'static, PollResponse<O::Value>>,
    cancelled: Arc<AtomicBool>,
    op: Arc<O>,
    activation: Arc<PollResponse<O::Value>>,
}

impl<O: LongRunningOperation> Subscription<O> {
    /// Stop before the next poll. The remote operation keeps running.
    pub fn stop(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn activation(&self) -> &PollResponse<O::Value> {
        &self.activation
    }
}

impl<O: LongRunningOperation> Stream for Subscription<O> {
    type Item = AsyncPollResponse<O>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        this.inner.poll_next_unpin(cx).map(|next| {
            next.map(|response| AsyncPollResponse {
                response,
                op: this.op.clone(),
                activation: this.activation.clone(),
            })
        })
    }
}

/// A streamed response that can also cancel the operation or fetch its result.
pub struct AsyncPollResponse<O: LongRunningOperation> {
    response: PollResponse<O::Value>,
    op: Arc<O>,
    activation: Arc<PollResponse<O::Value>>,
}

impl<O: LongRunningOperation> AsyncPollResponse<O> {
    pub fn response(&self) -> &PollResponse<O::Value> {
        &self.response
    }

    pub fn into_response(self) -> PollResponse<O::Value> {
        self.response
    }

    pub fn status(&self) -> OperationStatus {
        self.response.status()
    }

    pub fn value(&self) -> &O::Value {
        self.response.value()
    }

    /// Cancel the remote operation, offering this response as the current one.
    pub async fn cancel_operation(&self) -> Result<O::Value> {
        match self
            .op
            .cancel(&self.activation, Some(&self.response))
            .await
            .map_err(LroError::cancel)?
        {
            CancelOutcome::Cancelled(value) => Ok(value),
            CancelOutcome::NeedsCurrentResponse => Err(LroError::CancelRequiresPollResponse),
        }
    }

    /// Final result built from this response. Fails unless it is terminal.
    pub async fn final_result(&self) -> Result<O::Output> {
        if !self.response.is_complete() {
            return Err(LroError::NotComplete(self.response.status()));
        }
        result::fetch_final_result(self.op.as_ref(), &self.activation, &self.response).await
    }
}

impl<O> fmt::Debug for AsyncPollResponse<O>
where
    O: LongRunningOperation,
    O::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncPollResponse")
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

/// Run a future to completion from synchronous code, reusing the current
/// tokio runtime when there is one. A current-thread runtime cannot be
/// blocked from inside, so that case is an error.
pub(crate) fn block_on<F: Future>(fut: F) -> Result<F::Output> {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        if handle.runtime_flavor() != RuntimeFlavor::MultiThread {
            return Err(LroError::Runtime(
                "blocking calls need a multi-threaded runtime; use the async method instead".to_string(),
            ));
        }
        Ok(tokio::task::block_in_place(|| handle.block_on(fut)))
    } else {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| LroError::Runtime(e.to_string()))?;
        Ok(rt.block_on(fut))
    }
}
