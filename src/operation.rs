use crate::error::{BoxError, LroError, Result};
use crate::{CancelOutcome, PollResponse};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Trait implemented by the caller to plug transport into the poller.
///
/// The engine owns sequencing, delays and caching; implementations own the
/// network calls. `activate` runs at most once per successful start, `poll`
/// must stay callable after a terminal response was returned.
#[async_trait]
pub trait LongRunningOperation: Send + Sync + 'static {
    /// Payload carried by every poll response.
    type Value: Clone + Send + Sync + 'static;
    /// Final result produced from a terminal response.
    type Output: Send + 'static;

    /// Start the operation on the service.
    async fn activate(&self) -> Result<Self::Value, BoxError>;

    /// Query the current status. `last` is the most recent response this
    /// observer saw (the activation response on the first call).
    async fn poll(
        &self,
        activation: &PollResponse<Self::Value>,
        last: &PollResponse<Self::Value>,
    ) -> Result<PollResponse<Self::Value>, BoxError>;

    /// Ask the service to cancel. `current` is `None` when only the
    /// activation response is offered; answer `NeedsCurrentResponse` to get a
    /// fresh poll response on retry.
    async fn cancel(
        &self,
        _activation: &PollResponse<Self::Value>,
        _current: Option<&PollResponse<Self::Value>>,
    ) -> Result<CancelOutcome<Self::Value>, BoxError> {
        Err("cancellation is not supported by this operation".into())
    }

    /// Turn a terminal response into the final result. Called for `Failed`
    /// too, so implementations can surface the service's error payload.
    async fn fetch_result(
        &self,
        activation: &PollResponse<Self::Value>,
        terminal: &PollResponse<Self::Value>,
    ) -> Result<Self::Output, BoxError>;
}

type ActivateFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, BoxError>> + Send + Sync>;
type PollFn<T> =
    Arc<dyn Fn(PollResponse<T>, PollResponse<T>) -> BoxFuture<'static, Result<PollResponse<T>, BoxError>> + Send + Sync>;
type CancelFn<T> = Arc<
    dyn Fn(PollResponse<T>, Option<PollResponse<T>>) -> BoxFuture<'static, Result<CancelOutcome<T>, BoxError>>
        + Send
        + Sync,
>;
type FetchFn<T, U> = Arc<dyn Fn(PollResponse<T>, PollResponse<T>) -> BoxFuture<'static, Result<U, BoxError>> + Send + Sync>;

/// Closure-backed `LongRunningOperation`. Closures receive owned clones of
/// the responses so their futures can be `'static`.
pub struct FnOperation<T, U> {
    activate: ActivateFn<T>,
    poll: PollFn<T>,
    cancel: Option<CancelFn<T>>,
    fetch: FetchFn<T, U>,
}

impl<T, U> FnOperation<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Send + 'static,
{
    pub fn builder() -> FnOperationBuilder<T, U> {
        FnOperationBuilder {
            activate: None,
            poll: None,
            cancel: None,
            fetch: None,
            _output: PhantomData,
        }
    }
}

#[async_trait]
impl<T, U> LongRunningOperation for FnOperation<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Send + 'static,
{
    type Value = T;
    type Output = U;

    async fn activate(&self) -> Result<T, BoxError> {
        (self.activate)().await
    }

    async fn poll(&self, activation: &PollResponse<T>, last: &PollResponse<T>) -> Result<PollResponse<T>, BoxError> {
        (self.poll)(activation.clone(), last.clone()).await
    }

    async fn cancel(
        &self,
        activation: &PollResponse<T>,
        current: Option<&PollResponse<T>>,
    ) -> Result<CancelOutcome<T>, BoxError> {
        match &self.cancel {
            Some(cancel) => cancel(activation.clone(), current.cloned()).await,
            None => Err("cancellation is not supported by this operation".into()),
        }
    }

    async fn fetch_result(&self, activation: &PollResponse<T>, terminal: &PollResponse<T>) -> Result<U, BoxError> {
        (self.fetch)(activation.clone(), terminal.clone()).await
    }
}

pub struct FnOperationBuilder<T, U> {
    activate: Option<ActivateFn<T>>,
    poll: Option<PollFn<T>>,
    cancel: Option<CancelFn<T>>,
    fetch: Option<FetchFn<T, U>>,
    _output: PhantomData<fn() -> U>,
}

impl<T, U> FnOperationBuilder<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Send + 'static,
{
    pub fn activate<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        let activate: ActivateFn<T> = Arc::new(move || f().boxed());
        self.activate = Some(activate);
        self
    }

    pub fn poll<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(PollResponse<T>, PollResponse<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PollResponse<T>, BoxError>> + Send + 'static,
    {
        let poll: PollFn<T> =
            Arc::new(move |activation: PollResponse<T>, last: PollResponse<T>| f(activation, last).boxed());
        self.poll = Some(poll);
        self
    }

    pub fn cancel<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(PollResponse<T>, Option<PollResponse<T>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CancelOutcome<T>, BoxError>> + Send + 'static,
    {
        let cancel: CancelFn<T> = Arc::new(move |activation: PollResponse<T>, current: Option<PollResponse<T>>| {
            f(activation, current).boxed()
        });
        self.cancel = Some(cancel);
        self
    }

    pub fn fetch_result<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(PollResponse<T>, PollResponse<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<U, BoxError>> + Send + 'static,
    {
        let fetch: FetchFn<T, U> =
            Arc::new(move |activation: PollResponse<T>, terminal: PollResponse<T>| f(activation, terminal).boxed());
        self.fetch = Some(fetch);
        self
    }

    pub fn build(self) -> Result<FnOperation<T, U>> {
        let mut missing = Vec::new();
        if self.activate.is_none() {
            missing.push("activate");
        }
        if self.poll.is_none() {
            missing.push("poll");
        }
        if self.fetch.is_none() {
            missing.push("fetch_result");
        }
        match (self.activate, self.poll, self.fetch) {
            (Some(activate), Some(poll), Some(fetch)) => Ok(FnOperation {
                activate,
                poll,
                cancel: self.cancel,
                fetch,
            }),
            _ => Err(LroError::InvalidConfig(format!(
                "operation is missing required functions: {}",
                missing.join(", ")
            ))),
        }
    }
}

impl<T> FnOperationBuilder<T, T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Use the terminal response's value as the final result.
    pub fn fetch_terminal_value(self) -> Self {
        self.fetch_result(|_activation, terminal: PollResponse<T>| async move { Ok(terminal.into_value()) })
    }
}
