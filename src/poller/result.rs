use crate::PollResponse;
use crate::error::{LroError, Result};
use crate::operation::LongRunningOperation;
use tracing::debug;

/// Produce the caller-visible result from a terminal response.
///
/// `Failed` terminals are still handed to `fetch_result` so the operation can
/// raise its own domain error; whatever it returns is propagated unchanged.
pub async fn fetch_final_result<O>(
    op: &O,
    activation: &PollResponse<O::Value>,
    terminal: &PollResponse<O::Value>,
) -> Result<O::Output>
where
    O: LongRunningOperation + ?Sized,
{
    debug!(status = %terminal.status(), "fetching final result");
    op.fetch_result(activation, terminal)
        .await
        .map_err(LroError::fetch_result)
}
