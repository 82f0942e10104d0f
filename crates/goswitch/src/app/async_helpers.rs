use std::future::Future;
use std::time::Duration;

use log::warn;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;

/// Run `future` for at most `timeout`. On expiry `cancel` is triggered and the
/// future is still awaited so it can clean up; its error is then replaced by
/// a timeout.
pub(super) async fn run_with_timeout<T, E, F, M>(
    timeout: Duration,
    timeout_operation: &'static str,
    cancel: &CancellationToken,
    future: F,
    map_error: M,
) -> Result<T, AppError>
where
    F: Future<Output = Result<T, E>>,
    M: FnOnce(E) -> AppError,
{
    tokio::pin!(future);

    tokio::select! {
        result = &mut future => result.map_err(map_error),
        () = tokio::time::sleep(timeout) => {
            warn!("{timeout_operation} exceeded {}s, cancelling", timeout.as_secs());
            cancel.cancel();
            match future.await {
                Ok(value) => Ok(value),
                Err(_) => Err(AppError::timeout(timeout_operation, timeout.as_secs())),
            }
        }
    }
}
