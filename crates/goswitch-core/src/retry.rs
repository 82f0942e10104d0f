use std::future::Future;
use std::time::Duration;

use log::debug;

/// Run `operation` once per entry of `retry_delays_secs`, sleeping for that
/// entry first. Stops early on success or on an error `should_retry` rejects.
///
/// # Errors
/// Returns the last error produced by `operation`.
///
/// # Panics
/// Panics if `retry_delays_secs` is empty, since no attempt would be made.
pub async fn retry_with_delays<T, E, Op, Fut, R>(
    operation_name: &'static str,
    retry_delays_secs: &[u64],
    should_retry: R,
    mut operation: Op,
) -> Result<T, E>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    assert!(
        !retry_delays_secs.is_empty(),
        "retry_with_delays needs at least one attempt"
    );

    let mut last_err = None;

    for (attempt, &delay_secs) in retry_delays_secs.iter().enumerate() {
        if delay_secs > 0 {
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                debug!(
                    "{} attempt {} failed: {}",
                    operation_name,
                    attempt + 1,
                    error
                );
                let retry = should_retry(&error);
                last_err = Some(error);
                if !retry {
                    break;
                }
            }
        }
    }

    match last_err {
        Some(error) => Err(error),
        None => unreachable!("at least one attempt ran"),
    }
}
