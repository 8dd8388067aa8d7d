//! Call-site timeouts for external collaborators

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::error::{Error, Result};

/// Run `fut` with an upper bound of `limit`.
///
/// On expiry the elapsed budget is reported through `on_timeout`, which picks
/// the error variant of the stage being bounded.
pub async fn bounded<T, F, E>(
    limit: Duration,
    operation: &str,
    on_timeout: E,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
    E: FnOnce(String) -> Error,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("TIMEOUT: {} took >{}s", operation, limit.as_secs_f64());
            Err(on_timeout(format!(
                "{} timed out after {}s",
                operation,
                limit.as_secs_f64()
            )))
        }
    }
}
