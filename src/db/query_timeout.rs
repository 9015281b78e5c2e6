// Database query timeout protection
use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::service::error::ServiceError;

pub struct QueryTimeout;

impl QueryTimeout {
    /// Execute a query with a timeout so a slow database cannot hold the
    /// webhook past the gateway's delivery timeout. A timeout is reported as a
    /// retryable persistence failure.
    pub async fn execute_with_timeout<F, T>(
        query_fn: F,
        timeout_duration: Duration,
    ) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match timeout(timeout_duration, query_fn).await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(_) => Err(ServiceError::Timeout(timeout_duration)),
        }
    }

    /// Default timeout for most queries (5 seconds)
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
}
