use std::time::Duration;

/// Configuration for the [`SendExecutor`](crate::SendExecutor).
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of sends in flight at once within a chunk. Enforced
    /// via a [`tokio::sync::Semaphore`].
    pub max_concurrent: usize,

    /// Maximum wall-clock time allowed for a single provider call.
    pub provider_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            provider_timeout: Duration::from_secs(30),
        }
    }
}
