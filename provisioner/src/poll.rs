use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::error::ErrorKind;
use crate::Result;

/// Default delay between two polls of the node.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default upper bound on how long to wait for a transaction to be packed.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadline used when `timeout` is too large to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// How to wait on the node for something to show up, such as the receipt of a
/// freshly sent transaction. The wait is bounded by `timeout` and optionally by
/// a number of attempts, whichever comes first.
///
/// Time is measured with [`tokio::time`], so tests running on a paused clock
/// exercise the deadline without actually sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
            max_attempts: None,
        }
    }
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            max_attempts: None,
        }
    }

    /// Give up after `attempts` polls even if the timeout has not elapsed yet.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Call `task` until it yields a value, sleeping `interval` in between.
    /// Errors from `task` are returned as-is. Running out of time or attempts
    /// yields [`ErrorKind::TransactionNotPacked`] with `what` as the message.
    pub(crate) async fn poll<T, F, Fut>(&self, what: &str, mut task: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let now = Instant::now();
        let deadline = now
            .checked_add(self.timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match tokio::time::timeout_at(deadline, task()).await {
                Ok(Ok(Some(value))) => return Ok(value),
                Ok(Ok(None)) => {}
                Ok(Err(err)) => return Err(err),
                Err(_elapsed) => break,
            }

            if self.max_attempts.is_some_and(|max| attempts >= max) {
                break;
            }
            match Instant::now().checked_add(self.interval) {
                Some(next) if next <= deadline => {}
                _ => break,
            }

            trace!(target: "provisioner", attempts, "{what} not ready, polling again");
            tokio::time::sleep(self.interval).await;
        }

        Err(ErrorKind::TransactionNotPacked.message(format!(
            "{what} (gave up after {attempts} attempts over {:?})",
            self.timeout
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::RpcErrorCode;

    #[tokio::test(start_paused = true)]
    async fn test_poll_returns_first_value() -> Result<()> {
        let calls = &AtomicU32::new(0);
        let policy = PollPolicy::new(Duration::from_secs(1), Duration::from_secs(10));

        let value = policy
            .poll("receipt", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok((n == 3).then_some(n))
            })
            .await?;

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_deadline() {
        let started = Instant::now();
        let policy = PollPolicy::new(Duration::from_secs(1), Duration::from_secs(5));

        let err = policy
            .poll("receipt of 0xab", || async { Ok(None::<()>) })
            .await
            .unwrap_err();

        assert_eq!(*err.kind(), ErrorKind::TransactionNotPacked);
        assert!(err.to_string().contains("receipt of 0xab"));
        assert!(started.elapsed() <= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_max_attempts() {
        let calls = &AtomicU32::new(0);
        let policy =
            PollPolicy::new(Duration::from_millis(100), Duration::from_secs(60)).max_attempts(3);

        let err = policy
            .poll("receipt", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(None::<()>)
            })
            .await
            .unwrap_err();

        assert_eq!(*err.kind(), ErrorKind::TransactionNotPacked);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_unbounded_durations() {
        let calls = &AtomicU32::new(0);
        let policy = PollPolicy::new(Duration::from_secs(1), Duration::MAX).max_attempts(3);
        let err = policy
            .poll("receipt", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(None::<()>)
            })
            .await
            .unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::TransactionNotPacked);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let policy = PollPolicy::new(Duration::MAX, Duration::from_secs(5));
        let err = policy
            .poll("receipt", || async { Ok(None::<()>) })
            .await
            .unwrap_err();
        assert_eq!(*err.kind(), ErrorKind::TransactionNotPacked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_propagates_errors() {
        let policy = PollPolicy::default();
        let err = policy
            .poll("receipt", || async {
                Err::<Option<()>, _>(RpcErrorCode::QueryFailure.message("boom"))
            })
            .await
            .unwrap_err();

        assert_eq!(*err.kind(), ErrorKind::Rpc(RpcErrorCode::QueryFailure));
    }
}
