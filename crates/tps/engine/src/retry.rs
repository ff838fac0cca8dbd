//! Bounded retry for transaction submission.

use std::time::Duration;

use alloy_primitives::{B256, Bytes};
use tokio::time::sleep;
use tracing::debug;

use crate::{LedgerClient, SubmitError, client::with_timeout};

/// Fixed-delay retry policy for a single submission.
///
/// Every attempt resends the same signed bytes, so a retry can never consume a second nonce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause between two attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, delay: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    /// Creates a policy.
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Sends `raw` until it is accepted or the attempts run out. Each attempt is bounded by
    /// `request_timeout`.
    pub async fn submit<C: LedgerClient + ?Sized>(
        &self,
        client: &C,
        raw: &Bytes,
        request_timeout: Duration,
    ) -> Result<B256, SubmitError> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match with_timeout(request_timeout, client.send_raw_transaction(raw.clone())).await {
                Ok(hash) => return Ok(hash),
                Err(last) if attempt >= max_attempts => {
                    return Err(SubmitError { attempts: attempt, last });
                }
                Err(e) => {
                    debug!(attempt, error = %e, "Submission attempt failed, retrying");
                    sleep(self.delay).await;
                }
            }
        }
    }
}
