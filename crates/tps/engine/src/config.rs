//! Run configuration.

use std::time::Duration;

use alloy_primitives::U256;

use crate::{EngineError, RetryPolicy};

/// How the dispatch engine schedules transfers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchMode {
    /// One transfer per sender per round, rounds fired by a fixed-interval timer over
    /// round-robin groups of `batch_size` senders.
    TimedRounds,
    /// Every sender issues `transfers_per_sender` sequential transfers, `pacing` apart,
    /// concurrently with all other senders.
    FixedCount {
        /// Transfers each sender issues.
        transfers_per_sender: u64,
        /// Delay between two transfers of the same sender.
        pacing: Duration,
    },
}

impl DispatchMode {
    /// Fixed-count mode with 100 transfers per sender, 300ms apart.
    pub const fn fixed_count() -> Self {
        Self::FixedCount { transfers_per_sender: 100, pacing: Duration::from_millis(300) }
    }
}

/// Configuration for a benchmark run.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Chain id used for EIP-155 scoped signatures.
    pub chain_id: u64,
    /// Gas limit of each transfer.
    pub gas_limit: u64,
    /// Priority fee in gwei.
    pub tip_gwei: u64,
    /// Value of each transfer in wei.
    pub value: U256,
    /// Round timer period.
    pub interval: Duration,
    /// Senders per round group.
    pub batch_size: usize,
    /// Total wall-clock budget of the run.
    pub duration: Duration,
    /// Maximum submissions in flight across the whole run.
    pub concurrency: usize,
    /// Submission retry policy.
    pub retry: RetryPolicy,
    /// Upper bound for a single ledger call.
    pub request_timeout: Duration,
    /// Scheduling mode.
    pub mode: DispatchMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_id: 0xfa5,
            gas_limit: 21_000,
            tip_gwei: 1,
            value: U256::from(1_000_000_000_000_000u64),
            interval: Duration::from_millis(500),
            batch_size: 500,
            duration: Duration::from_millis(6_000_000),
            concurrency: 100,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(10),
            mode: DispatchMode::TimedRounds,
        }
    }
}

impl EngineConfig {
    /// Sets the chain id.
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Sets the gas limit per transfer.
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Sets the priority fee in gwei.
    pub fn with_tip_gwei(mut self, tip_gwei: u64) -> Self {
        self.tip_gwei = tip_gwei;
        self
    }

    /// Sets the transfer value in wei.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets the round interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the round group size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the total run duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Sets the in-flight submission limit.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the dispatch mode.
    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Rejects configurations the engine cannot run.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.batch_size == 0 {
            return Err(EngineError::InvalidConfig("batch size must be positive".into()));
        }
        if self.concurrency == 0 {
            return Err(EngineError::InvalidConfig("concurrency must be positive".into()));
        }
        if self.interval.is_zero() {
            return Err(EngineError::InvalidConfig("round interval must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(EngineError::InvalidConfig(
                "at least one submission attempt is required".into(),
            ));
        }
        if let DispatchMode::FixedCount { transfers_per_sender: 0, .. } = self.mode {
            return Err(EngineError::InvalidConfig("transfers per sender must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chain_id, 4005);
        assert_eq!(config.tip_gwei, 1);
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        assert!(EngineConfig::default().with_batch_size(0).validate().is_err());
        assert!(EngineConfig::default().with_concurrency(0).validate().is_err());
        assert!(EngineConfig::default().with_interval(Duration::ZERO).validate().is_err());
        assert!(
            EngineConfig::default()
                .with_retry(RetryPolicy::new(0, Duration::ZERO))
                .validate()
                .is_err()
        );
        let mode = DispatchMode::FixedCount { transfers_per_sender: 0, pacing: Duration::ZERO };
        assert!(EngineConfig::default().with_mode(mode).validate().is_err());
    }
}
