#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicU32, AtomicUsize, Ordering},
    time::Duration,
};

use alloy_consensus::{Transaction, TxEnvelope};
use alloy_eips::eip2718::Decodable2718;
use alloy_primitives::{Address, B256, Bytes};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::{Instant, sleep};
use tps_engine::{
    DispatchMode, EngineConfig, Identity, LedgerClient, LedgerError, RetryPolicy,
    generate_accounts, identities_from_records,
};

pub(crate) const CHAIN_ID: u64 = 0xfa5;

pub(crate) const fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// `count` identities derived from `seed`.
pub(crate) fn identities(count: usize, seed: u64) -> Vec<Identity> {
    identities_from_records(&generate_accounts(count, Some(seed))).unwrap()
}

pub(crate) fn addresses(identities: &[Identity]) -> Vec<Address> {
    identities.iter().map(Identity::address).collect()
}

/// Timed rounds of 100ms for 300ms, five senders per group.
pub(crate) fn test_config() -> EngineConfig {
    EngineConfig::default()
        .with_chain_id(CHAIN_ID)
        .with_interval(ms(100))
        .with_duration(ms(300))
        .with_batch_size(5)
        .with_concurrency(100)
        .with_retry(RetryPolicy::new(3, ms(20)))
        .with_request_timeout(ms(10_000))
        .with_mode(DispatchMode::TimedRounds)
}

/// One `send_raw_transaction` call seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Submission {
    pub(crate) from: Address,
    pub(crate) to: Address,
    pub(crate) nonce: u64,
    pub(crate) max_fee_per_gas: u128,
    pub(crate) accepted: bool,
    pub(crate) at: Duration,
}

/// In-memory ledger with configurable latency and failures.
#[derive(Debug)]
pub(crate) struct MockLedger {
    chain_id: u64,
    base_fee: u128,
    latency: Duration,
    fee_latency: Duration,
    created: Instant,
    nonces: HashMap<Address, u64>,
    unreachable_nonces: HashSet<Address>,
    failing: Mutex<HashMap<Address, u32>>,
    fee_failures: AtomicU32,
    submissions: Mutex<Vec<Submission>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    fee_requests: AtomicUsize,
    fee_peak: AtomicUsize,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub(crate) fn new() -> Self {
        Self {
            chain_id: CHAIN_ID,
            base_fee: 100,
            latency: Duration::ZERO,
            fee_latency: Duration::ZERO,
            created: Instant::now(),
            nonces: HashMap::new(),
            unreachable_nonces: HashSet::new(),
            failing: Mutex::new(HashMap::new()),
            fee_failures: AtomicU32::new(0),
            submissions: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            fee_requests: AtomicUsize::new(0),
            fee_peak: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub(crate) fn with_base_fee(mut self, base_fee: u128) -> Self {
        self.base_fee = base_fee;
        self
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Delays every base fee request by `latency`.
    pub(crate) fn with_fee_latency(mut self, latency: Duration) -> Self {
        self.fee_latency = latency;
        self
    }

    pub(crate) fn with_nonce(mut self, address: Address, nonce: u64) -> Self {
        self.nonces.insert(address, nonce);
        self
    }

    pub(crate) fn with_unreachable_nonce(mut self, address: Address) -> Self {
        self.unreachable_nonces.insert(address);
        self
    }

    /// Rejects the first `calls` submissions from `address`.
    pub(crate) fn with_failing_sender(self, address: Address, calls: u32) -> Self {
        self.failing.lock().insert(address, calls);
        self
    }

    /// Fails the next `count` base fee requests.
    pub(crate) fn with_fee_failures(self, count: u32) -> Self {
        self.fee_failures.store(count, Ordering::SeqCst);
        self
    }

    pub(crate) fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }

    /// Nonces accepted for `from`, in submission order.
    pub(crate) fn accepted_nonces(&self, from: Address) -> Vec<u64> {
        self.submissions
            .lock()
            .iter()
            .filter(|s| s.accepted && s.from == from)
            .map(|s| s.nonce)
            .collect()
    }

    pub(crate) fn accepted(&self) -> Vec<Submission> {
        self.submissions.lock().iter().filter(|s| s.accepted).cloned().collect()
    }

    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Most base fee requests ever outstanding at once.
    pub(crate) fn peak_fee_requests(&self) -> usize {
        self.fee_peak.load(Ordering::SeqCst)
    }

    fn decode(raw: &Bytes) -> (Address, Address, u64, u128) {
        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref()).unwrap();
        let TxEnvelope::Eip1559(signed) = &envelope else { panic!("expected eip1559 envelope") };
        let from =
            signed.signature().recover_address_from_prehash(&signed.signature_hash()).unwrap();
        (from, envelope.to().unwrap(), envelope.nonce(), envelope.max_fee_per_gas())
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        Ok(self.chain_id)
    }

    async fn latest_base_fee(&self) -> Result<u128, LedgerError> {
        let current = self.fee_requests.fetch_add(1, Ordering::SeqCst) + 1;
        self.fee_peak.fetch_max(current, Ordering::SeqCst);
        sleep(self.fee_latency).await;
        self.fee_requests.fetch_sub(1, Ordering::SeqCst);

        let failed = self
            .fee_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(LedgerError::Transport("header unavailable".into()));
        }
        Ok(self.base_fee)
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, LedgerError> {
        if self.unreachable_nonces.contains(&address) {
            return Err(LedgerError::Transport("connection refused".into()));
        }
        Ok(self.nonces.get(&address).copied().unwrap_or_default())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, LedgerError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
        sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let (from, to, nonce, max_fee_per_gas) = Self::decode(&raw);
        let accepted = {
            let mut failing = self.failing.lock();
            match failing.get_mut(&from) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    false
                }
                _ => true,
            }
        };
        self.submissions.lock().push(Submission {
            from,
            to,
            nonce,
            max_fee_per_gas,
            accepted,
            at: self.created.elapsed(),
        });

        if accepted {
            Ok(alloy_primitives::keccak256(&raw))
        } else {
            Err(LedgerError::Transport("transaction rejected".into()))
        }
    }
}
