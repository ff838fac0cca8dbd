//! Sender identities and their sequence numbers.

use std::{collections::HashSet, ops::Range, sync::Arc, time::Duration};

use alloy_primitives::Address;
use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, info};

use crate::{EngineError, Identity, LedgerClient, NonceClaim, SequenceState, client::with_timeout};

/// Ordered sender identities with independently tracked nonces.
#[derive(Debug)]
pub struct AccountPool {
    identities: Vec<Identity>,
    sequences: Arc<SequenceState>,
}

impl AccountPool {
    /// Fetches the pending nonce of every identity, at most `concurrency` requests at a time.
    ///
    /// Any failure is fatal: the pool cannot issue transfers for an identity whose nonce is
    /// unknown.
    pub async fn initialize<C: LedgerClient + ?Sized>(
        identities: Vec<Identity>,
        client: &C,
        concurrency: usize,
        request_timeout: Duration,
    ) -> Result<Self, EngineError> {
        if identities.is_empty() {
            return Err(EngineError::NoSenders);
        }
        let mut seen = HashSet::with_capacity(identities.len());
        if let Some(duplicate) = identities.iter().map(Identity::address).find(|a| !seen.insert(*a))
        {
            return Err(EngineError::DuplicateSender(duplicate));
        }

        let nonces: Vec<(Address, u64)> = stream::iter(identities.iter().map(Identity::address))
            .map(|address| async move {
                let nonce = with_timeout(request_timeout, client.pending_nonce(address))
                    .await
                    .map_err(|source| EngineError::InitialNonce { address, source })?;
                debug!(%address, nonce, "Fetched initial nonce");
                Ok::<_, EngineError>((address, nonce))
            })
            .buffer_unordered(concurrency.max(1))
            .try_collect()
            .await?;

        let sequences = SequenceState::new();
        for (address, nonce) in nonces {
            sequences.insert(address, nonce);
        }
        info!(identities = identities.len(), "Initialized account pool");

        Ok(Self { identities, sequences: Arc::new(sequences) })
    }

    /// Identities in file order.
    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// Identity at `index`.
    pub fn identity(&self, index: usize) -> Option<&Identity> {
        self.identities.get(index)
    }

    /// Number of identities.
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    /// Whether the pool is empty. Never true for an initialized pool.
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Next nonce of `address`.
    pub fn current_nonce(&self, address: Address) -> Option<u64> {
        self.sequences.read(address)
    }

    /// Claims the next nonce of `address`; see [`SequenceState::claim`].
    pub fn claim(&self, address: Address) -> Option<NonceClaim> {
        self.sequences.claim(address)
    }

    /// Partitions identity indices into consecutive groups of at most `size`.
    pub fn groups(&self, size: usize) -> Vec<Range<usize>> {
        let size = size.max(1);
        (0..self.identities.len())
            .step_by(size)
            .map(|start| start..(start + size).min(self.identities.len()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use alloy_primitives::{B256, Bytes};
    use async_trait::async_trait;

    use super::*;
    use crate::LedgerError;

    struct NonceClient {
        nonces: HashMap<Address, u64>,
    }

    #[async_trait]
    impl LedgerClient for NonceClient {
        async fn chain_id(&self) -> Result<u64, LedgerError> {
            Ok(1)
        }

        async fn latest_base_fee(&self) -> Result<u128, LedgerError> {
            Ok(0)
        }

        async fn pending_nonce(&self, address: Address) -> Result<u64, LedgerError> {
            self.nonces
                .get(&address)
                .copied()
                .ok_or_else(|| LedgerError::Transport(format!("unknown account {address}")))
        }

        async fn send_raw_transaction(&self, _: Bytes) -> Result<B256, LedgerError> {
            Ok(B256::ZERO)
        }
    }

    fn identity(byte: u8) -> Identity {
        Identity::new(Address::repeat_byte(byte), "0x00")
    }

    #[tokio::test]
    async fn test_initialize_fetches_every_nonce() {
        let client = NonceClient {
            nonces: (1..=5u8).map(|b| (Address::repeat_byte(b), b as u64 * 10)).collect(),
        };
        let identities = (1..=5u8).map(identity).collect();

        let pool = AccountPool::initialize(identities, &client, 2, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(pool.len(), 5);
        for b in 1..=5u8 {
            assert_eq!(pool.current_nonce(Address::repeat_byte(b)), Some(b as u64 * 10));
        }
    }

    #[tokio::test]
    async fn test_initialize_fails_on_missing_nonce() {
        let client = NonceClient { nonces: HashMap::from([(Address::repeat_byte(1), 0)]) };
        let identities = vec![identity(1), identity(2)];

        let err = AccountPool::initialize(identities, &client, 4, Duration::from_secs(1))
            .await
            .unwrap_err();
        match err {
            EngineError::InitialNonce { address, .. } => {
                assert_eq!(address, Address::repeat_byte(2))
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_initialize_rejects_empty_and_duplicates() {
        let client = NonceClient { nonces: HashMap::new() };
        let err = AccountPool::initialize(Vec::new(), &client, 1, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoSenders));

        let err = AccountPool::initialize(
            vec![identity(1), identity(1)],
            &client,
            1,
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateSender(_)));
    }

    #[tokio::test]
    async fn test_groups_cover_all_indices() {
        let client = NonceClient {
            nonces: (1..=7u8).map(|b| (Address::repeat_byte(b), 0)).collect(),
        };
        let pool = AccountPool::initialize(
            (1..=7u8).map(identity).collect(),
            &client,
            7,
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        assert_eq!(pool.groups(3), vec![0..3, 3..6, 6..7]);
        assert_eq!(pool.groups(10), vec![0..7]);
        assert_eq!(pool.groups(0).len(), 7);
    }
}
