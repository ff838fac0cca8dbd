//! Ledger collaborator used by the engine.

use std::{fmt, future::Future, time::Duration};

use alloy_primitives::{Address, B256, Bytes};
use alloy_provider::{Provider, ProviderBuilder, RootProvider};
use alloy_rpc_types_eth::BlockId;
use async_trait::async_trait;

use crate::LedgerError;

/// The subset of a JSON-RPC node the engine talks to.
///
/// Implementations must be safe for concurrent use; the engine shares one instance across
/// every worker.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Chain id served by the endpoint.
    async fn chain_id(&self) -> Result<u64, LedgerError>;

    /// Base fee per gas of the latest block, in wei.
    async fn latest_base_fee(&self) -> Result<u128, LedgerError>;

    /// Nonce of `address` including pending transactions.
    async fn pending_nonce(&self, address: Address) -> Result<u64, LedgerError>;

    /// Submits an EIP-2718 encoded signed transaction and returns its hash.
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, LedgerError>;
}

/// Bounds `fut` by `limit`, mapping expiry to [`LedgerError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, LedgerError>
where
    F: Future<Output = Result<T, LedgerError>>,
{
    tokio::time::timeout(limit, fut).await.unwrap_or(Err(LedgerError::Timeout(limit)))
}

/// [`LedgerClient`] over an alloy HTTP provider.
#[derive(Debug, Clone)]
pub struct AlloyLedgerClient {
    provider: RootProvider,
}

impl AlloyLedgerClient {
    /// Creates a client for the HTTP endpoint at `url`.
    pub fn new_http(url: &str) -> Result<Self, LedgerError> {
        let endpoint = url.parse().map_err(|e| LedgerError::InvalidEndpoint {
            url: url.to_string(),
            reason: format!("{e}"),
        })?;
        let provider = ProviderBuilder::new().disable_recommended_fillers().connect_http(endpoint);
        Ok(Self { provider })
    }
}

fn transport(e: impl fmt::Display) -> LedgerError {
    LedgerError::Transport(e.to_string())
}

#[async_trait]
impl LedgerClient for AlloyLedgerClient {
    async fn chain_id(&self) -> Result<u64, LedgerError> {
        self.provider.get_chain_id().await.map_err(transport)
    }

    async fn latest_base_fee(&self) -> Result<u128, LedgerError> {
        let block = self
            .provider
            .get_block(BlockId::latest())
            .hashes()
            .await
            .map_err(transport)?
            .ok_or(LedgerError::BlockNotFound)?;

        block
            .header
            .base_fee_per_gas
            .map(u128::from)
            .ok_or(LedgerError::MissingBaseFee(block.header.number))
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, LedgerError> {
        self.provider.get_transaction_count(address).pending().await.map_err(transport)
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<B256, LedgerError> {
        let pending = self.provider.send_raw_transaction(&raw).await.map_err(transport)?;
        Ok(*pending.tx_hash())
    }
}
