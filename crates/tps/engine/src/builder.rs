//! Assembles and signs value transfers.

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_eips::eip2718::Encodable2718;
use alloy_network::TxSignerSync;
use alloy_primitives::{Address, B256, Bytes, TxKind, U256};
use alloy_signer_local::PrivateKeySigner;

use crate::{BuildError, EngineConfig, FeeQuote, Identity};

/// A transfer ready to be signed. Consumed by [`TransferBuilder::sign`].
#[derive(Debug, Clone)]
pub struct PendingTransfer<'a> {
    /// Sending identity.
    pub from: &'a Identity,
    /// Recipient.
    pub to: Address,
    /// Sender nonce.
    pub nonce: u64,
    /// Round pricing.
    pub fee: FeeQuote,
    /// Amount in wei.
    pub value: U256,
    /// Gas limit.
    pub gas_limit: u64,
}

/// A signed, EIP-2718 encoded transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransfer {
    /// Sender address.
    pub from: Address,
    /// Recipient.
    pub to: Address,
    /// Sender nonce.
    pub nonce: u64,
    /// Transaction hash.
    pub hash: B256,
    /// Encoded envelope, ready for `eth_sendRawTransaction`.
    pub raw: Bytes,
}

/// Builds EIP-1559 transfers for one chain.
#[derive(Debug, Clone, Copy)]
pub struct TransferBuilder {
    chain_id: u64,
    gas_limit: u64,
    value: U256,
}

impl TransferBuilder {
    /// Creates a builder for `chain_id`.
    pub const fn new(chain_id: u64, gas_limit: u64, value: U256) -> Self {
        Self { chain_id, gas_limit, value }
    }

    /// Creates a builder from the run configuration.
    pub const fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.chain_id, config.gas_limit, config.value)
    }

    /// Assembles a transfer from `from` to `to`.
    pub const fn build<'a>(
        &self,
        from: &'a Identity,
        to: Address,
        nonce: u64,
        fee: FeeQuote,
    ) -> PendingTransfer<'a> {
        PendingTransfer { from, to, nonce, fee, value: self.value, gas_limit: self.gas_limit }
    }

    /// Signs `transfer` with its sender's key. Pure: performs no I/O.
    ///
    /// The chain id is part of the signed payload, so the result cannot be replayed on
    /// another chain.
    pub fn sign(&self, transfer: PendingTransfer<'_>) -> Result<SignedTransfer, BuildError> {
        let address = transfer.from.address();
        let signer: PrivateKeySigner = transfer
            .from
            .private_key()
            .parse()
            .map_err(|e| BuildError::InvalidKey { address, reason: format!("{e}") })?;
        if signer.address() != address {
            return Err(BuildError::KeyMismatch { address, derived: signer.address() });
        }

        let mut tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce: transfer.nonce,
            gas_limit: transfer.gas_limit,
            max_fee_per_gas: transfer.fee.max_fee_per_gas,
            max_priority_fee_per_gas: transfer.fee.max_priority_fee_per_gas,
            to: TxKind::Call(transfer.to),
            value: transfer.value,
            access_list: Default::default(),
            input: Default::default(),
        };

        let signature = signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| BuildError::Signing { address, reason: e.to_string() })?;
        let signed = tx.into_signed(signature);
        let hash = *signed.hash();
        let raw = Bytes::from(TxEnvelope::from(signed).encoded_2718());

        Ok(SignedTransfer { from: address, to: transfer.to, nonce: transfer.nonce, hash, raw })
    }
}
