//! Error types for the dispatch engine and its collaborators.

use std::{path::PathBuf, time::Duration};

use alloy_primitives::Address;
use thiserror::Error;

/// Errors returned by a [`LedgerClient`](crate::LedgerClient).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The endpoint URL could not be parsed.
    #[error("invalid endpoint {url}: {reason}")]
    InvalidEndpoint {
        /// The rejected URL.
        url: String,
        /// Parser message.
        reason: String,
    },
    /// Transport or RPC level failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// The node returned no latest block.
    #[error("latest block not found")]
    BlockNotFound,
    /// The latest block carries no base fee.
    #[error("latest block {0} has no base fee")]
    MissingBaseFee(u64),
    /// The call did not complete within the request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors raised while reading or writing account files.
#[derive(Debug, Error)]
pub enum AccountsError {
    /// Reading or writing the file failed.
    #[error("failed to access accounts file {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid account list.
    #[error("failed to parse accounts file {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// A genesis template is not a JSON object.
    #[error("failed to parse genesis template {path}: {source}")]
    GenesisTemplate {
        /// Template path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// Serializing accounts failed.
    #[error("failed to serialize accounts: {0}")]
    Serialize(#[source] serde_json::Error),
    /// An account record carries an unparsable address.
    #[error("account #{position} has invalid address {address:?}")]
    InvalidAddress {
        /// Zero-based position in the file.
        position: usize,
        /// The rejected text.
        address: String,
    },
}

/// Errors raised while building or signing a transfer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    /// The identity's private key material cannot be parsed.
    #[error("invalid private key for {address}: {reason}")]
    InvalidKey {
        /// Identity address.
        address: Address,
        /// Parser message.
        reason: String,
    },
    /// The parsed key does not control the identity's address.
    #[error("private key for {address} derives {derived}")]
    KeyMismatch {
        /// Address from the accounts file.
        address: Address,
        /// Address derived from the key.
        derived: Address,
    },
    /// The signer rejected the transaction.
    #[error("failed to sign transfer from {address}: {reason}")]
    Signing {
        /// Identity address.
        address: Address,
        /// Signer message.
        reason: String,
    },
}

/// A submission that failed every attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed after {attempts} attempts: {last}")]
pub struct SubmitError {
    /// Number of attempts made.
    pub attempts: u32,
    /// Error from the final attempt.
    #[source]
    pub last: LedgerError,
}

/// Fatal errors that abort a run before the first round.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// There is nobody to send from.
    #[error("no sender accounts loaded")]
    NoSenders,
    /// Per-sender recipients were requested but there are fewer receivers than senders.
    #[error("not enough recipient accounts: {receivers} receivers for {senders} senders")]
    InsufficientReceivers {
        /// Sender count.
        senders: usize,
        /// Receiver count.
        receivers: usize,
    },
    /// The endpoint did not answer the preflight query.
    #[error("endpoint unreachable: {0}")]
    Unreachable(#[source] LedgerError),
    /// The endpoint serves a different chain than configured.
    #[error("chain id mismatch: configured {configured}, endpoint reports {remote}")]
    ChainIdMismatch {
        /// Configured chain id.
        configured: u64,
        /// Chain id reported by the endpoint.
        remote: u64,
    },
    /// The starting nonce of an identity could not be fetched.
    #[error("failed to get nonce for {address}: {source}")]
    InitialNonce {
        /// Identity address.
        address: Address,
        /// Underlying error.
        #[source]
        source: LedgerError,
    },
    /// The same address appears twice in the sender set.
    #[error("duplicate sender {0}")]
    DuplicateSender(Address),
}
