#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod accounts;
pub use accounts::{
    AccountRecord, GenesisAllocation, Identity, generate_accounts, genesis_allocations,
    identities_from_records, load_accounts, load_identities, merge_genesis, save_accounts,
    split_accounts, write_genesis,
};

mod accumulator;
pub use accumulator::{Completion, CompletionSender, Tally, ThroughputAccumulator, tps};

mod builder;
pub use builder::{PendingTransfer, SignedTransfer, TransferBuilder};

mod client;
pub use client::{AlloyLedgerClient, LedgerClient, with_timeout};

mod config;
pub use config::{DispatchMode, EngineConfig};

mod controller;
pub use controller::{RunController, RunReport, expected_rounds};

mod engine;
pub use engine::{DispatchEngine, GroupDispatch, Recipients};

mod error;
pub use error::{AccountsError, BuildError, EngineError, LedgerError, SubmitError};

mod fees;
pub use fees::{FeeOracle, FeeQuote};

mod pool;
pub use pool::AccountPool;

mod retry;
pub use retry::RetryPolicy;

mod sequence;
pub use sequence::{NonceClaim, SequenceState};
