use std::{path::PathBuf, time::Duration};

use alloy_primitives::{Address, U256};
use clap::{Args, Parser, Subcommand};
use tps_cli_utils::LogArgs;
use tps_engine::{DispatchMode, EngineConfig, RetryPolicy};

/// Transfer throughput benchmark for EVM JSON-RPC endpoints.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// What to do.
    #[command(subcommand)]
    pub command: Command,

    /// Logging configuration.
    #[command(flatten)]
    pub log: LogArgs,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Send one transfer per sender of the next batch on every round tick.
    Rounds(RoundsArgs),
    /// Send a fixed number of paced transfers from every sender.
    Fixed(FixedArgs),
    /// Write a file of random accounts.
    Generate(GenerateArgs),
    /// Split an accounts file into several files.
    Split(SplitArgs),
    /// Fund accounts files in a genesis template.
    Genesis(GenesisArgs),
}

/// Endpoint and dispatch settings shared by the benchmark subcommands.
#[derive(Args, Debug, Clone)]
pub(crate) struct EngineArgs {
    /// JSON-RPC endpoint.
    #[arg(long, env = "TPS_RPC_URL", default_value = "http://localhost:8545")]
    pub rpc_url: String,

    /// Chain id transfers are signed for.
    #[arg(long, env = "TPS_CHAIN_ID", default_value = "4005")]
    pub chain_id: u64,

    /// Gas limit of every transfer.
    #[arg(long, env = "TPS_GAS_LIMIT", default_value = "21000")]
    pub gas_limit: u64,

    /// Priority fee in gwei.
    #[arg(long, env = "TPS_TIP_GWEI", default_value = "1")]
    pub tip_gwei: u64,

    /// Value of every transfer in wei.
    #[arg(long, env = "TPS_VALUE_WEI", default_value = "1000000000000000")]
    pub value_wei: U256,

    /// Maximum submissions in flight across the whole run.
    #[arg(long, env = "TPS_CONCURRENCY", default_value = "100")]
    pub concurrency: usize,

    /// Total run duration in milliseconds.
    #[arg(long, env = "TPS_DURATION_MS", default_value = "6000000")]
    pub duration_ms: u64,

    /// Round interval in milliseconds.
    #[arg(long, env = "TPS_INTERVAL_MS", default_value = "500")]
    pub interval_ms: u64,

    /// Senders per round.
    #[arg(long, env = "TPS_BATCH_SIZE", default_value = "500")]
    pub batch_size: usize,

    /// Attempts per submission.
    #[arg(long, env = "TPS_MAX_ATTEMPTS", default_value = "3")]
    pub max_attempts: u32,

    /// Delay between submission attempts in milliseconds.
    #[arg(long, env = "TPS_RETRY_DELAY_MS", default_value = "500")]
    pub retry_delay_ms: u64,

    /// Timeout of every JSON-RPC call in milliseconds.
    #[arg(long, env = "TPS_REQUEST_TIMEOUT_MS", default_value = "10000")]
    pub request_timeout_ms: u64,

    /// Write the final report as JSON to this file.
    #[arg(long, env = "TPS_OUTPUT")]
    pub output: Option<PathBuf>,
}

impl EngineArgs {
    /// Engine configuration for `mode`.
    pub(crate) fn config(&self, mode: DispatchMode) -> EngineConfig {
        EngineConfig::default()
            .with_chain_id(self.chain_id)
            .with_gas_limit(self.gas_limit)
            .with_tip_gwei(self.tip_gwei)
            .with_value(self.value_wei)
            .with_concurrency(self.concurrency)
            .with_duration(Duration::from_millis(self.duration_ms))
            .with_interval(Duration::from_millis(self.interval_ms))
            .with_batch_size(self.batch_size)
            .with_retry(RetryPolicy::new(
                self.max_attempts,
                Duration::from_millis(self.retry_delay_ms),
            ))
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms))
            .with_mode(mode)
    }
}

/// Arguments of `rounds`.
#[derive(Args, Debug, Clone)]
pub(crate) struct RoundsArgs {
    /// Engine settings.
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Accounts file of the senders.
    #[arg(long, env = "TPS_SENDERS", default_value = "accounts.json")]
    pub senders: PathBuf,

    /// Accounts file of the receivers; sender `k` pays receiver `k`.
    #[arg(long, env = "TPS_RECEIVERS", conflicts_with = "target")]
    pub receivers: Option<PathBuf>,

    /// Single address receiving every transfer.
    #[arg(long, env = "TPS_TARGET", required_unless_present = "receivers")]
    pub target: Option<Address>,
}

/// Arguments of `fixed`.
#[derive(Args, Debug, Clone)]
pub(crate) struct FixedArgs {
    /// Engine settings.
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Accounts file of the senders.
    #[arg(long, env = "TPS_SENDERS", default_value = "accounts.json")]
    pub senders: PathBuf,

    /// Accounts file of the receivers; transfer `j` of sender `i` pays receiver `i * N + j`.
    #[arg(long, env = "TPS_RECEIVERS")]
    pub receivers: PathBuf,

    /// Transfers per sender.
    #[arg(long, env = "TPS_TRANSFERS_PER_SENDER", default_value = "100")]
    pub transfers_per_sender: u64,

    /// Delay between two transfers of one sender in milliseconds.
    #[arg(long, env = "TPS_PACING_MS", default_value = "300")]
    pub pacing_ms: u64,
}

/// Arguments of `generate`.
#[derive(Args, Debug, Clone)]
pub(crate) struct GenerateArgs {
    /// Number of accounts.
    #[arg(long)]
    pub count: usize,

    /// Output file.
    #[arg(long, default_value = "accounts.json")]
    pub out: PathBuf,

    /// Seed for reproducible keys.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments of `split`.
#[derive(Args, Debug, Clone)]
pub(crate) struct SplitArgs {
    /// Accounts file to split.
    #[arg(long)]
    pub input: PathBuf,

    /// Number of output files.
    #[arg(long)]
    pub parts: usize,

    /// Output file prefix; files are named `<prefix><n>.json` starting at 1.
    #[arg(long, default_value = "accounts")]
    pub prefix: String,
}

/// Arguments of `genesis`.
#[derive(Args, Debug, Clone)]
pub(crate) struct GenesisArgs {
    /// Genesis template; its other fields are copied unchanged.
    #[arg(long, default_value = "example-genesis.json")]
    pub template: PathBuf,

    /// Accounts files to fund, in order. May be repeated.
    #[arg(long = "accounts", required = true)]
    pub accounts: Vec<PathBuf>,

    /// Initial balance of every account in wei.
    #[arg(long, default_value = "1000000000000000000000000000")]
    pub balance: u128,

    /// Output file.
    #[arg(long, default_value = "genesis.json")]
    pub out: PathBuf,
}
