//! `tps-bench` binary entry point.

mod cli;

use std::{path::Path, sync::Arc, time::Duration};

use clap::Parser;
use cli::{Cli, Command, EngineArgs};
use dotenvy::dotenv;
use eyre::{WrapErr, eyre};
use tps_cli_utils::shutdown_token;
use tps_engine::{
    AlloyLedgerClient, DispatchMode, Identity, Recipients, RunController, expected_rounds,
    generate_accounts, genesis_allocations, load_accounts, load_identities, save_accounts,
    split_accounts, write_genesis,
};
use tracing::info;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = cli.log.into_config("tps-bench.log").init_tracing_subscriber()?;

    match cli.command {
        Command::Rounds(args) => {
            let recipients = match (&args.receivers, args.target) {
                (Some(path), _) => Recipients::PerSender(addresses(&load_identities(path)?)),
                (None, Some(target)) => Recipients::Fixed(target),
                (None, None) => return Err(eyre!("either --receivers or --target is required")),
            };
            run(&args.engine, &args.senders, recipients, DispatchMode::TimedRounds).await
        }
        Command::Fixed(args) => {
            let recipients = Recipients::PerSender(addresses(&load_identities(&args.receivers)?));
            let mode = DispatchMode::FixedCount {
                transfers_per_sender: args.transfers_per_sender,
                pacing: Duration::from_millis(args.pacing_ms),
            };
            run(&args.engine, &args.senders, recipients, mode).await
        }
        Command::Generate(args) => {
            let records = generate_accounts(args.count, args.seed);
            save_accounts(&records, &args.out)?;
            info!(count = records.len(), path = %args.out.display(), "Generated accounts");
            Ok(())
        }
        Command::Split(args) => {
            let records = load_accounts(&args.input)?;
            for (i, chunk) in split_accounts(&records, args.parts).iter().enumerate() {
                let path = format!("{}{}.json", args.prefix, i + 1);
                save_accounts(chunk, Path::new(&path))?;
                info!(path = %path, accounts = chunk.len(), "Wrote accounts");
            }
            Ok(())
        }
        Command::Genesis(args) => {
            let mut records = Vec::new();
            for path in &args.accounts {
                records.extend(load_accounts(path)?);
            }
            let allocations = genesis_allocations(&records, args.balance);
            write_genesis(&args.template, &allocations, &args.out)
                .wrap_err_with(|| format!("failed to write {}", args.out.display()))?;
            info!(accounts = allocations.len(), path = %args.out.display(), "Wrote genesis");
            Ok(())
        }
    }
}

fn addresses(identities: &[Identity]) -> Vec<alloy_primitives::Address> {
    identities.iter().map(Identity::address).collect()
}

async fn run(
    args: &EngineArgs,
    senders: &Path,
    recipients: Recipients,
    mode: DispatchMode,
) -> eyre::Result<()> {
    let config = args.config(mode);
    let identities = load_identities(senders)?;
    info!(
        senders = identities.len(),
        rpc_url = %args.rpc_url,
        chain_id = config.chain_id,
        concurrency = config.concurrency,
        ?mode,
        "Starting benchmark"
    );
    if mode == DispatchMode::TimedRounds {
        info!(rounds = expected_rounds(config.duration, config.interval), "Expected rounds");
    }

    let client = Arc::new(AlloyLedgerClient::new_http(&args.rpc_url)?);
    let shutdown = shutdown_token();
    let report = RunController::new(client, config).run(identities, recipients, &shutdown).await?;

    println!(
        "Total: {} transactions, elapsed {:.2}s, TPS: {:.2}",
        report.total_sent, report.elapsed_secs, report.tps
    );
    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .wrap_err_with(|| format!("failed to write report to {}", path.display()))?;
    }
    Ok(())
}
