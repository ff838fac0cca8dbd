//! Drives a run: preflight, pool setup, the round timer, drain and the final report.

use std::{ops::Range, sync::Arc, time::Duration};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    AccountPool, DispatchEngine, DispatchMode, EngineConfig, EngineError, Identity, LedgerClient,
    Recipients, ThroughputAccumulator, accumulator::tps, client::with_timeout,
};

/// Final numbers of a run.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// Accepted submissions.
    pub total_sent: u64,
    /// Submissions that could not be signed or exhausted their retries.
    pub failed: u64,
    /// Group members skipped because a previous submission was still in flight.
    pub skipped: u64,
    /// Rounds that dispatched a group.
    pub rounds: u64,
    /// Rounds, or fixed-count sender sequences, dropped because no fee quote could be fetched.
    pub skipped_rounds: u64,
    /// Seconds from the first round to the end of the drain.
    pub elapsed_secs: f64,
    /// `total_sent / elapsed_secs`.
    pub tps: f64,
}

/// Counters gathered while dispatching, before the drain.
#[derive(Clone, Copy, Debug, Default)]
struct Dispatched {
    rounds: u64,
    skipped_rounds: u64,
    skipped: u64,
}

/// Owns the run configuration and the ledger connection.
#[derive(Debug)]
pub struct RunController<C> {
    client: Arc<C>,
    config: EngineConfig,
}

impl<C: LedgerClient + 'static> RunController<C> {
    /// Creates a controller for `config` against `client`.
    pub fn new(client: Arc<C>, config: EngineConfig) -> Self {
        Self { client, config }
    }

    /// Checks the endpoint answers and serves the configured chain.
    pub async fn preflight(&self) -> Result<(), EngineError> {
        let remote = with_timeout(self.config.request_timeout, self.client.chain_id())
            .await
            .map_err(EngineError::Unreachable)?;
        if remote != self.config.chain_id {
            return Err(EngineError::ChainIdMismatch { configured: self.config.chain_id, remote });
        }
        info!(chain_id = remote, "Connected to endpoint");
        Ok(())
    }

    /// Runs until the configured duration elapses or `shutdown` fires, then waits for every
    /// dispatched submission to settle.
    ///
    /// Only startup problems are errors; submission failures are counted in the report.
    pub async fn run(
        &self,
        senders: Vec<Identity>,
        recipients: Recipients,
        shutdown: &CancellationToken,
    ) -> Result<RunReport, EngineError> {
        self.config.validate()?;
        if senders.is_empty() {
            return Err(EngineError::NoSenders);
        }
        recipients.validate(senders.len())?;
        self.preflight().await?;

        let pool = AccountPool::initialize(
            senders,
            self.client.as_ref(),
            self.config.concurrency,
            self.config.request_timeout,
        )
        .await?;
        let pool = Arc::new(pool);

        let start = Instant::now();
        let (accumulator, completions) = ThroughputAccumulator::spawn(start);
        let engine = DispatchEngine::new(
            Arc::clone(&self.client),
            Arc::clone(&pool),
            recipients,
            &self.config,
            completions,
        );

        let dispatched = match self.config.mode {
            DispatchMode::TimedRounds => self.timed_rounds(&engine, &accumulator, shutdown).await,
            DispatchMode::FixedCount { transfers_per_sender, pacing } => {
                let deadline = start + self.config.duration;
                let senders =
                    engine.dispatch_fixed(transfers_per_sender, pacing, deadline, shutdown);
                info!(senders, transfers_per_sender, ?pacing, "Started fixed-count dispatch");
                Dispatched { rounds: 1, ..Default::default() }
            }
        };

        info!(pending = engine.pending_tasks(), "Draining in-flight submissions");
        engine.drain().await;
        drop(engine);
        for identity in pool.identities() {
            let address = identity.address();
            debug!(%address, nonce = ?pool.current_nonce(address), "Final nonce");
        }
        let tally = accumulator.finish().await;
        let elapsed = start.elapsed();

        let report = RunReport {
            total_sent: tally.sent,
            failed: tally.failed,
            skipped: dispatched.skipped,
            rounds: dispatched.rounds,
            skipped_rounds: dispatched.skipped_rounds + tally.unpriced,
            elapsed_secs: elapsed.as_secs_f64(),
            tps: tps(tally.sent, elapsed),
        };
        info!(
            total = report.total_sent,
            failed = report.failed,
            elapsed_secs = format_args!("{:.2}", report.elapsed_secs),
            tps = format_args!("{:.2}", report.tps),
            "Test complete"
        );
        Ok(report)
    }

    /// One group per tick, round-robin, until the duration elapses or `shutdown` fires.
    async fn timed_rounds(
        &self,
        engine: &DispatchEngine<C>,
        accumulator: &ThroughputAccumulator,
        shutdown: &CancellationToken,
    ) -> Dispatched {
        let groups = engine.pool().groups(self.config.batch_size);
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut dispatched = Dispatched::default();
        let mut batch = 0usize;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping rounds");
                    break;
                }
                _ = ticker.tick() => {}
            }
            if accumulator.elapsed() >= self.config.duration {
                break;
            }

            let fee = match engine.quote().await {
                Ok(fee) => fee,
                Err(e) => {
                    warn!(error = %e, "Failed to fetch gas params, skipping round");
                    dispatched.skipped_rounds += 1;
                    continue;
                }
            };

            let Some(group) = groups.get(batch).cloned() else { break };
            let (label, range) = progress_position(batch, &group);
            let round = engine.dispatch_group(group, fee);
            dispatched.rounds += 1;
            dispatched.skipped += round.skipped as u64;

            info!(
                timestamp = %Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                batch = label,
                range = %range,
                sent = accumulator.total_sent(),
                avg_tps = format_args!("{:.2}", accumulator.current_tps()),
                base_fee = %fee.base_fee,
                fee_cap = %fee.max_fee_per_gas,
                scheduled = round.scheduled,
                "Round dispatched"
            );
            batch = (batch + 1) % groups.len().max(1);
        }

        dispatched
    }
}

/// One-based batch number and `[first - last]` member range of a round's progress line.
fn progress_position(batch: usize, group: &Range<usize>) -> (usize, String) {
    (batch + 1, format!("[{} - {}]", group.start + 1, group.end))
}

/// Rounds expected from a duration and an interval, the first tick firing immediately.
pub fn expected_rounds(duration: Duration, interval: Duration) -> u64 {
    if interval.is_zero() {
        return 0;
    }
    duration.as_nanos().div_ceil(interval.as_nanos()) as u64
}
