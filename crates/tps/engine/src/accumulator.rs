//! Throughput accounting.
//!
//! Workers report outcomes through an unbounded queue drained by a single task. That task
//! owns the counters; everybody else reads published snapshots. Producers never block, so a
//! worker holding a concurrency permit can always report and release it.

use std::time::Duration;

use serde::Serialize;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::Instant,
};
use tracing::info;

/// Sent transfers between two progress log lines.
const PROGRESS_EVERY: u64 = 1_000;

/// Outcome of one submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    /// Accepted by the endpoint.
    Sent,
    /// Rejected, unsignable, or out of retries.
    Failed,
    /// A fixed-count sender gave up before its first transfer because no fee could be quoted.
    Unpriced,
}

/// Counters kept by the accumulator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Accepted submissions.
    pub sent: u64,
    /// Failed submissions.
    pub failed: u64,
    /// Fixed-count senders dropped for lack of a fee quote.
    pub unpriced: u64,
}

/// Write side of the completion queue. Cheap to clone, one per worker.
#[derive(Clone, Debug)]
pub struct CompletionSender {
    tx: mpsc::UnboundedSender<Completion>,
}

impl CompletionSender {
    /// Reports an outcome. Reports after the accumulator finished are dropped.
    pub fn record(&self, completion: Completion) {
        let _ = self.tx.send(completion);
    }

    /// Reports an accepted submission.
    pub fn sent(&self) {
        self.record(Completion::Sent);
    }

    /// Reports a failed submission.
    pub fn failed(&self) {
        self.record(Completion::Failed);
    }

    /// Reports a sender that could not be priced.
    pub fn unpriced(&self) {
        self.record(Completion::Unpriced);
    }
}

/// Running and final throughput of a run.
#[derive(Debug)]
pub struct ThroughputAccumulator {
    start: Instant,
    snapshot: watch::Receiver<Tally>,
    drain: JoinHandle<Tally>,
}

impl ThroughputAccumulator {
    /// Spawns the drain task. `start` is the instant throughput is measured from.
    pub fn spawn(start: Instant) -> (Self, CompletionSender) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (publish, snapshot) = watch::channel(Tally::default());

        let drain = tokio::spawn(async move {
            let mut tally = Tally::default();
            while let Some(completion) = rx.recv().await {
                match completion {
                    Completion::Sent => {
                        tally.sent += 1;
                        if tally.sent % PROGRESS_EVERY == 0 {
                            info!(sent = tally.sent, "Transferred transactions so far");
                        }
                    }
                    Completion::Failed => tally.failed += 1,
                    Completion::Unpriced => tally.unpriced += 1,
                }
                publish.send_replace(tally);
            }
            tally
        });

        (Self { start, snapshot, drain }, CompletionSender { tx })
    }

    /// Time since [`start`](Self::start).
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Latest published counters.
    pub fn tally(&self) -> Tally {
        *self.snapshot.borrow()
    }

    /// Accepted submissions so far.
    pub fn total_sent(&self) -> u64 {
        self.tally().sent
    }

    /// Accepted submissions per second since start.
    pub fn current_tps(&self) -> f64 {
        tps(self.total_sent(), self.elapsed())
    }

    /// Waits until every [`CompletionSender`] is dropped and the queue is empty, then returns
    /// the final counters.
    pub async fn finish(self) -> Tally {
        let Self { snapshot, drain, .. } = self;
        match drain.await {
            Ok(tally) => tally,
            Err(e) => {
                tracing::error!(error = %e, "Throughput drain task failed");
                *snapshot.borrow()
            }
        }
    }
}

/// `total / elapsed`, zero for an empty interval.
pub fn tps(total: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { total as f64 / secs } else { 0.0 }
}
