//! The dispatch engine: bounded, nonce-safe fan-out of build/sign/submit work.

use std::{ops::Range, sync::Arc, time::Duration};

use alloy_primitives::Address;
use tokio::{
    sync::Semaphore,
    time::{Instant, sleep},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, warn};

use crate::{
    AccountPool, CompletionSender, EngineConfig, EngineError, FeeOracle, FeeQuote, Identity,
    LedgerClient, LedgerError, NonceClaim, RetryPolicy, TransferBuilder,
};

/// Who receives the transfers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Recipients {
    /// Every transfer goes to one address.
    Fixed(Address),
    /// Receiver addresses assigned by sender position.
    PerSender(Vec<Address>),
}

impl Recipients {
    /// Checks there are at least as many receivers as senders.
    pub fn validate(&self, senders: usize) -> Result<(), EngineError> {
        match self {
            Self::PerSender(receivers) if receivers.len() < senders => {
                Err(EngineError::InsufficientReceivers { senders, receivers: receivers.len() })
            }
            _ => Ok(()),
        }
    }

    /// Recipient of sender `sender`'s transfer in a timed round.
    pub fn for_round(&self, sender: usize) -> Option<Address> {
        match self {
            Self::Fixed(to) => Some(*to),
            Self::PerSender(receivers) => receivers.get(sender).copied(),
        }
    }

    /// Recipient of the `transfer`th of `per_sender` transfers of sender `sender`.
    ///
    /// `None` when the computed receiver index is past the end of the list.
    pub fn for_transfer(&self, sender: usize, transfer: u64, per_sender: u64) -> Option<Address> {
        match self {
            Self::Fixed(to) => Some(*to),
            Self::PerSender(receivers) => {
                let index = (sender as u64).checked_mul(per_sender)?.checked_add(transfer)?;
                receivers.get(usize::try_from(index).ok()?).copied()
            }
        }
    }
}

/// What a round handed to the background.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GroupDispatch {
    /// Workers spawned.
    pub scheduled: usize,
    /// Members skipped because a previous submission was still in flight or no receiver
    /// exists for them.
    pub skipped: usize,
}

/// Everything a worker needs, cloned into each spawned task.
#[derive(Debug)]
struct Submitter<C> {
    client: Arc<C>,
    builder: TransferBuilder,
    retry: RetryPolicy,
    request_timeout: Duration,
    completions: CompletionSender,
}

impl<C> Clone for Submitter<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            builder: self.builder,
            retry: self.retry,
            request_timeout: self.request_timeout,
            completions: self.completions.clone(),
        }
    }
}

impl<C: LedgerClient> Submitter<C> {
    /// Builds, signs and submits one transfer for a claimed nonce.
    ///
    /// The claim is committed only when the endpoint accepted the transfer.
    async fn transfer(&self, identity: &Identity, to: Address, claim: NonceClaim, fee: FeeQuote) {
        let nonce = claim.nonce();

        let signed = match self.builder.sign(self.builder.build(identity, to, nonce, fee)) {
            Ok(signed) => signed,
            Err(e) => {
                warn!(
                    address = %identity.address(),
                    target = %to,
                    nonce,
                    error = %e,
                    "Skipping transfer, cannot sign"
                );
                self.completions.failed();
                return;
            }
        };

        match self.retry.submit(self.client.as_ref(), &signed.raw, self.request_timeout).await {
            Ok(hash) => {
                if !claim.commit() {
                    warn!(
                        address = %signed.from,
                        nonce,
                        "Nonce moved while submission was in flight"
                    );
                }
                debug!(address = %signed.from, target = %to, nonce, %hash, "Transfer sent");
                self.completions.sent();
            }
            Err(e) => {
                warn!(
                    address = %signed.from,
                    target = %to,
                    nonce,
                    error = %e,
                    "SendTransaction failed, nonce not advanced"
                );
                self.completions.failed();
            }
        }
    }
}

/// Fans transfers out to background workers.
///
/// At most `concurrency` submissions are in flight across the whole run, whatever the number
/// of rounds fired. Per sender, a new transfer is only started once the previous one settled,
/// so nonces are issued in order without gaps.
#[derive(Debug)]
pub struct DispatchEngine<C> {
    pool: Arc<AccountPool>,
    recipients: Arc<Recipients>,
    oracle: FeeOracle,
    semaphore: Arc<Semaphore>,
    tasks: TaskTracker,
    submitter: Submitter<C>,
}

impl<C: LedgerClient + 'static> DispatchEngine<C> {
    /// Creates an engine reporting outcomes to `completions`.
    pub fn new(
        client: Arc<C>,
        pool: Arc<AccountPool>,
        recipients: Recipients,
        config: &EngineConfig,
        completions: CompletionSender,
    ) -> Self {
        Self {
            pool,
            recipients: Arc::new(recipients),
            oracle: FeeOracle::new(config.tip_gwei, config.request_timeout),
            semaphore: Arc::new(Semaphore::new(config.concurrency.max(1))),
            tasks: TaskTracker::new(),
            submitter: Submitter {
                client,
                builder: TransferBuilder::from_config(config),
                retry: config.retry,
                request_timeout: config.request_timeout,
                completions,
            },
        }
    }

    /// The sender pool.
    pub fn pool(&self) -> &AccountPool {
        &self.pool
    }

    /// Prices a transfer from the latest base fee.
    pub async fn quote(&self) -> Result<FeeQuote, LedgerError> {
        self.oracle.quote(self.submitter.client.as_ref()).await
    }

    /// Workers spawned and not yet finished, waiting ones included.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Submits one transfer per member of `group` in the background and returns immediately.
    ///
    /// Members whose previous submission has not settled are skipped this round.
    pub fn dispatch_group(&self, group: Range<usize>, fee: FeeQuote) -> GroupDispatch {
        let mut dispatch = GroupDispatch::default();

        for index in group {
            let Some(identity) = self.pool.identity(index) else { break };
            let address = identity.address();

            let Some(to) = self.recipients.for_round(index) else {
                debug!(%address, index, "No receiver for sender, skipping");
                dispatch.skipped += 1;
                continue;
            };
            let Some(claim) = self.pool.claim(address) else {
                debug!(%address, "Previous submission still in flight, skipping");
                dispatch.skipped += 1;
                continue;
            };

            let semaphore = Arc::clone(&self.semaphore);
            let pool = Arc::clone(&self.pool);
            let submitter = self.submitter.clone();
            self.tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else { return };
                let Some(identity) = pool.identity(index) else { return };
                submitter.transfer(identity, to, claim, fee).await;
            });
            dispatch.scheduled += 1;
        }

        dispatch
    }

    /// Starts one background sequence per sender, each issuing `transfers_per_sender`
    /// transfers `pacing` apart.
    ///
    /// A sequence prices itself once while holding a concurrency permit, so fee requests are
    /// bounded like submissions. A sender that cannot be priced is reported as unpriced and
    /// sends nothing. A sequence stops early at `deadline`, on `shutdown`, or when its receiver
    /// index runs past the receiver list. Returns the number of sequences started.
    pub fn dispatch_fixed(
        &self,
        transfers_per_sender: u64,
        pacing: Duration,
        deadline: Instant,
        shutdown: &CancellationToken,
    ) -> usize {
        for index in 0..self.pool.len() {
            let semaphore = Arc::clone(&self.semaphore);
            let pool = Arc::clone(&self.pool);
            let recipients = Arc::clone(&self.recipients);
            let submitter = self.submitter.clone();
            let oracle = self.oracle;
            let shutdown = shutdown.clone();

            self.tasks.spawn(async move {
                let Some(identity) = pool.identity(index) else { return };
                let address = identity.address();

                let quote = {
                    let Ok(_permit) = semaphore.acquire().await else { return };
                    oracle.quote(submitter.client.as_ref()).await
                };
                let fee = match quote {
                    Ok(fee) => fee,
                    Err(e) => {
                        warn!(%address, error = %e, "Failed to fetch gas params, skipping sender");
                        submitter.completions.unpriced();
                        return;
                    }
                };

                for transfer in 0..transfers_per_sender {
                    if shutdown.is_cancelled() || Instant::now() >= deadline {
                        break;
                    }
                    let Some(to) = recipients.for_transfer(index, transfer, transfers_per_sender)
                    else {
                        break;
                    };

                    let Ok(permit) = semaphore.acquire().await else { return };
                    let Some(claim) = pool.claim(address) else { return };
                    submitter.transfer(identity, to, claim, fee).await;
                    drop(permit);

                    if transfer + 1 < transfers_per_sender {
                        sleep(pacing).await;
                    }
                }
            });
        }

        self.pool.len()
    }

    /// Stops accepting work and waits for every spawned worker to finish.
    pub async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }
}
