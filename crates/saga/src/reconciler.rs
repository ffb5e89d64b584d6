//! Background delivery of pending loyalty credits.
//!
//! A single worker wakes up on a fixed interval and walks a snapshot of the
//! pending keys. Each entry gets at most one delivery attempt per cycle and is
//! dropped once it has used up `max_attempts`. The queue lock is only held for
//! individual map operations, never across a loyalty call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};

use crate::pending::{AttemptSlot, PendingCreditQueue};
use crate::services::LoyaltyService;

/// Default pause between reconciliation cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Default number of delivery attempts before a credit is abandoned.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Outcome of one reconciliation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Credits confirmed by the loyalty service and removed.
    pub delivered: usize,
    /// Credits whose attempt failed; they stay queued.
    pub failed: usize,
    /// Credits removed after reaching the attempt ceiling.
    pub dropped: usize,
}

/// Drains the pending-credit queue through the loyalty service.
pub struct Reconciler {
    queue: PendingCreditQueue,
    loyalty: Arc<dyn LoyaltyService>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        queue: PendingCreditQueue,
        loyalty: Arc<dyn LoyaltyService>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            queue,
            loyalty,
            config,
        }
    }

    pub fn config(&self) -> ReconcilerConfig {
        self.config
    }

    /// Runs exactly one reconciliation cycle.
    #[tracing::instrument(skip(self), fields(max_attempts = self.config.max_attempts))]
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let keys = self.queue.keys().await;
        if keys.is_empty() {
            return report;
        }
        tracing::info!(pending = keys.len(), "processing pending credits");

        for key in keys {
            match self.queue.begin_attempt(&key, self.config.max_attempts).await {
                AttemptSlot::Gone => continue,
                AttemptSlot::Expired(credit) => {
                    report.dropped += 1;
                    metrics::counter!("pending_credits_dropped").increment(1);
                    tracing::error!(
                        %key,
                        user = %credit.user,
                        points = credit.points,
                        attempts = credit.attempts,
                        "max attempts reached, abandoning pending credit"
                    );
                }
                AttemptSlot::Ready(credit) => {
                    match self.loyalty.credit(&credit.user, credit.points).await {
                        Ok(()) => {
                            self.queue.remove(&key).await;
                            report.delivered += 1;
                            metrics::counter!("pending_credits_delivered").increment(1);
                            tracing::info!(
                                %key,
                                user = %credit.user,
                                attempts = credit.attempts,
                                "pending credit delivered"
                            );
                        }
                        Err(err) => {
                            report.failed += 1;
                            tracing::warn!(
                                %key,
                                user = %credit.user,
                                attempt = credit.attempts,
                                error = %err,
                                "pending credit delivery failed"
                            );
                        }
                    }
                }
            }
        }

        report
    }

    /// Starts the periodic worker. The first cycle runs one interval from now.
    pub fn spawn(self) -> ReconcilerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let period = self.config.interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval = ?period, "pending credit reconciler started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_cycle().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("pending credit reconciler stopped");
        });

        ReconcilerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Handle to a running reconciler.
///
/// Dropping the handle also stops the worker after its current cycle.
pub struct ReconcilerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Returns true once the worker task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signals the worker to stop and waits for the in-flight cycle to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "pending credit reconciler panicked");
        }
    }
}
