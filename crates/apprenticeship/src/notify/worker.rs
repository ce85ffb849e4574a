use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::notifier::Notifier;
use super::outbox::{NotificationOutbox, OutboxError};

/// Exponential backoff for failed deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay before the next try after `attempt` failed attempts (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Outcome counters for a single drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub retried: usize,
    pub dead_lettered: usize,
}

impl DeliveryReport {
    pub fn is_idle(&self) -> bool {
        self.delivered == 0 && self.retried == 0 && self.dead_lettered == 0
    }
}

/// Drains the outbox through a notifier, independently of the requests that filled it.
pub struct DeliveryWorker<O, N> {
    outbox: Arc<O>,
    notifier: Arc<N>,
    policy: RetryPolicy,
    batch_size: usize,
    poll_interval: Duration,
}

impl<O, N> DeliveryWorker<O, N>
where
    O: NotificationOutbox + 'static,
    N: Notifier + 'static,
{
    pub fn new(outbox: Arc<O>, notifier: Arc<N>, policy: RetryPolicy) -> Self {
        Self {
            outbox,
            notifier,
            policy,
            batch_size: 16,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Claim every job due at `now`, attempt delivery, and settle each one.
    ///
    /// Every claimed job is settled even when the outbox rejects one of them; a job that cannot
    /// be settled is released back to the ready queue and the first outbox error is returned.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<DeliveryReport, OutboxError> {
        let jobs = self.outbox.claim_due(now, self.batch_size)?;
        let mut report = DeliveryReport::default();
        let mut first_error = None;

        for mut job in jobs {
            let job_id = job.id;
            job.attempts += 1;
            let settled = match self.notifier.send(&job.channel_id, &job.text).await {
                Ok(()) => {
                    debug!(job_id = %job.id, apprenticeship_id = %job.apprenticeship_id, flag = %job.flag, "notification delivered");
                    self.outbox
                        .complete(job.id)
                        .map(|()| report.delivered += 1)
                }
                Err(err) if job.attempts >= self.policy.max_attempts => {
                    error!(job_id = %job.id, attempts = job.attempts, error = %err, "notification dead-lettered");
                    self.outbox
                        .dead_letter(job, err.to_string())
                        .map(|()| report.dead_lettered += 1)
                }
                Err(err) => {
                    let delay = self.policy.delay_for(job.attempts);
                    let next_attempt_at = now
                        + chrono::Duration::from_std(delay)
                            .unwrap_or_else(|_| chrono::Duration::seconds(60));
                    warn!(job_id = %job.id, attempts = job.attempts, retry_in_ms = delay.as_millis() as u64, error = %err, "notification delivery failed");
                    self.outbox
                        .reschedule(job, next_attempt_at, err.to_string())
                        .map(|()| report.retried += 1)
                }
            };

            if let Err(err) = settled {
                error!(job_id = %job_id, error = %err, "notification job not settled; releasing");
                if let Err(release_err) = self.outbox.release(job_id) {
                    error!(job_id = %job_id, error = %release_err, "notification job release failed");
                }
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Run drain passes on a fixed interval until `shutdown` flips to `true` or its sender drops.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(poll_interval_ms = self.poll_interval.as_millis() as u64, "delivery worker started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match self.run_once(Utc::now()).await {
                            Ok(report) if !report.is_idle() => {
                                info!(delivered = report.delivered, retried = report.retried, dead_lettered = report.dead_lettered, "delivery pass finished");
                            }
                            Ok(_) => {}
                            Err(err) => error!(error = %err, "delivery pass failed"),
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("delivery worker stopped");
        })
    }
}
