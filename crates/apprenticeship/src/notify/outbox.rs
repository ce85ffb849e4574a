use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::registry::domain::{ApprenticeshipFlag, ApprenticeshipId, ChannelId};

/// Pending confirmation message for one committed flag transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationJob {
    pub id: Uuid,
    pub apprenticeship_id: ApprenticeshipId,
    pub flag: ApprenticeshipFlag,
    pub channel_id: ChannelId,
    pub text: String,
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

impl NotificationJob {
    pub fn new(
        apprenticeship_id: ApprenticeshipId,
        flag: ApprenticeshipFlag,
        channel_id: ChannelId,
        text: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            apprenticeship_id,
            flag,
            channel_id,
            text,
            attempts: 0,
            enqueued_at: now,
            next_attempt_at: now,
            last_error: None,
        }
    }
}

/// Queue of notification jobs decoupled from the request that produced them.
///
/// `claim_due` hands jobs to exactly one worker: a claimed job is invisible to further claims
/// until it is completed, rescheduled, dead-lettered, or released.
pub trait NotificationOutbox: Send + Sync {
    fn enqueue(&self, job: NotificationJob) -> Result<(), OutboxError>;
    fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<NotificationJob>, OutboxError>;
    fn complete(&self, id: Uuid) -> Result<(), OutboxError>;
    fn reschedule(
        &self,
        job: NotificationJob,
        next_attempt_at: DateTime<Utc>,
        error: String,
    ) -> Result<(), OutboxError>;
    fn dead_letter(&self, job: NotificationJob, error: String) -> Result<(), OutboxError>;
    /// Return a claimed job to the ready queue as it was claimed.
    fn release(&self, id: Uuid) -> Result<(), OutboxError>;
    fn pending(&self) -> Result<Vec<NotificationJob>, OutboxError>;
    fn dead_letters(&self) -> Result<Vec<NotificationJob>, OutboxError>;
}

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("notification job {0} already queued")]
    Duplicate(Uuid),
    #[error("notification job {0} is not claimed")]
    NotClaimed(Uuid),
    #[error("outbox unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Default)]
struct Queues {
    ready: BTreeMap<Uuid, NotificationJob>,
    claimed: BTreeMap<Uuid, NotificationJob>,
    dead: Vec<NotificationJob>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryOutbox {
    queues: Arc<Mutex<Queues>>,
}

impl InMemoryOutbox {
    fn queues(&self) -> Result<MutexGuard<'_, Queues>, OutboxError> {
        self.queues
            .lock()
            .map_err(|_| OutboxError::Unavailable("outbox mutex poisoned".to_string()))
    }
}

impl NotificationOutbox for InMemoryOutbox {
    fn enqueue(&self, job: NotificationJob) -> Result<(), OutboxError> {
        let mut queues = self.queues()?;
        if queues.ready.contains_key(&job.id) || queues.claimed.contains_key(&job.id) {
            return Err(OutboxError::Duplicate(job.id));
        }
        queues.ready.insert(job.id, job);
        Ok(())
    }

    fn claim_due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<NotificationJob>, OutboxError> {
        let mut queues = self.queues()?;
        let mut due: Vec<NotificationJob> = queues
            .ready
            .values()
            .filter(|job| job.next_attempt_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|job| (job.next_attempt_at, job.enqueued_at));
        due.truncate(limit);

        for job in &due {
            queues.ready.remove(&job.id);
            queues.claimed.insert(job.id, job.clone());
        }
        Ok(due)
    }

    fn complete(&self, id: Uuid) -> Result<(), OutboxError> {
        let mut queues = self.queues()?;
        queues
            .claimed
            .remove(&id)
            .map(|_| ())
            .ok_or(OutboxError::NotClaimed(id))
    }

    fn reschedule(
        &self,
        mut job: NotificationJob,
        next_attempt_at: DateTime<Utc>,
        error: String,
    ) -> Result<(), OutboxError> {
        let mut queues = self.queues()?;
        if queues.claimed.remove(&job.id).is_none() {
            return Err(OutboxError::NotClaimed(job.id));
        }
        job.next_attempt_at = next_attempt_at;
        job.last_error = Some(error);
        queues.ready.insert(job.id, job);
        Ok(())
    }

    fn dead_letter(&self, mut job: NotificationJob, error: String) -> Result<(), OutboxError> {
        let mut queues = self.queues()?;
        if queues.claimed.remove(&job.id).is_none() {
            return Err(OutboxError::NotClaimed(job.id));
        }
        job.last_error = Some(error);
        queues.dead.push(job);
        Ok(())
    }

    fn release(&self, id: Uuid) -> Result<(), OutboxError> {
        let mut queues = self.queues()?;
        let job = queues
            .claimed
            .remove(&id)
            .ok_or(OutboxError::NotClaimed(id))?;
        queues.ready.insert(id, job);
        Ok(())
    }

    fn pending(&self) -> Result<Vec<NotificationJob>, OutboxError> {
        let queues = self.queues()?;
        Ok(queues
            .ready
            .values()
            .chain(queues.claimed.values())
            .cloned()
            .collect())
    }

    fn dead_letters(&self) -> Result<Vec<NotificationJob>, OutboxError> {
        let queues = self.queues()?;
        Ok(queues.dead.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job(now: DateTime<Utc>) -> NotificationJob {
        NotificationJob::new(
            ApprenticeshipId::from("apprt-1"),
            ApprenticeshipFlag::Signed,
            ChannelId::from("1132747679"),
            "confirmed".to_string(),
            now,
        )
    }

    #[test]
    fn claimed_jobs_are_hidden_until_released() {
        let outbox = InMemoryOutbox::default();
        let now = Utc::now();
        outbox.enqueue(job(now)).expect("enqueue");

        let claimed = outbox.claim_due(now, 10).expect("claim");
        assert_eq!(claimed.len(), 1);
        assert!(outbox.claim_due(now, 10).expect("claim").is_empty());
        assert_eq!(outbox.pending().expect("pending").len(), 1);

        outbox.complete(claimed[0].id).expect("complete");
        assert!(outbox.pending().expect("pending").is_empty());
    }

    #[test]
    fn rescheduled_jobs_wait_for_their_next_attempt() {
        let outbox = InMemoryOutbox::default();
        let now = Utc::now();
        outbox.enqueue(job(now)).expect("enqueue");

        let claimed = outbox.claim_due(now, 1).expect("claim").remove(0);
        let later = now + Duration::seconds(30);
        outbox
            .reschedule(claimed, later, "timeout".to_string())
            .expect("reschedule");

        assert!(outbox.claim_due(now, 1).expect("claim").is_empty());
        let retried = outbox.claim_due(later, 1).expect("claim");
        assert_eq!(retried[0].last_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn released_jobs_become_claimable_again() {
        let outbox = InMemoryOutbox::default();
        let now = Utc::now();
        outbox.enqueue(job(now)).expect("enqueue");

        let claimed = outbox.claim_due(now, 1).expect("claim").remove(0);
        outbox.release(claimed.id).expect("release");

        let again = outbox.claim_due(now, 1).expect("claim");
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].id, claimed.id);
        assert!(outbox.release(Uuid::new_v4()).is_err());
    }

    #[test]
    fn completing_an_unclaimed_job_fails() {
        let outbox = InMemoryOutbox::default();
        let now = Utc::now();
        let queued = job(now);
        let id = queued.id;
        outbox.enqueue(queued).expect("enqueue");

        assert!(matches!(
            outbox.complete(id),
            Err(OutboxError::NotClaimed(found)) if found == id
        ));
    }
}
