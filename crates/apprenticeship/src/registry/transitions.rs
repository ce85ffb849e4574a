use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use super::context::RequestContext;
use super::domain::{Apprenticeship, ApprenticeshipFlag, ApprenticeshipId, MissingEntity, UserId};
use super::store::{RecordStore, StoreError};
use crate::notify::{ConfirmationTemplate, NotificationJob, NotificationOutbox, OutboxError};

/// Explicit confirmation of one workflow flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmFlag {
    pub apprenticeship_id: ApprenticeshipId,
    pub user_id: UserId,
    pub flag: ApprenticeshipFlag,
}

/// Wire-compatible transition request.
///
/// Callers send the flag's current value, so `requested_value == true` means the caller
/// already considers the milestone confirmed and the request is refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub apprenticeship_id: ApprenticeshipId,
    pub user_id: UserId,
    pub flag: ApprenticeshipFlag,
    pub requested_value: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub success: bool,
    pub result: Apprenticeship,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    AlreadyConfirmed,
    AssertedConfirmed,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::AlreadyConfirmed => f.write_str("already confirmed"),
            ConflictReason::AssertedConfirmed => f.write_str("reported as already confirmed"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("{flag} {reason}")]
    Conflict {
        flag: ApprenticeshipFlag,
        reason: ConflictReason,
    },
    #[error("{0}")]
    NotFound(MissingEntity),
    #[error("flag committed but notification could not be queued: {0}")]
    DeliveryFailed(#[from] OutboxError),
    #[error("record store failure: {0}")]
    StoreFailed(StoreError),
}

impl TransitionError {
    pub const fn kind(&self) -> &'static str {
        match self {
            TransitionError::Conflict { .. } => "conflict",
            TransitionError::NotFound(_) => "not_found",
            TransitionError::DeliveryFailed(_) => "delivery_failed",
            TransitionError::StoreFailed(_) => "store_failed",
        }
    }
}

impl From<StoreError> for TransitionError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(missing) => TransitionError::NotFound(missing),
            StoreError::FlagAlreadySet { flag, .. } => TransitionError::Conflict {
                flag,
                reason: ConflictReason::AlreadyConfirmed,
            },
            other => TransitionError::StoreFailed(other),
        }
    }
}

/// Applies one-way flag transitions and queues the student's confirmation message.
pub struct StatusTransitionService<S, O> {
    store: Arc<S>,
    outbox: Arc<O>,
    template: ConfirmationTemplate,
}

impl<S, O> StatusTransitionService<S, O>
where
    S: RecordStore + 'static,
    O: NotificationOutbox + 'static,
{
    pub fn new(store: Arc<S>, outbox: Arc<O>, template: ConfirmationTemplate) -> Self {
        Self {
            store,
            outbox,
            template,
        }
    }

    /// Handle a request in the inverted-boolean wire format.
    pub fn apply(
        &self,
        ctx: &RequestContext,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, TransitionError> {
        if request.requested_value {
            warn!(request_id = %ctx.request_id, apprenticeship_id = %request.apprenticeship_id, flag = %request.flag, "transition refused: caller asserted confirmed state");
            return Err(TransitionError::Conflict {
                flag: request.flag,
                reason: ConflictReason::AssertedConfirmed,
            });
        }

        self.confirm(
            ctx,
            ConfirmFlag {
                apprenticeship_id: request.apprenticeship_id,
                user_id: request.user_id,
                flag: request.flag,
            },
        )
    }

    /// Set `flag` on the apprenticeship and queue the confirmation for `user_id`.
    ///
    /// The flag commit is a store-level compare-and-set, so two racing confirmations produce
    /// exactly one success and one conflict. Once the flag is committed it stays committed even
    /// if queueing the notification fails.
    pub fn confirm(
        &self,
        ctx: &RequestContext,
        request: ConfirmFlag,
    ) -> Result<TransitionOutcome, TransitionError> {
        let ConfirmFlag {
            apprenticeship_id,
            user_id,
            flag,
        } = request;

        let user = self
            .store
            .find_user(&user_id)?
            .ok_or_else(|| TransitionError::NotFound(MissingEntity::User(user_id.clone())))?;

        let current = self.store.fetch(&apprenticeship_id)?.ok_or_else(|| {
            TransitionError::NotFound(MissingEntity::Apprenticeship(apprenticeship_id.clone()))
        })?;

        if flag.is_set(&current) {
            return Err(TransitionError::Conflict {
                flag,
                reason: ConflictReason::AlreadyConfirmed,
            });
        }

        let updated = self.store.set_flag(&apprenticeship_id, flag)?;
        info!(request_id = %ctx.request_id, apprenticeship_id = %apprenticeship_id, flag = %flag, "apprenticeship flag confirmed");

        let job = NotificationJob::new(
            apprenticeship_id.clone(),
            flag,
            user.channel_id.clone(),
            self.template.render(flag),
            Utc::now(),
        );
        let job_id = job.id;
        if let Err(err) = self.outbox.enqueue(job) {
            error!(request_id = %ctx.request_id, apprenticeship_id = %apprenticeship_id, flag = %flag, error = %err, "confirmation notification not queued");
            return Err(TransitionError::DeliveryFailed(err));
        }
        info!(request_id = %ctx.request_id, job_id = %job_id, "confirmation notification queued");

        Ok(TransitionOutcome {
            success: true,
            result: updated,
        })
    }
}
