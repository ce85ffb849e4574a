use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::context::RequestContext;
use super::domain::{
    Apprenticeship, ApprenticeshipDetails, ApprenticeshipFilter, ApprenticeshipId,
    ApprenticeshipType, ApprenticeshipTypeId, CuratorGroupId, CuratorId, DateRange,
    MissingEntity, User, UserId, UserRole,
};
use super::store::{RecordStore, StoreError};

/// Payload for creating an apprenticeship. Flags always start unset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewApprenticeship {
    /// Defaults to the acting user when omitted.
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub apprenticeship_type_id: ApprenticeshipTypeId,
    #[serde(default)]
    pub curator_id: Option<CuratorId>,
    #[serde(default)]
    pub curator_group_id: Option<CuratorGroupId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub employment_status: Option<String>,
    #[serde(default)]
    pub referral: Option<String>,
    #[serde(default)]
    pub report: Option<String>,
}

/// Full-record update. Workflow flags are not part of the payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApprenticeshipUpdate {
    pub id: ApprenticeshipId,
    pub user_id: UserId,
    pub apprenticeship_type_id: ApprenticeshipTypeId,
    #[serde(default)]
    pub curator_id: Option<CuratorId>,
    #[serde(default)]
    pub curator_group_id: Option<CuratorGroupId>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub academic_year: Option<String>,
    #[serde(default)]
    pub employment_status: Option<String>,
    #[serde(default)]
    pub referral: Option<String>,
    #[serde(default)]
    pub report: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewApprenticeshipType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Listing shaped by the caller's role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", content = "apprenticeships", rename_all = "snake_case")]
pub enum ApprenticeshipOverview {
    Personal(Vec<Apprenticeship>),
    Administrative(Vec<ApprenticeshipDetails>),
}

#[derive(Debug, thiserror::Error)]
pub enum RecordServiceError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(MissingEntity),
    #[error("{0}")]
    Conflict(String),
    #[error("record store failure: {0}")]
    Store(StoreError),
}

impl RecordServiceError {
    pub const fn kind(&self) -> &'static str {
        match self {
            RecordServiceError::Validation(_) => "validation",
            RecordServiceError::NotFound(_) => "not_found",
            RecordServiceError::Conflict(_) => "conflict",
            RecordServiceError::Store(_) => "store_failed",
        }
    }
}

impl From<StoreError> for RecordServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(missing) => RecordServiceError::NotFound(missing),
            err @ (StoreError::Conflict
            | StoreError::TypeInUse { .. }
            | StoreError::FlagAlreadySet { .. }) => RecordServiceError::Conflict(err.to_string()),
            other => RecordServiceError::Store(other),
        }
    }
}

/// CRUD over apprenticeships and the apprenticeship type taxonomy.
pub struct RecordService<S> {
    store: Arc<S>,
}

impl<S> RecordService<S>
where
    S: RecordStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn list(
        &self,
        filter: &ApprenticeshipFilter,
    ) -> Result<Vec<Apprenticeship>, RecordServiceError> {
        Ok(self.store.find_many(filter)?)
    }

    pub fn list_details(
        &self,
        filter: &ApprenticeshipFilter,
    ) -> Result<Vec<ApprenticeshipDetails>, RecordServiceError> {
        Ok(self.store.find_details(filter)?)
    }

    pub fn find_by_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Apprenticeship>, RecordServiceError> {
        Ok(self
            .store
            .find_first(&ApprenticeshipFilter::for_user(user_id.clone()))?)
    }

    pub fn get(&self, id: &ApprenticeshipId) -> Result<Apprenticeship, RecordServiceError> {
        self.store
            .fetch(id)?
            .ok_or_else(|| RecordServiceError::NotFound(MissingEntity::Apprenticeship(id.clone())))
    }

    pub fn create(
        &self,
        ctx: &RequestContext,
        input: NewApprenticeship,
    ) -> Result<Apprenticeship, RecordServiceError> {
        let user_id = input
            .user_id
            .or_else(|| ctx.actor_id().cloned())
            .ok_or_else(|| {
                RecordServiceError::Validation("user_id is required without an actor".to_string())
            })?;
        let period = DateRange::new(input.start_date, input.end_date)
            .map_err(|err| RecordServiceError::Validation(err.to_string()))?;

        self.require_user(&user_id)?;
        self.require_type(&input.apprenticeship_type_id)?;
        if let Some(id) = &input.curator_id {
            self.store
                .find_curator(id)?
                .ok_or_else(|| RecordServiceError::NotFound(MissingEntity::Curator(id.clone())))?;
        }
        if let Some(id) = &input.curator_group_id {
            self.store.find_curator_group(id)?.ok_or_else(|| {
                RecordServiceError::NotFound(MissingEntity::CuratorGroup(id.clone()))
            })?;
        }

        let record = Apprenticeship {
            id: ApprenticeshipId::generate(),
            user_id,
            apprenticeship_type_id: input.apprenticeship_type_id,
            curator_id: input.curator_id,
            curator_group_id: input.curator_group_id,
            period,
            academic_year: input.academic_year,
            employment_status: input.employment_status,
            referral: input.referral,
            report: input.report,
            attendance: false,
            signed: false,
            report_signed: false,
            referral_signed: false,
        };

        let stored = self.store.create(record)?;
        info!(request_id = %ctx.request_id, apprenticeship_id = %stored.id, user_id = %stored.user_id, "apprenticeship created");
        Ok(stored)
    }

    /// Replace an apprenticeship's editable fields.
    ///
    /// Curator and curator group ids that do not resolve are dropped from the update and the
    /// existing relation is kept.
    pub fn update(
        &self,
        ctx: &RequestContext,
        input: ApprenticeshipUpdate,
    ) -> Result<Apprenticeship, RecordServiceError> {
        let period = DateRange::new(input.start_date, input.end_date)
            .map_err(|err| RecordServiceError::Validation(err.to_string()))?;
        let current = self.get(&input.id)?;
        self.require_user(&input.user_id)?;
        self.require_type(&input.apprenticeship_type_id)?;

        let curator_id = match input.curator_id {
            Some(id) => match self.store.find_curator(&id)? {
                Some(curator) => Some(curator.id),
                None => {
                    warn!(request_id = %ctx.request_id, apprenticeship_id = %current.id, curator_id = %id, "unknown curator ignored");
                    current.curator_id.clone()
                }
            },
            None => current.curator_id.clone(),
        };
        let curator_group_id = match input.curator_group_id {
            Some(id) => match self.store.find_curator_group(&id)? {
                Some(group) => Some(group.id),
                None => {
                    warn!(request_id = %ctx.request_id, apprenticeship_id = %current.id, curator_group_id = %id, "unknown curator group ignored");
                    current.curator_group_id.clone()
                }
            },
            None => current.curator_group_id.clone(),
        };

        let record = Apprenticeship {
            id: current.id.clone(),
            user_id: input.user_id,
            apprenticeship_type_id: input.apprenticeship_type_id,
            curator_id,
            curator_group_id,
            period,
            academic_year: input.academic_year,
            employment_status: input.employment_status,
            referral: input.referral,
            report: input.report,
            ..current
        };

        let stored = self.store.update(record)?;
        info!(request_id = %ctx.request_id, apprenticeship_id = %stored.id, "apprenticeship updated");
        Ok(stored)
    }

    pub fn delete(
        &self,
        ctx: &RequestContext,
        id: &ApprenticeshipId,
    ) -> Result<Apprenticeship, RecordServiceError> {
        let removed = self.store.delete(id)?;
        info!(request_id = %ctx.request_id, apprenticeship_id = %removed.id, "apprenticeship deleted");
        Ok(removed)
    }

    /// Students see their own records; staff see every record with relations joined.
    pub fn overview(
        &self,
        ctx: &RequestContext,
    ) -> Result<ApprenticeshipOverview, RecordServiceError> {
        let actor = ctx.actor.as_ref().ok_or_else(|| {
            RecordServiceError::Validation("overview requires an acting user".to_string())
        })?;
        let user = self.require_user(&actor.user_id)?;

        match user.role {
            UserRole::Student => Ok(ApprenticeshipOverview::Personal(
                self.store
                    .find_many(&ApprenticeshipFilter::for_user(user.id))?,
            )),
            UserRole::Curator | UserRole::Administrator => Ok(
                ApprenticeshipOverview::Administrative(
                    self.store.find_details(&ApprenticeshipFilter::default())?,
                ),
            ),
        }
    }

    pub fn list_types(&self) -> Result<Vec<ApprenticeshipType>, RecordServiceError> {
        Ok(self.store.list_types()?)
    }

    pub fn create_type(
        &self,
        ctx: &RequestContext,
        input: NewApprenticeshipType,
    ) -> Result<ApprenticeshipType, RecordServiceError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(RecordServiceError::Validation(
                "apprenticeship type name must not be blank".to_string(),
            ));
        }

        let stored = self.store.create_type(ApprenticeshipType {
            id: ApprenticeshipTypeId::generate(),
            name: name.to_string(),
            description: input
                .description
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
        })?;
        info!(request_id = %ctx.request_id, type_id = %stored.id, "apprenticeship type created");
        Ok(stored)
    }

    pub fn delete_type(
        &self,
        ctx: &RequestContext,
        id: &ApprenticeshipTypeId,
    ) -> Result<ApprenticeshipType, RecordServiceError> {
        match self.store.delete_type(id) {
            Ok(removed) => {
                info!(request_id = %ctx.request_id, type_id = %removed.id, "apprenticeship type deleted");
                Ok(removed)
            }
            Err(err) => {
                warn!(request_id = %ctx.request_id, type_id = %id, error = %err, "apprenticeship type not deleted");
                Err(err.into())
            }
        }
    }

    fn require_user(&self, id: &UserId) -> Result<User, RecordServiceError> {
        self.store
            .find_user(id)?
            .ok_or_else(|| RecordServiceError::NotFound(MissingEntity::User(id.clone())))
    }

    fn require_type(
        &self,
        id: &ApprenticeshipTypeId,
    ) -> Result<ApprenticeshipType, RecordServiceError> {
        self.store.find_type(id)?.ok_or_else(|| {
            RecordServiceError::NotFound(MissingEntity::ApprenticeshipType(id.clone()))
        })
    }
}
