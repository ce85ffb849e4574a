use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::notify::{
    ConfirmationTemplate, InMemoryOutbox, NotificationJob, NotificationOutbox, Notifier,
    NotifyError, OutboxError,
};
use crate::registry::domain::{
    Apprenticeship, ApprenticeshipDetails, ApprenticeshipFilter, ApprenticeshipFlag,
    ApprenticeshipId, ApprenticeshipType, ApprenticeshipTypeId, ChannelId, Curator, CuratorGroup,
    CuratorGroupId, CuratorId, User, UserId, UserRole,
};
use crate::registry::memory::InMemoryRecordStore;
use crate::registry::records::{NewApprenticeship, RecordService};
use crate::registry::router::{registry_router, RegistryState};
use crate::registry::seed::RegistrySeed;
use crate::registry::store::{RecordStore, StoreError};
use crate::registry::transitions::StatusTransitionService;
use crate::registry::RequestContext;

pub(super) const STUDENT_ID: &str = "user-anna";
pub(super) const STUDENT_CHANNEL: &str = "1132747679";
pub(super) const STAFF_ID: &str = "user-staff";
pub(super) const TYPE_ID: &str = "type-production";
pub(super) const CURATOR_ID: &str = "curator-1";
pub(super) const GROUP_ID: &str = "group-1";
pub(super) const PORTAL_URL: &str = "https://auth.mkrit.ru";

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn seed() -> RegistrySeed {
    RegistrySeed {
        users: vec![
            User {
                id: UserId::from(STUDENT_ID),
                channel_id: ChannelId::from(STUDENT_CHANNEL),
                name: "Anna Petrova".to_string(),
                role: UserRole::Student,
            },
            User {
                id: UserId::from(STAFF_ID),
                channel_id: ChannelId::from("5550001"),
                name: "Department Office".to_string(),
                role: UserRole::Administrator,
            },
        ],
        curators: vec![Curator {
            id: CuratorId::from(CURATOR_ID),
            name: "Ivan Sidorov".to_string(),
        }],
        curator_groups: vec![CuratorGroup {
            id: CuratorGroupId::from(GROUP_ID),
            name: "Software Engineering".to_string(),
        }],
        apprenticeship_types: vec![ApprenticeshipType {
            id: ApprenticeshipTypeId::from(TYPE_ID),
            name: "Production practice".to_string(),
            description: None,
        }],
    }
}

pub(super) fn seeded_store() -> Arc<InMemoryRecordStore> {
    Arc::new(InMemoryRecordStore::from_seed(seed()))
}

pub(super) fn new_apprenticeship() -> NewApprenticeship {
    NewApprenticeship {
        user_id: Some(UserId::from(STUDENT_ID)),
        apprenticeship_type_id: ApprenticeshipTypeId::from(TYPE_ID),
        curator_id: None,
        curator_group_id: None,
        start_date: date(2024, 6, 3),
        end_date: date(2024, 6, 30),
        academic_year: Some("3".to_string()),
        employment_status: None,
        referral: None,
        report: None,
    }
}

pub(super) fn template() -> ConfirmationTemplate {
    ConfirmationTemplate::new(PORTAL_URL)
}

pub(super) struct Harness {
    pub(super) store: Arc<InMemoryRecordStore>,
    pub(super) outbox: Arc<InMemoryOutbox>,
    pub(super) records: Arc<RecordService<InMemoryRecordStore>>,
    pub(super) transitions: Arc<StatusTransitionService<InMemoryRecordStore, InMemoryOutbox>>,
}

impl Harness {
    pub(super) fn state(&self) -> RegistryState<InMemoryRecordStore, InMemoryOutbox> {
        RegistryState {
            records: self.records.clone(),
            transitions: self.transitions.clone(),
        }
    }

    pub(super) fn router(&self) -> axum::Router {
        registry_router(self.state())
    }

    pub(super) fn create_record(&self) -> Apprenticeship {
        self.records
            .create(&RequestContext::system(), new_apprenticeship())
            .expect("apprenticeship created")
    }
}

pub(super) fn harness() -> Harness {
    let store = seeded_store();
    let outbox = Arc::new(InMemoryOutbox::default());
    let records = Arc::new(RecordService::new(store.clone()));
    let transitions = Arc::new(StatusTransitionService::new(
        store.clone(),
        outbox.clone(),
        template(),
    ));
    Harness {
        store,
        outbox,
        records,
        transitions,
    }
}

/// Notifier double recording every message it is asked to send.
#[derive(Default, Clone)]
pub(super) struct RecordingNotifier {
    sent: Arc<Mutex<Vec<(ChannelId, String)>>>,
}

impl RecordingNotifier {
    pub(super) fn sent(&self) -> Vec<(ChannelId, String)> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, channel_id: &ChannelId, text: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push((channel_id.clone(), text.to_string()));
        Ok(())
    }
}

/// Fails the first `failures` sends, then succeeds.
#[derive(Default)]
pub(super) struct FlakyNotifier {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyNotifier {
    pub(super) fn failing(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for FlakyNotifier {
    async fn send(&self, _channel_id: &ChannelId, _text: &str) -> Result<(), NotifyError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(NotifyError::Transport("connection reset".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Outbox that refuses every job.
pub(super) struct UnavailableOutbox;

impl NotificationOutbox for UnavailableOutbox {
    fn enqueue(&self, _job: NotificationJob) -> Result<(), OutboxError> {
        Err(OutboxError::Unavailable("queue offline".to_string()))
    }

    fn claim_due(
        &self,
        _now: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<NotificationJob>, OutboxError> {
        Err(OutboxError::Unavailable("queue offline".to_string()))
    }

    fn complete(&self, id: Uuid) -> Result<(), OutboxError> {
        Err(OutboxError::NotClaimed(id))
    }

    fn reschedule(
        &self,
        job: NotificationJob,
        _next_attempt_at: DateTime<Utc>,
        _error: String,
    ) -> Result<(), OutboxError> {
        Err(OutboxError::NotClaimed(job.id))
    }

    fn dead_letter(&self, job: NotificationJob, _error: String) -> Result<(), OutboxError> {
        Err(OutboxError::NotClaimed(job.id))
    }

    fn release(&self, id: Uuid) -> Result<(), OutboxError> {
        Err(OutboxError::NotClaimed(id))
    }

    fn pending(&self) -> Result<Vec<NotificationJob>, OutboxError> {
        Ok(Vec::new())
    }

    fn dead_letters(&self) -> Result<Vec<NotificationJob>, OutboxError> {
        Ok(Vec::new())
    }
}

/// Store whose backend is offline.
pub(super) struct UnavailableStore;

fn offline<T>() -> Result<T, StoreError> {
    Err(StoreError::Unavailable("database offline".to_string()))
}

impl RecordStore for UnavailableStore {
    fn find_many(&self, _filter: &ApprenticeshipFilter) -> Result<Vec<Apprenticeship>, StoreError> {
        offline()
    }

    fn find_first(
        &self,
        _filter: &ApprenticeshipFilter,
    ) -> Result<Option<Apprenticeship>, StoreError> {
        offline()
    }

    fn find_details(
        &self,
        _filter: &ApprenticeshipFilter,
    ) -> Result<Vec<ApprenticeshipDetails>, StoreError> {
        offline()
    }

    fn fetch(&self, _id: &ApprenticeshipId) -> Result<Option<Apprenticeship>, StoreError> {
        offline()
    }

    fn create(&self, _record: Apprenticeship) -> Result<Apprenticeship, StoreError> {
        offline()
    }

    fn update(&self, _record: Apprenticeship) -> Result<Apprenticeship, StoreError> {
        offline()
    }

    fn delete(&self, _id: &ApprenticeshipId) -> Result<Apprenticeship, StoreError> {
        offline()
    }

    fn set_flag(
        &self,
        _id: &ApprenticeshipId,
        _flag: ApprenticeshipFlag,
    ) -> Result<Apprenticeship, StoreError> {
        offline()
    }

    fn find_user(&self, _id: &UserId) -> Result<Option<User>, StoreError> {
        offline()
    }

    fn find_curator(&self, _id: &CuratorId) -> Result<Option<Curator>, StoreError> {
        offline()
    }

    fn find_curator_group(
        &self,
        _id: &CuratorGroupId,
    ) -> Result<Option<CuratorGroup>, StoreError> {
        offline()
    }

    fn list_types(&self) -> Result<Vec<ApprenticeshipType>, StoreError> {
        offline()
    }

    fn find_type(
        &self,
        _id: &ApprenticeshipTypeId,
    ) -> Result<Option<ApprenticeshipType>, StoreError> {
        offline()
    }

    fn create_type(&self, _record: ApprenticeshipType) -> Result<ApprenticeshipType, StoreError> {
        offline()
    }

    fn delete_type(&self, _id: &ApprenticeshipTypeId) -> Result<ApprenticeshipType, StoreError> {
        offline()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
