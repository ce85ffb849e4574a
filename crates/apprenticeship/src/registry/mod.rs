//! Apprenticeship records, the type taxonomy, and the one-way confirmation workflow.

pub mod context;
pub mod domain;
pub mod memory;
pub mod records;
pub mod router;
pub mod seed;
pub mod store;
pub mod transitions;

#[cfg(test)]
mod tests;

pub use context::{Actor, RequestContext};
pub use domain::{
    Apprenticeship, ApprenticeshipDetails, ApprenticeshipFilter, ApprenticeshipFlag,
    ApprenticeshipId, ApprenticeshipType, ApprenticeshipTypeId, ChannelId, Curator, CuratorGroup,
    CuratorGroupId, CuratorId, DateRange, MissingEntity, User, UserId, UserRole,
};
pub use memory::InMemoryRecordStore;
pub use records::{
    ApprenticeshipOverview, ApprenticeshipUpdate, NewApprenticeship, NewApprenticeshipType,
    RecordService, RecordServiceError,
};
pub use router::{registry_router, Envelope, RegistryState};
pub use seed::{RegistrySeed, SeedError};
pub use store::{RecordStore, StoreError};
pub use transitions::{
    ConfirmFlag, ConflictReason, StatusTransitionService, TransitionError, TransitionOutcome,
    TransitionRequest,
};
