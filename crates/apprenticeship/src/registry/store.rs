use super::domain::{
    Apprenticeship, ApprenticeshipDetails, ApprenticeshipFilter, ApprenticeshipFlag,
    ApprenticeshipId, ApprenticeshipType, ApprenticeshipTypeId, Curator, CuratorGroup,
    CuratorGroupId, CuratorId, MissingEntity, User, UserId,
};

/// Storage abstraction owning canonical apprenticeship state.
///
/// Every method is a single atomic operation against the backing store. `set_flag` is the
/// compare-and-set used by the status workflow: it must fail with
/// [`StoreError::FlagAlreadySet`] instead of overwriting a flag that is already `true`.
pub trait RecordStore: Send + Sync {
    fn find_many(&self, filter: &ApprenticeshipFilter) -> Result<Vec<Apprenticeship>, StoreError>;
    fn find_first(
        &self,
        filter: &ApprenticeshipFilter,
    ) -> Result<Option<Apprenticeship>, StoreError>;
    fn find_details(
        &self,
        filter: &ApprenticeshipFilter,
    ) -> Result<Vec<ApprenticeshipDetails>, StoreError>;
    fn fetch(&self, id: &ApprenticeshipId) -> Result<Option<Apprenticeship>, StoreError>;
    fn create(&self, record: Apprenticeship) -> Result<Apprenticeship, StoreError>;
    fn update(&self, record: Apprenticeship) -> Result<Apprenticeship, StoreError>;
    fn delete(&self, id: &ApprenticeshipId) -> Result<Apprenticeship, StoreError>;
    fn set_flag(
        &self,
        id: &ApprenticeshipId,
        flag: ApprenticeshipFlag,
    ) -> Result<Apprenticeship, StoreError>;

    fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError>;
    fn find_curator(&self, id: &CuratorId) -> Result<Option<Curator>, StoreError>;
    fn find_curator_group(&self, id: &CuratorGroupId)
        -> Result<Option<CuratorGroup>, StoreError>;

    fn list_types(&self) -> Result<Vec<ApprenticeshipType>, StoreError>;
    fn find_type(&self, id: &ApprenticeshipTypeId)
        -> Result<Option<ApprenticeshipType>, StoreError>;
    fn create_type(&self, record: ApprenticeshipType) -> Result<ApprenticeshipType, StoreError>;
    fn delete_type(&self, id: &ApprenticeshipTypeId) -> Result<ApprenticeshipType, StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("{0}")]
    NotFound(MissingEntity),
    #[error("{flag} is already confirmed for apprenticeship {id}")]
    FlagAlreadySet {
        id: ApprenticeshipId,
        flag: ApprenticeshipFlag,
    },
    #[error("apprenticeship type {id} is referenced by {references} apprenticeship(s)")]
    TypeInUse {
        id: ApprenticeshipTypeId,
        references: usize,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
