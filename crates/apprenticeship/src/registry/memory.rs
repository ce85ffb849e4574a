use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    Apprenticeship, ApprenticeshipDetails, ApprenticeshipFilter, ApprenticeshipFlag,
    ApprenticeshipId, ApprenticeshipType, ApprenticeshipTypeId, Curator, CuratorGroup,
    CuratorGroupId, CuratorId, MissingEntity, User, UserId,
};
use super::seed::RegistrySeed;
use super::store::{RecordStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    apprenticeships: BTreeMap<ApprenticeshipId, Apprenticeship>,
    types: BTreeMap<ApprenticeshipTypeId, ApprenticeshipType>,
    users: BTreeMap<UserId, User>,
    curators: BTreeMap<CuratorId, Curator>,
    curator_groups: BTreeMap<CuratorGroupId, CuratorGroup>,
}

impl Tables {
    fn details(&self, record: &Apprenticeship) -> ApprenticeshipDetails {
        ApprenticeshipDetails {
            apprenticeship: record.clone(),
            user: self.users.get(&record.user_id).cloned(),
            curator: record
                .curator_id
                .as_ref()
                .and_then(|id| self.curators.get(id))
                .cloned(),
            curator_group: record
                .curator_group_id
                .as_ref()
                .and_then(|id| self.curator_groups.get(id))
                .cloned(),
            apprenticeship_type: self.types.get(&record.apprenticeship_type_id).cloned(),
        }
    }

    fn check_references(&self, record: &Apprenticeship) -> Result<(), StoreError> {
        if !self.users.contains_key(&record.user_id) {
            return Err(StoreError::NotFound(MissingEntity::User(
                record.user_id.clone(),
            )));
        }
        if !self.types.contains_key(&record.apprenticeship_type_id) {
            return Err(StoreError::NotFound(MissingEntity::ApprenticeshipType(
                record.apprenticeship_type_id.clone(),
            )));
        }
        if let Some(id) = &record.curator_id {
            if !self.curators.contains_key(id) {
                return Err(StoreError::NotFound(MissingEntity::Curator(id.clone())));
            }
        }
        if let Some(id) = &record.curator_group_id {
            if !self.curator_groups.contains_key(id) {
                return Err(StoreError::NotFound(MissingEntity::CuratorGroup(id.clone())));
            }
        }
        Ok(())
    }
}

/// Process-local record store backed by ordered maps behind a single mutex.
///
/// Foreign keys are enforced the way a relational backend would: connecting to a missing
/// user or type fails, and a type cannot be removed while apprenticeships reference it.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRecordStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryRecordStore {
    pub fn from_seed(seed: RegistrySeed) -> Self {
        let store = Self::default();
        {
            let mut tables = store
                .tables
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            for user in seed.users {
                tables.users.insert(user.id.clone(), user);
            }
            for curator in seed.curators {
                tables.curators.insert(curator.id.clone(), curator);
            }
            for group in seed.curator_groups {
                tables.curator_groups.insert(group.id.clone(), group);
            }
            for kind in seed.apprenticeship_types {
                tables.types.insert(kind.id.clone(), kind);
            }
        }
        store
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Unavailable("record store mutex poisoned".to_string()))
    }

    pub fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let mut tables = self.tables()?;
        tables.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    pub fn insert_curator(&self, curator: Curator) -> Result<Curator, StoreError> {
        let mut tables = self.tables()?;
        tables.curators.insert(curator.id.clone(), curator.clone());
        Ok(curator)
    }

    pub fn insert_curator_group(&self, group: CuratorGroup) -> Result<CuratorGroup, StoreError> {
        let mut tables = self.tables()?;
        tables.curator_groups.insert(group.id.clone(), group.clone());
        Ok(group)
    }
}

impl RecordStore for InMemoryRecordStore {
    fn find_many(&self, filter: &ApprenticeshipFilter) -> Result<Vec<Apprenticeship>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .apprenticeships
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    fn find_first(
        &self,
        filter: &ApprenticeshipFilter,
    ) -> Result<Option<Apprenticeship>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .apprenticeships
            .values()
            .find(|record| filter.matches(record))
            .cloned())
    }

    fn find_details(
        &self,
        filter: &ApprenticeshipFilter,
    ) -> Result<Vec<ApprenticeshipDetails>, StoreError> {
        let tables = self.tables()?;
        Ok(tables
            .apprenticeships
            .values()
            .filter(|record| filter.matches(record))
            .map(|record| tables.details(record))
            .collect())
    }

    fn fetch(&self, id: &ApprenticeshipId) -> Result<Option<Apprenticeship>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.apprenticeships.get(id).cloned())
    }

    fn create(&self, record: Apprenticeship) -> Result<Apprenticeship, StoreError> {
        let mut tables = self.tables()?;
        if tables.apprenticeships.contains_key(&record.id) {
            return Err(StoreError::Conflict);
        }
        tables.check_references(&record)?;
        tables
            .apprenticeships
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: Apprenticeship) -> Result<Apprenticeship, StoreError> {
        let mut tables = self.tables()?;
        if !tables.apprenticeships.contains_key(&record.id) {
            return Err(StoreError::NotFound(MissingEntity::Apprenticeship(
                record.id.clone(),
            )));
        }
        tables.check_references(&record)?;
        tables
            .apprenticeships
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn delete(&self, id: &ApprenticeshipId) -> Result<Apprenticeship, StoreError> {
        let mut tables = self.tables()?;
        tables
            .apprenticeships
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(MissingEntity::Apprenticeship(id.clone())))
    }

    fn set_flag(
        &self,
        id: &ApprenticeshipId,
        flag: ApprenticeshipFlag,
    ) -> Result<Apprenticeship, StoreError> {
        let mut tables = self.tables()?;
        let record = tables
            .apprenticeships
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(MissingEntity::Apprenticeship(id.clone())))?;
        if flag.is_set(record) {
            return Err(StoreError::FlagAlreadySet {
                id: id.clone(),
                flag,
            });
        }
        flag.set(record);
        Ok(record.clone())
    }

    fn find_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.users.get(id).cloned())
    }

    fn find_curator(&self, id: &CuratorId) -> Result<Option<Curator>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.curators.get(id).cloned())
    }

    fn find_curator_group(
        &self,
        id: &CuratorGroupId,
    ) -> Result<Option<CuratorGroup>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.curator_groups.get(id).cloned())
    }

    fn list_types(&self) -> Result<Vec<ApprenticeshipType>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.types.values().cloned().collect())
    }

    fn find_type(
        &self,
        id: &ApprenticeshipTypeId,
    ) -> Result<Option<ApprenticeshipType>, StoreError> {
        let tables = self.tables()?;
        Ok(tables.types.get(id).cloned())
    }

    fn create_type(&self, record: ApprenticeshipType) -> Result<ApprenticeshipType, StoreError> {
        let mut tables = self.tables()?;
        if tables.types.contains_key(&record.id) {
            return Err(StoreError::Conflict);
        }
        tables.types.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn delete_type(&self, id: &ApprenticeshipTypeId) -> Result<ApprenticeshipType, StoreError> {
        let mut tables = self.tables()?;
        if !tables.types.contains_key(id) {
            return Err(StoreError::NotFound(MissingEntity::ApprenticeshipType(
                id.clone(),
            )));
        }
        let references = tables
            .apprenticeships
            .values()
            .filter(|record| &record.apprenticeship_type_id == id)
            .count();
        if references > 0 {
            return Err(StoreError::TypeInUse {
                id: id.clone(),
                references,
            });
        }
        tables
            .types
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(MissingEntity::ApprenticeshipType(id.clone())))
    }
}
