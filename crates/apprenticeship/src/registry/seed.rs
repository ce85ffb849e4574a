use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::domain::{ApprenticeshipType, Curator, CuratorGroup, User};

/// Reference data loaded at startup: users, curators, curator groups, and the type taxonomy.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrySeed {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub curators: Vec<Curator>,
    #[serde(default)]
    pub curator_groups: Vec<CuratorGroup>,
    #[serde(default)]
    pub apprenticeship_types: Vec<ApprenticeshipType>,
}

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("unable to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("seed file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate {entity} id '{id}' in seed")]
    DuplicateId { entity: &'static str, id: String },
}

impl RegistrySeed {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, SeedError> {
        let seed: RegistrySeed = serde_json::from_str(raw)?;
        seed.validate()?;
        Ok(seed)
    }

    fn validate(&self) -> Result<(), SeedError> {
        unique("user", self.users.iter().map(|user| user.id.as_str()))?;
        unique("curator", self.curators.iter().map(|c| c.id.as_str()))?;
        unique(
            "curator group",
            self.curator_groups.iter().map(|g| g.id.as_str()),
        )?;
        unique(
            "apprenticeship type",
            self.apprenticeship_types.iter().map(|t| t.id.as_str()),
        )
    }
}

fn unique<'a>(entity: &'static str, ids: impl Iterator<Item = &'a str>) -> Result<(), SeedError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(SeedError::DuplicateId {
                entity,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}
