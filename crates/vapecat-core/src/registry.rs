//! Name → id lookups for brands, seller sites and product categories.
//!
//! Each registry is fetched once at the start of a run and treated as
//! immutable for the rest of it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One `{id, name}` entry from an external registry table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: i64,
    pub name: String,
}

/// Registry keyed by the entry's exact name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<String, RegistryEntry>,
}

impl Registry {
    /// Build a registry from entries. A later entry with the same name
    /// replaces an earlier one.
    #[must_use]
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = RegistryEntry>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.name.clone(), entry))
                .collect(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }
}

impl FromIterator<RegistryEntry> for Registry {
    fn from_iter<I: IntoIterator<Item = RegistryEntry>>(iter: I) -> Self {
        Self::from_entries(iter)
    }
}
