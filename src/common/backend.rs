//! Storage backends tables can be placed on.
//!
//! A backend is identified by the URI prefix (scheme + authority, optionally
//! a root directory) its table locations start with. Exactly two backends
//! take part in a rebalance.

use std::fmt;

use crate::common::{
    config::BackendConfig,
    error::{Error, Result},
    path::{normalize_prefix, replace_location_prefix, strip_location_prefix},
};

/// Slot of a backend within a [`BackendPair`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendId {
    A,
    B,
}

impl BackendId {
    pub fn index(self) -> usize {
        match self {
            BackendId::A => 0,
            BackendId::B => 1,
        }
    }

    pub fn all() -> [BackendId; 2] {
        [BackendId::A, BackendId::B]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageBackend {
    pub name: String,
    pub prefix: String,
}

impl StorageBackend {
    pub fn new(name: impl Into<String>, prefix: &str) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            prefix: normalize_prefix(prefix)?,
        })
    }

    /// Whether `location` lives under this backend's prefix
    pub fn holds(&self, location: &str) -> bool {
        strip_location_prefix(location, &self.prefix).is_some()
    }

    /// Move `location` from `from` onto this backend
    pub fn rebase(&self, location: &str, from: &StorageBackend) -> Option<String> {
        replace_location_prefix(location, &from.prefix, &self.prefix)
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.prefix)
    }
}

#[derive(Debug, Clone)]
pub struct BackendPair {
    backends: [StorageBackend; 2],
}

impl BackendPair {
    pub fn new(a: StorageBackend, b: StorageBackend) -> Result<Self> {
        if a.prefix == b.prefix {
            return Err(Error::Config(format!(
                "Backends '{}' and '{}' share the prefix {}",
                a.name, b.name, a.prefix
            )));
        }
        // Nested prefixes would make a location match both backends.
        if a.holds(&b.prefix) || b.holds(&a.prefix) {
            return Err(Error::Config(format!(
                "Backend prefixes {} and {} overlap",
                a.prefix, b.prefix
            )));
        }
        Ok(Self { backends: [a, b] })
    }

    pub fn from_config(configs: &[BackendConfig]) -> Result<Self> {
        match configs {
            [a, b] => Self::new(
                StorageBackend::new(&a.name, &a.prefix)?,
                StorageBackend::new(&b.name, &b.prefix)?,
            ),
            _ => Err(Error::Config(format!(
                "Exactly two storage backends are required, got {}",
                configs.len()
            ))),
        }
    }

    pub fn get(&self, id: BackendId) -> &StorageBackend {
        &self.backends[id.index()]
    }

    /// Backend whose prefix `location` starts with, if any
    pub fn locate(&self, location: &str) -> Option<BackendId> {
        BackendId::all()
            .into_iter()
            .find(|id| self.get(*id).holds(location))
    }

    pub fn iter(&self) -> impl Iterator<Item = (BackendId, &StorageBackend)> {
        BackendId::all().into_iter().map(move |id| (id, self.get(id)))
    }
}
