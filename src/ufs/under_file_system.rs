//! UFS (Unified File System) layer
//!
//! Directory listings over the object stores backing the storage backends,
//! used to size tables whose size was never stamped into the catalog.

use async_trait::async_trait;
use object_store::{path::Path as ObjectPath, ObjectStore};
use std::sync::Arc;

use crate::common::{Error, Result};
use crate::ufs::config::UfsConfig;

/// One direct child of a listed directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UfsEntry {
    pub path: String,
    pub size: u64,
    pub is_file: bool,
}

/// Trait for UFS operations
#[async_trait]
pub trait UfsOperations: Send + Sync {
    /// List the direct children of a directory (non-recursive)
    async fn list_entries(&self, prefix: &str) -> Result<Vec<UfsEntry>>;

    /// Size of a single object, `None` if it does not exist
    async fn object_size(&self, path: &str) -> Result<Option<u64>>;
}

/// UFS implementation wrapping object_store
pub struct Ufs {
    store: Arc<dyn ObjectStore>,
    description: String,
}

impl Ufs {
    pub fn new(config: UfsConfig) -> Result<Self> {
        let description = config.describe();
        let store = config.build()?;
        Ok(Self { store, description })
    }

    /// Create a UFS over an existing object store
    pub fn with_store(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            description: format!("{}", store),
            store,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    fn to_object_path(path: &str) -> Option<ObjectPath> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(ObjectPath::from(trimmed))
        }
    }
}

#[async_trait]
impl UfsOperations for Ufs {
    async fn list_entries(&self, prefix: &str) -> Result<Vec<UfsEntry>> {
        let prefix_path = Self::to_object_path(prefix);
        let listing = self
            .store
            .list_with_delimiter(prefix_path.as_ref())
            .await
            .map_err(|e| Error::Storage(format!("Failed to list directory {}: {}", prefix, e)))?;

        let files = listing.objects.into_iter().map(|meta| UfsEntry {
            path: format!("/{}", meta.location),
            size: meta.size as u64,
            is_file: true,
        });
        let dirs = listing.common_prefixes.into_iter().map(|path| UfsEntry {
            path: format!("/{}", path),
            size: 0,
            is_file: false,
        });
        Ok(files.chain(dirs).collect())
    }

    async fn object_size(&self, path: &str) -> Result<Option<u64>> {
        let object_path = match Self::to_object_path(path) {
            Some(p) => p,
            None => return Ok(None),
        };
        match self.store.head(&object_path).await {
            Ok(meta) => Ok(Some(meta.size as u64)),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(Error::Storage(format!(
                "Failed to get metadata for {}: {}",
                path, e
            ))),
        }
    }
}
