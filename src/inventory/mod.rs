//! Table size inventory
//!
//! Sizes normally come from a value stamped into the storage descriptor
//! parameters by an earlier inventory pass. Tables without one are measured
//! by listing their directory on the backend that holds them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::common::{object_key, BackendId, BackendPair, Error, RebalanceConfig, Result};
use crate::metastore::TableDescriptor;
use crate::ufs::{Ufs, UfsOperations};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeSource {
    /// Read from the catalog's cached size parameter
    Cached,
    /// Summed from a backend directory listing
    Listed,
}

impl fmt::Display for SizeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeSource::Cached => write!(f, "cached"),
            SizeSource::Listed => write!(f, "listed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSize {
    pub bytes: u64,
    pub source: SizeSource,
}

pub struct SizeInventory {
    size_key: String,
    stat_fallback: bool,
    backends: BackendPair,
    stores: HashMap<BackendId, Arc<dyn UfsOperations>>,
}

impl SizeInventory {
    pub fn new(size_key: impl Into<String>, backends: BackendPair) -> Self {
        Self {
            size_key: size_key.into(),
            stat_fallback: true,
            backends,
            stores: HashMap::new(),
        }
    }

    /// Build the inventory and a UFS for every backend that configures one
    pub fn from_config(cfg: &RebalanceConfig, backends: BackendPair) -> Result<Self> {
        let mut inventory = Self::new(cfg.inventory.size_key.clone(), backends);
        inventory.stat_fallback = cfg.inventory.stat_fallback;
        for (id, backend_cfg) in BackendId::all().into_iter().zip(cfg.backends.iter()) {
            if let Some(ufs_cfg) = &backend_cfg.ufs {
                let ufs = Ufs::new(ufs_cfg.clone())?;
                tracing::debug!(
                    "Backend {} is listed through {}",
                    backend_cfg.name,
                    ufs.description()
                );
                inventory.stores.insert(id, Arc::new(ufs));
            }
        }
        Ok(inventory)
    }

    pub fn with_store(mut self, id: BackendId, store: Arc<dyn UfsOperations>) -> Self {
        self.stores.insert(id, store);
        self
    }

    pub fn with_stat_fallback(mut self, enabled: bool) -> Self {
        self.stat_fallback = enabled;
        self
    }

    pub fn size_key(&self) -> &str {
        &self.size_key
    }

    /// Size of a table: the cached value if present, else a backend listing
    pub async fn size_of(&self, table: &TableDescriptor) -> Result<TableSize> {
        if let Some(bytes) = table.cached_size(&self.size_key) {
            return Ok(TableSize {
                bytes,
                source: SizeSource::Cached,
            });
        }
        if !self.stat_fallback {
            return Err(Error::SizeUnavailable {
                location: table.location().unwrap_or_default().to_string(),
                reason: format!("no cached {} and listing is disabled", self.size_key),
            });
        }
        let bytes = self.measure(table).await?;
        Ok(TableSize {
            bytes,
            source: SizeSource::Listed,
        })
    }

    /// Sum the sizes of the files directly under the table location
    pub async fn measure(&self, table: &TableDescriptor) -> Result<u64> {
        let unavailable = |location: &str, reason: String| Error::SizeUnavailable {
            location: location.to_string(),
            reason,
        };

        let location = table
            .location()
            .ok_or_else(|| unavailable("", format!("{} has no storage location", table.id())))?;
        let backend_id = self
            .backends
            .locate(location)
            .ok_or_else(|| unavailable(location, "location matches no backend".to_string()))?;
        let backend = self.backends.get(backend_id);
        let store = self.stores.get(&backend_id).ok_or_else(|| {
            unavailable(
                location,
                format!("no listing store configured for backend {}", backend.name),
            )
        })?;
        let key = object_key(location, &backend.prefix)
            .ok_or_else(|| unavailable(location, "location outside backend prefix".to_string()))?;

        let entries = store
            .list_entries(&key)
            .await
            .map_err(|e| unavailable(location, e.to_string()))?;
        if entries.is_empty() {
            // The location may name a single data file rather than a directory.
            let size = store
                .object_size(&key)
                .await
                .map_err(|e| unavailable(location, e.to_string()))?;
            return size.ok_or_else(|| unavailable(location, "location not found".to_string()));
        }

        let total: u64 = entries
            .iter()
            .filter(|entry| entry.is_file)
            .map(|entry| entry.size)
            .sum();
        tracing::debug!(
            "Listed {} entries under {}: {} bytes",
            entries.len(),
            location,
            total
        );
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::StorageBackend;
    use crate::metastore::descriptor::table_struct;
    use crate::ufs::UfsEntry;
    use async_trait::async_trait;
    use object_store::{memory::InMemory, path::Path as ObjectPath, ObjectStore};

    fn backends() -> BackendPair {
        BackendPair::new(
            StorageBackend::new("dc1", "hdfs://dc1:9000").unwrap(),
            StorageBackend::new("dc2", "hdfs://dc2:9000").unwrap(),
        )
        .unwrap()
    }

    fn table(location: &str, params: &[(&str, &str)]) -> TableDescriptor {
        TableDescriptor::from_struct(table_struct("tpcds", "item", location, None, params)).unwrap()
    }

    async fn memory_ufs(files: &[(&str, usize)]) -> Arc<dyn UfsOperations> {
        let store = Arc::new(InMemory::new());
        for (path, size) in files {
            store
                .put(&ObjectPath::from(*path), vec![1u8; *size].into())
                .await
                .unwrap();
        }
        Arc::new(Ufs::with_store(store))
    }

    struct Unreachable;

    #[async_trait]
    impl UfsOperations for Unreachable {
        async fn list_entries(&self, prefix: &str) -> Result<Vec<UfsEntry>> {
            Err(Error::Storage(format!("connection refused listing {}", prefix)))
        }

        async fn object_size(&self, _path: &str) -> Result<Option<u64>> {
            Err(Error::Storage("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_cached_size_wins() {
        let inventory = SizeInventory::new("qflock.storage_size", backends())
            .with_store(BackendId::A, Arc::new(Unreachable));
        let size = inventory
            .size_of(&table("hdfs://dc1:9000/tpcds/item", &[("qflock.storage_size", "123")]))
            .await
            .unwrap();
        assert_eq!(
            size,
            TableSize {
                bytes: 123,
                source: SizeSource::Cached
            }
        );
    }

    #[tokio::test]
    async fn test_listing_sums_direct_files() {
        let ufs = memory_ufs(&[
            ("tpcds/item/part-0.parquet", 100),
            ("tpcds/item/part-1.parquet", 50),
            ("tpcds/item/nested/part-2.parquet", 1000),
        ])
        .await;
        let inventory = SizeInventory::new("qflock.storage_size", backends())
            .with_store(BackendId::B, ufs);
        let size = inventory
            .size_of(&table("hdfs://dc2:9000/tpcds/item", &[]))
            .await
            .unwrap();
        assert_eq!(size.bytes, 150);
        assert_eq!(size.source, SizeSource::Listed);
    }

    #[tokio::test]
    async fn test_single_file_location() {
        let ufs = memory_ufs(&[("tpcds/item.parquet", 77)]).await;
        let inventory =
            SizeInventory::new("qflock.storage_size", backends()).with_store(BackendId::A, ufs);
        let bytes = inventory
            .measure(&table("hdfs://dc1:9000/tpcds/item.parquet", &[]))
            .await
            .unwrap();
        assert_eq!(bytes, 77);
    }

    #[tokio::test]
    async fn test_unavailable_cases() {
        let inventory = SizeInventory::new("qflock.storage_size", backends())
            .with_store(BackendId::A, Arc::new(Unreachable));

        for location in [
            "hdfs://dc1:9000/tpcds/item",
            "hdfs://dc2:9000/tpcds/item",
            "s3a://elsewhere/tpcds/item",
        ] {
            let err = inventory.size_of(&table(location, &[])).await.unwrap_err();
            assert!(
                matches!(err, Error::SizeUnavailable { .. }),
                "{}: {:?}",
                location,
                err
            );
            assert!(err.is_per_table());
        }

        let empty = SizeInventory::new("qflock.storage_size", backends())
            .with_store(BackendId::A, memory_ufs(&[]).await);
        let err = empty
            .size_of(&table("hdfs://dc1:9000/tpcds/does_not_exist", &[]))
            .await
            .unwrap_err();
        match err {
            Error::SizeUnavailable { reason, .. } => assert_eq!(reason, "location not found"),
            other => panic!("unexpected {:?}", other),
        }

        let no_listing = SizeInventory::new("qflock.storage_size", backends())
            .with_stat_fallback(false);
        let err = no_listing
            .size_of(&table("hdfs://dc1:9000/tpcds/item", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SizeUnavailable { .. }));
    }
}
