//! One rebalancing pass over the catalog.
//!
//! collect (list + fetch + size) -> plan -> rewrite each table whose planned
//! backend differs from where it lives now. A table that cannot be sized or
//! whose location matches neither backend is reported and left alone.

use crate::common::{BackendId, BackendPair, Error, RebalanceConfig, Result};
use crate::inventory::{SizeInventory, SizeSource, TableSize};
use crate::metastore::{update_table, Catalog, TableDescriptor, TableId};
use crate::planner::{plan, PlacementPlan};
use crate::rewriter::rewrite;

/// A table as found in the catalog
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub table: TableDescriptor,
    /// Backend currently holding the table, `None` for a foreign location
    pub backend: Option<BackendId>,
    pub size: Option<TableSize>,
}

impl TableEntry {
    pub fn id(&self) -> &TableId {
        self.table.id()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMove {
    pub id: TableId,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct RebalanceReport {
    pub plan: PlacementPlan,
    pub moved: Vec<TableMove>,
    pub unchanged: usize,
    /// Tables left out of the plan because they could not be sized
    pub skipped: Vec<(TableId, String)>,
    /// Tables whose location matches neither backend
    pub unrecognized: Vec<(TableId, String)>,
    pub dry_run: bool,
}

pub struct Rebalancer {
    backends: BackendPair,
    inventory: SizeInventory,
    databases: Vec<String>,
    dry_run: bool,
}

impl Rebalancer {
    pub fn new(backends: BackendPair, inventory: SizeInventory) -> Self {
        Self {
            backends,
            inventory,
            databases: Vec::new(),
            dry_run: false,
        }
    }

    pub fn from_config(cfg: &RebalanceConfig) -> Result<Self> {
        let backends = BackendPair::from_config(&cfg.backends)?;
        let inventory = SizeInventory::from_config(cfg, backends.clone())?;
        Ok(Self::new(backends, inventory).with_databases(cfg.inventory.databases.clone()))
    }

    /// Restrict the run to these databases; empty means all of them
    pub fn with_databases(mut self, databases: Vec<String>) -> Self {
        self.databases = databases;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn backends(&self) -> &BackendPair {
        &self.backends
    }

    pub fn inventory(&self) -> &SizeInventory {
        &self.inventory
    }

    /// Databases taking part in the run, in catalog order
    pub async fn databases<C: Catalog + ?Sized>(&self, catalog: &mut C) -> Result<Vec<String>> {
        let all = catalog.list_databases().await?;
        if self.databases.is_empty() {
            return Ok(all);
        }
        for wanted in &self.databases {
            if !all.contains(wanted) {
                tracing::warn!("Database {} is not in the catalog", wanted);
            }
        }
        Ok(all
            .into_iter()
            .filter(|db| self.databases.contains(db))
            .collect())
    }

    /// Fetch and size every table of the selected databases
    pub async fn collect<C: Catalog + ?Sized>(&self, catalog: &mut C) -> Result<Vec<TableEntry>> {
        let mut entries = Vec::new();
        for database in self.databases(catalog).await? {
            let tables = catalog.list_tables(&database).await?;
            tracing::info!("Database {}: {} tables", database, tables.len());
            for name in tables {
                let table = match catalog.get_table(&database, &name).await {
                    Ok(table) => table,
                    Err(Error::NotFound(e)) => {
                        tracing::warn!("Skipping {}.{}, dropped since listing: {}", database, name, e);
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                let backend = table.location().and_then(|l| self.backends.locate(l));
                let size = match self.inventory.size_of(&table).await {
                    Ok(size) => Some(size),
                    Err(e) if e.is_per_table() => {
                        tracing::warn!("Skipping {}: {}", table.id(), e);
                        None
                    }
                    Err(e) => return Err(e),
                };
                entries.push(TableEntry {
                    table,
                    backend,
                    size,
                });
            }
        }
        Ok(entries)
    }

    /// Stamp listed sizes into the catalog under the size key.
    ///
    /// Returns the tables written (or that would be, on a dry run).
    pub async fn stamp<C: Catalog + ?Sized>(
        &self,
        catalog: &mut C,
        entries: &mut [TableEntry],
    ) -> Result<Vec<TableId>> {
        let key = self.inventory.size_key().to_string();
        let mut stamped = Vec::new();
        for entry in entries.iter_mut() {
            let bytes = match entry.size {
                Some(TableSize {
                    bytes,
                    source: SizeSource::Listed,
                }) => bytes,
                _ => continue,
            };
            let value = bytes.to_string();
            if self.dry_run {
                tracing::info!("Would stamp {} = {} on {}", key, value, entry.id());
                stamped.push(entry.id().clone());
                continue;
            }
            let written = update_table(catalog, &entry.table, |t| {
                t.with_storage_parameter(&key, &value).map(Some)
            })
            .await?;
            if let Some(updated) = written {
                tracing::info!("Stamped {} = {} on {}", key, value, entry.id());
                stamped.push(entry.id().clone());
                entry.table = updated;
                entry.size = Some(TableSize {
                    bytes,
                    source: SizeSource::Cached,
                });
            }
        }
        Ok(stamped)
    }

    /// Placement over every sized table living on one of the two backends
    pub fn plan(&self, entries: &[TableEntry]) -> PlacementPlan {
        let sized: Vec<(TableId, u64)> = entries
            .iter()
            .filter(|e| e.backend.is_some())
            .filter_map(|e| e.size.map(|s| (e.id().clone(), s.bytes)))
            .collect();
        plan(&sized)
    }

    /// Rewrite every table whose planned backend differs from its current one
    pub async fn apply<C: Catalog + ?Sized>(
        &self,
        catalog: &mut C,
        entries: &[TableEntry],
        placement: PlacementPlan,
    ) -> Result<RebalanceReport> {
        let mut report = RebalanceReport {
            plan: placement,
            moved: Vec::new(),
            unchanged: 0,
            skipped: Vec::new(),
            unrecognized: Vec::new(),
            dry_run: self.dry_run,
        };

        for entry in entries {
            if entry.backend.is_none() {
                let location = entry.table.location().unwrap_or("-").to_string();
                tracing::warn!(
                    "Leaving {} alone: unrecognized location {}",
                    entry.id(),
                    location
                );
                report.unrecognized.push((entry.id().clone(), location));
                continue;
            }
            let target = match report.plan.target(entry.id()) {
                Some(target) => target,
                None => {
                    report.skipped.push((
                        entry.id().clone(),
                        "size unavailable".to_string(),
                    ));
                    continue;
                }
            };

            let outcome = if self.dry_run {
                rewrite(&entry.table, target, &self.backends)
            } else {
                update_table(catalog, &entry.table, |t| {
                    rewrite(t, target, &self.backends)
                })
                .await
            };

            match outcome {
                Ok(Some(updated)) => {
                    let from = entry.table.location().unwrap_or_default().to_string();
                    let to = updated.location().unwrap_or_default().to_string();
                    let verb = if self.dry_run { "Would move" } else { "Moved" };
                    tracing::info!(
                        "{} {} {} -> {}",
                        verb,
                        entry.id(),
                        from,
                        to
                    );
                    report.moved.push(TableMove {
                        id: entry.id().clone(),
                        from,
                        to,
                    });
                }
                Ok(None) => report.unchanged += 1,
                Err(Error::UnrecognizedLocation(location)) => {
                    tracing::warn!(
                        "Leaving {} alone: unrecognized location {}",
                        entry.id(),
                        location
                    );
                    report.unrecognized.push((entry.id().clone(), location));
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            "Rebalance done: {} moved, {} unchanged, {} skipped, {} unrecognized",
            report.moved.len(),
            report.unchanged,
            report.skipped.len(),
            report.unrecognized.len()
        );
        Ok(report)
    }

    /// Full pass; the catalog is closed whether or not the pass succeeds
    pub async fn run<C: Catalog + ?Sized>(&self, catalog: &mut C) -> Result<RebalanceReport> {
        let result = self.run_pass(catalog).await;
        if let Err(e) = catalog.close().await {
            tracing::warn!("Failed to close catalog connection: {}", e);
        }
        result
    }

    async fn run_pass<C: Catalog + ?Sized>(&self, catalog: &mut C) -> Result<RebalanceReport> {
        let entries = self.collect(catalog).await?;
        let placement = self.plan(&entries);
        for (id, backend) in self.backends.iter() {
            tracing::info!("Planned load on {}: {} bytes", backend, placement.load(id));
        }
        self.apply(catalog, &entries, placement).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::StorageBackend;
    use crate::metastore::descriptor::table_struct;
    use crate::metastore::memory::MemoryCatalog;
    use crate::ufs::Ufs;
    use object_store::{memory::InMemory, path::Path as ObjectPath, ObjectStore};
    use std::sync::Arc;

    const SIZE_KEY: &str = "qflock.storage_size";

    fn backends() -> BackendPair {
        BackendPair::new(
            StorageBackend::new("dc1", "hdfs://dc1:9000").unwrap(),
            StorageBackend::new("dc2", "hdfs://dc2:9000").unwrap(),
        )
        .unwrap()
    }

    fn cached(name: &str, location: &str, size: u64) -> TableDescriptor {
        let size = size.to_string();
        TableDescriptor::from_struct(table_struct(
            "tpcds",
            name,
            location,
            Some(location),
            &[(SIZE_KEY, size.as_str())],
        ))
        .unwrap()
    }

    fn rebalancer() -> Rebalancer {
        Rebalancer::new(backends(), SizeInventory::new(SIZE_KEY, backends()))
    }

    fn four_tables() -> MemoryCatalog {
        MemoryCatalog::with_tables(vec![
            cached("t1", "hdfs://dc1:9000/tpcds/t1", 400),
            cached("t2", "hdfs://dc1:9000/tpcds/t2", 300),
            cached("t3", "hdfs://dc1:9000/tpcds/t3", 200),
            cached("t4", "hdfs://dc1:9000/tpcds/t4", 100),
        ])
    }

    #[tokio::test]
    async fn test_run_moves_every_other_table() {
        let mut catalog = four_tables();
        let report = rebalancer().run(&mut catalog).await.unwrap();

        assert_eq!(report.plan.load(BackendId::A), 600);
        assert_eq!(report.plan.load(BackendId::B), 400);
        assert_eq!(
            catalog.alter_calls,
            vec![TableId::new("tpcds", "t2"), TableId::new("tpcds", "t4")]
        );
        assert_eq!(report.unchanged, 2);
        let t2 = catalog.table("tpcds", "t2");
        assert_eq!(t2.location(), Some("hdfs://dc2:9000/tpcds/t2"));
        assert_eq!(t2.serde_path(), Some("hdfs://dc2:9000/tpcds/t2"));
        assert_eq!(t2.cached_size(SIZE_KEY), Some(300));
        assert_eq!(catalog.closed, 1);
    }

    #[tokio::test]
    async fn test_second_run_is_a_noop() {
        let mut catalog = four_tables();
        rebalancer().run(&mut catalog).await.unwrap();
        catalog.alter_calls.clear();

        let report = rebalancer().run(&mut catalog).await.unwrap();
        assert!(catalog.alter_calls.is_empty());
        assert!(report.moved.is_empty());
        assert_eq!(report.unchanged, 4);
    }

    #[tokio::test]
    async fn test_dry_run_submits_nothing() {
        let mut catalog = four_tables();
        let report = rebalancer()
            .with_dry_run(true)
            .run(&mut catalog)
            .await
            .unwrap();
        assert!(catalog.alter_calls.is_empty());
        assert_eq!(report.moved.len(), 2);
        assert!(report.dry_run);
    }

    #[tokio::test]
    async fn test_unsized_and_foreign_tables_are_reported() {
        let mut catalog = MemoryCatalog::with_tables(vec![
            cached("t1", "hdfs://dc1:9000/tpcds/t1", 400),
            cached("t2", "s3a://archive/tpcds/t2", 300),
            TableDescriptor::from_struct(table_struct(
                "tpcds",
                "t3",
                "hdfs://dc1:9000/tpcds/t3",
                None,
                &[],
            ))
            .unwrap(),
        ]);
        let report = rebalancer().run(&mut catalog).await.unwrap();

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].0, TableId::new("tpcds", "t3"));
        assert_eq!(report.unrecognized.len(), 1);
        assert_eq!(report.unrecognized[0].0, TableId::new("tpcds", "t2"));
        assert!(catalog.alter_calls.is_empty());
        assert_eq!(
            catalog.table("tpcds", "t2").location(),
            Some("s3a://archive/tpcds/t2")
        );
        assert_eq!(catalog.closed, 1);
    }

    #[tokio::test]
    async fn test_foreign_tables_stay_out_of_the_plan() {
        let mut catalog = MemoryCatalog::with_tables(vec![
            cached("a", "hdfs://dc1:9000/tpcds/a", 10),
            cached("b", "s3a://archive/tpcds/b", 9),
            cached("c", "hdfs://dc1:9000/tpcds/c", 8),
            cached("d", "hdfs://dc1:9000/tpcds/d", 7),
        ]);
        let report = rebalancer().run(&mut catalog).await.unwrap();

        assert_eq!(report.plan.target(&TableId::new("tpcds", "b")), None);
        assert_eq!(report.plan.load(BackendId::A), 17);
        assert_eq!(report.plan.load(BackendId::B), 8);
        assert!(report.plan.imbalance() <= 10);
        assert_eq!(catalog.alter_calls, vec![TableId::new("tpcds", "c")]);
        assert_eq!(report.unrecognized.len(), 1);
        assert_eq!(report.unrecognized[0].0, TableId::new("tpcds", "b"));
        assert!(report.skipped.is_empty());

        // Planned loads match where the tables actually live afterwards.
        let mut actual = [0u64; 2];
        for name in ["a", "c", "d"] {
            let table = catalog.table("tpcds", name);
            let bytes = table.cached_size(SIZE_KEY).unwrap();
            match backends().locate(table.location().unwrap()) {
                Some(BackendId::A) => actual[0] += bytes,
                Some(BackendId::B) => actual[1] += bytes,
                None => panic!("{} left both backends", name),
            }
        }
        assert_eq!(actual, [17, 8]);
    }

    #[tokio::test]
    async fn test_table_dropped_after_listing_is_skipped() {
        let mut catalog = four_tables();
        catalog.listed_only.push(TableId::new("tpcds", "gone"));
        let entries = rebalancer().collect(&mut catalog).await.unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|e| e.id().table != "gone"));
    }

    #[tokio::test]
    async fn test_database_filter() {
        let mut catalog = four_tables();
        catalog.tables.insert(
            TableId::new("other", "x"),
            TableDescriptor::from_struct(table_struct(
                "other",
                "x",
                "hdfs://dc1:9000/other/x",
                None,
                &[(SIZE_KEY, "5")],
            ))
            .unwrap(),
        );
        let entries = rebalancer()
            .with_databases(vec!["other".to_string(), "missing".to_string()])
            .collect(&mut catalog)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].backend, Some(BackendId::A));
    }

    #[tokio::test]
    async fn test_stamp_writes_listed_sizes_once() {
        let store = Arc::new(InMemory::new());
        store
            .put(&ObjectPath::from("tpcds/t5/part-0.parquet"), vec![0u8; 64].into())
            .await
            .unwrap();
        let inventory = SizeInventory::new(SIZE_KEY, backends())
            .with_store(BackendId::A, Arc::new(Ufs::with_store(store)));
        let rebalancer = Rebalancer::new(backends(), inventory);

        let mut catalog = MemoryCatalog::with_tables(vec![
            cached("t1", "hdfs://dc1:9000/tpcds/t1", 400),
            TableDescriptor::from_struct(table_struct(
                "tpcds",
                "t5",
                "hdfs://dc1:9000/tpcds/t5",
                None,
                &[("numFiles", "1")],
            ))
            .unwrap(),
        ]);

        let mut entries = rebalancer.collect(&mut catalog).await.unwrap();
        let stamped = rebalancer.stamp(&mut catalog, &mut entries).await.unwrap();
        assert_eq!(stamped, vec![TableId::new("tpcds", "t5")]);
        let t5 = catalog.table("tpcds", "t5");
        assert_eq!(t5.storage_parameter(SIZE_KEY), Some("64"));
        assert_eq!(t5.storage_parameter("numFiles"), Some("1"));

        let mut entries = rebalancer.collect(&mut catalog).await.unwrap();
        let stamped = rebalancer.stamp(&mut catalog, &mut entries).await.unwrap();
        assert!(stamped.is_empty());
        assert_eq!(catalog.alter_calls.len(), 1);
    }
}
