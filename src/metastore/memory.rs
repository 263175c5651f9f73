//! In-memory catalog used by unit tests

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::common::{Error, Result};
use crate::metastore::catalog::Catalog;
use crate::metastore::descriptor::{DatabaseInfo, TableDescriptor, TableId};

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    pub tables: BTreeMap<TableId, TableDescriptor>,
    pub alter_calls: Vec<TableId>,
    pub closed: usize,
    /// Names returned by `list_tables` that `get_table` no longer finds
    pub listed_only: Vec<TableId>,
}

impl MemoryCatalog {
    pub fn with_tables(tables: impl IntoIterator<Item = TableDescriptor>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.id().clone(), t))
                .collect(),
            ..Default::default()
        }
    }

    pub fn table(&self, database: &str, name: &str) -> &TableDescriptor {
        &self.tables[&TableId::new(database, name)]
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn list_catalogs(&mut self) -> Result<Vec<String>> {
        Ok(vec!["hive".to_string()])
    }

    async fn list_databases(&mut self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.tables.keys().map(|id| id.database.clone()).collect();
        names.dedup();
        Ok(names)
    }

    async fn get_database(&mut self, name: &str) -> Result<DatabaseInfo> {
        if !self.tables.keys().any(|id| id.database == name) {
            return Err(Error::NotFound(format!("database {}", name)));
        }
        Ok(DatabaseInfo {
            name: name.to_string(),
            description: None,
            location_uri: None,
            parameters: Vec::new(),
        })
    }

    async fn list_tables(&mut self, database: &str) -> Result<Vec<String>> {
        Ok(self
            .tables
            .keys()
            .chain(self.listed_only.iter())
            .filter(|id| id.database == database)
            .map(|id| id.table.clone())
            .collect())
    }

    async fn get_table(&mut self, database: &str, name: &str) -> Result<TableDescriptor> {
        self.tables
            .get(&TableId::new(database, name))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{}.{}", database, name)))
    }

    async fn alter_table(
        &mut self,
        database: &str,
        name: &str,
        descriptor: &TableDescriptor,
    ) -> Result<()> {
        let id = TableId::new(database, name);
        if !self.tables.contains_key(&id) {
            return Err(Error::Metastore {
                kind: "InvalidOperationException".to_string(),
                message: format!("{} does not exist", id),
            });
        }
        self.alter_calls.push(id.clone());
        self.tables.insert(id, descriptor.clone());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metastore::catalog::update_table;
    use crate::metastore::descriptor::table_struct;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::with_tables(vec![TableDescriptor::from_struct(table_struct(
            "tpcds",
            "item",
            "hdfs://dc1:9000/tpcds/item",
            None,
            &[],
        ))
        .unwrap()])
    }

    #[tokio::test]
    async fn test_update_table_submits_full_record() {
        let mut catalog = catalog();
        let original = catalog.get_table("tpcds", "item").await.unwrap();
        let written = update_table(&mut catalog, &original, |t| {
            t.with_location("hdfs://dc2:9000/tpcds/item").map(Some)
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(catalog.alter_calls, vec![TableId::new("tpcds", "item")]);
        let stored = catalog.table("tpcds", "item");
        assert_eq!(stored, &written);
        assert_eq!(stored.location(), Some("hdfs://dc2:9000/tpcds/item"));
        assert_eq!(
            stored.with_location("hdfs://dc1:9000/tpcds/item").unwrap(),
            original
        );
    }

    #[tokio::test]
    async fn test_update_table_skips_noop() {
        let mut catalog = catalog();
        let original = catalog.get_table("tpcds", "item").await.unwrap();
        let none = update_table(&mut catalog, &original, |_| Ok(None)).await.unwrap();
        assert!(none.is_none());
        let same = update_table(&mut catalog, &original, |t| Ok(Some(t.clone())))
            .await
            .unwrap();
        assert!(same.is_none());
        assert!(catalog.alter_calls.is_empty());
    }

    #[tokio::test]
    async fn test_update_table_rejects_rename() {
        let mut catalog = catalog();
        let original = catalog.get_table("tpcds", "item").await.unwrap();
        let err = update_table(&mut catalog, &original, |_| {
            TableDescriptor::from_struct(table_struct("tpcds", "other", "x", None, &[])).map(Some)
        })
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
        assert!(catalog.alter_calls.is_empty());
    }
}
