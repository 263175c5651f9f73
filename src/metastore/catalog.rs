//! Catalog operations trait
//!
//! The rebalancer only talks to the metastore through this trait, so a run
//! can be driven against an in-memory catalog in tests.

use async_trait::async_trait;

use crate::common::{Error, Result};
use crate::metastore::descriptor::{DatabaseInfo, TableDescriptor};

#[async_trait]
pub trait Catalog: Send {
    /// List catalog names
    async fn list_catalogs(&mut self) -> Result<Vec<String>>;

    /// List database names
    async fn list_databases(&mut self) -> Result<Vec<String>>;

    /// Fetch a database record
    async fn get_database(&mut self, name: &str) -> Result<DatabaseInfo>;

    /// List table names in a database
    async fn list_tables(&mut self, database: &str) -> Result<Vec<String>>;

    /// Fetch the full table record
    async fn get_table(&mut self, database: &str, name: &str) -> Result<TableDescriptor>;

    /// Replace the whole table record.
    ///
    /// Fields missing from `descriptor` are dropped by the metastore; use
    /// [`update_table`] to derive the new record from the current one.
    async fn alter_table(
        &mut self,
        database: &str,
        name: &str,
        descriptor: &TableDescriptor,
    ) -> Result<()>;

    /// Release the connection; calling it again is a no-op
    async fn close(&mut self) -> Result<()>;
}

/// Read-modify-write of one table.
///
/// `transform` gets the current descriptor and returns the replacement, or
/// `None` to leave the table alone. A replacement identical to the original
/// is not submitted. Returns the descriptor that was written, if any.
pub async fn update_table<C, F>(
    catalog: &mut C,
    original: &TableDescriptor,
    transform: F,
) -> Result<Option<TableDescriptor>>
where
    C: Catalog + ?Sized,
    F: FnOnce(&TableDescriptor) -> Result<Option<TableDescriptor>>,
{
    let updated = match transform(original)? {
        Some(updated) => updated,
        None => return Ok(None),
    };
    if updated.id() != original.id() {
        return Err(Error::Internal(format!(
            "Update of {} tried to rename it to {}",
            original.id(),
            updated.id()
        )));
    }
    if &updated == original {
        return Ok(None);
    }
    catalog
        .alter_table(original.database(), original.name(), &updated)
        .await?;
    Ok(Some(updated))
}
