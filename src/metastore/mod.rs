//! Hive metastore catalog client
//!
//! - [`Catalog`]: operations the rebalancer needs from a metastore
//! - [`MetastoreClient`]: Thrift implementation talking to a live metastore
//! - [`TableDescriptor`]: full table record with typed accessors

pub mod catalog;
pub mod client;
pub mod descriptor;
#[cfg(test)]
pub mod memory;

pub use catalog::{update_table, Catalog};
pub use client::{MetastoreClient, RetryPolicy};
pub use descriptor::{DatabaseInfo, TableDescriptor, TableId};
