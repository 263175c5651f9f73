//! Typed views over Hive metastore records.
//!
//! A [`TableDescriptor`] wraps the table struct exactly as the metastore sent
//! it. Accessors read through to the known fields; the `with_*` methods
//! return a modified copy and never touch any other field, so writing a
//! descriptor back replaces the record with an otherwise identical one.

use std::fmt;

use crate::common::{Error, Result};
use crate::thrift::{Struct, Value};

/// Field ids from hive_metastore.thrift
pub mod fields {
    pub const TABLE_NAME: i16 = 1;
    pub const TABLE_DB_NAME: i16 = 2;
    pub const TABLE_OWNER: i16 = 3;
    pub const TABLE_SD: i16 = 7;
    pub const TABLE_PARAMETERS: i16 = 9;
    pub const TABLE_TYPE: i16 = 12;

    pub const SD_LOCATION: i16 = 2;
    pub const SD_SERDE_INFO: i16 = 7;
    pub const SD_PARAMETERS: i16 = 10;

    pub const SERDE_PARAMETERS: i16 = 3;

    pub const DATABASE_NAME: i16 = 1;
    pub const DATABASE_DESCRIPTION: i16 = 2;
    pub const DATABASE_LOCATION_URI: i16 = 3;
    pub const DATABASE_PARAMETERS: i16 = 4;
}

/// Serde parameter Spark uses to record a data source table's path
pub const SERDE_PATH_KEY: &str = "path";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId {
    pub database: String,
    pub table: String,
}

impl TableId {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    id: TableId,
    raw: Struct,
}

impl TableDescriptor {
    pub fn from_struct(raw: Struct) -> Result<Self> {
        let table = raw
            .get_str(fields::TABLE_NAME)
            .ok_or_else(|| Error::Protocol("Table has no tableName".to_string()))?;
        let database = raw
            .get_str(fields::TABLE_DB_NAME)
            .ok_or_else(|| Error::Protocol(format!("Table {} has no dbName", table)))?;
        Ok(Self {
            id: TableId::new(database, table),
            raw,
        })
    }

    pub fn id(&self) -> &TableId {
        &self.id
    }

    pub fn database(&self) -> &str {
        &self.id.database
    }

    pub fn name(&self) -> &str {
        &self.id.table
    }

    fn storage_descriptor(&self) -> Option<&Struct> {
        self.raw.get_struct(fields::TABLE_SD)
    }

    fn storage_descriptor_mut(&mut self) -> Result<&mut Struct> {
        let name = self.id.to_string();
        self.raw
            .get_struct_mut(fields::TABLE_SD)
            .ok_or_else(|| Error::Protocol(format!("Table {} has no storage descriptor", name)))
    }

    /// Primary storage location (`sd.location`)
    pub fn location(&self) -> Option<&str> {
        self.storage_descriptor()?.get_str(fields::SD_LOCATION)
    }

    /// Secondary path nested in serde metadata (`sd.serdeInfo.parameters["path"]`)
    pub fn serde_path(&self) -> Option<&str> {
        self.storage_descriptor()?
            .get_struct(fields::SD_SERDE_INFO)?
            .map_get(fields::SERDE_PARAMETERS, SERDE_PATH_KEY)
    }

    pub fn storage_parameter(&self, key: &str) -> Option<&str> {
        self.storage_descriptor()?.map_get(fields::SD_PARAMETERS, key)
    }

    pub fn table_parameter(&self, key: &str) -> Option<&str> {
        self.raw.map_get(fields::TABLE_PARAMETERS, key)
    }

    pub fn parameters(&self) -> Vec<(String, String)> {
        self.raw.map_entries(fields::TABLE_PARAMETERS)
    }

    /// Size previously stamped under `key`, storage parameters first
    pub fn cached_size(&self, key: &str) -> Option<u64> {
        self.storage_parameter(key)
            .or_else(|| self.table_parameter(key))
            .and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn with_location(&self, location: &str) -> Result<Self> {
        let mut updated = self.clone();
        updated
            .storage_descriptor_mut()?
            .set(fields::SD_LOCATION, Value::string(location));
        Ok(updated)
    }

    /// Copy with the serde `path` parameter replaced; the serde info must exist
    pub fn with_serde_path(&self, path: &str) -> Result<Self> {
        let mut updated = self.clone();
        let name = self.id.to_string();
        let serde = updated
            .storage_descriptor_mut()?
            .get_struct_mut(fields::SD_SERDE_INFO)
            .ok_or_else(|| Error::Protocol(format!("Table {} has no serde info", name)))?;
        serde.map_set(fields::SERDE_PARAMETERS, SERDE_PATH_KEY, path)?;
        Ok(updated)
    }

    pub fn with_storage_parameter(&self, key: &str, value: &str) -> Result<Self> {
        let mut updated = self.clone();
        updated
            .storage_descriptor_mut()?
            .map_set(fields::SD_PARAMETERS, key, value)?;
        Ok(updated)
    }

    pub fn as_struct(&self) -> &Struct {
        &self.raw
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseInfo {
    pub name: String,
    pub description: Option<String>,
    pub location_uri: Option<String>,
    pub parameters: Vec<(String, String)>,
}

impl DatabaseInfo {
    pub fn from_struct(raw: &Struct) -> Result<Self> {
        let name = raw
            .get_str(fields::DATABASE_NAME)
            .ok_or_else(|| Error::Protocol("Database has no name".to_string()))?;
        Ok(Self {
            name: name.to_string(),
            description: raw
                .get_str(fields::DATABASE_DESCRIPTION)
                .map(str::to_string),
            location_uri: raw
                .get_str(fields::DATABASE_LOCATION_URI)
                .map(str::to_string),
            parameters: raw.map_entries(fields::DATABASE_PARAMETERS),
        })
    }

}

/// Minimal Hive table struct for tests
#[cfg(test)]
pub(crate) fn table_struct(
    database: &str,
    table: &str,
    location: &str,
    serde_path: Option<&str>,
    storage_parameters: &[(&str, &str)],
) -> Struct {
    let serde_parameters: Vec<(&str, &str)> = serde_path
        .map(|p| vec![("serialization.format", "1"), (SERDE_PATH_KEY, p)])
        .unwrap_or_else(|| vec![("serialization.format", "1")]);
    let serde = Struct::new()
        .with(1, Value::string(table))
        .with(
            2,
            Value::string("org.apache.hadoop.hive.ql.io.parquet.serde.ParquetHiveSerDe"),
        )
        .with(fields::SERDE_PARAMETERS, Value::string_map(serde_parameters));
    let sd = Struct::new()
        .with(
            1,
            Value::List {
                elem_type: crate::thrift::TType::Struct,
                items: vec![Value::Struct(
                    Struct::new()
                        .with(1, Value::string("id"))
                        .with(2, Value::string("bigint")),
                )],
            },
        )
        .with(fields::SD_LOCATION, Value::string(location))
        .with(5, Value::Bool(false))
        .with(6, Value::I32(-1))
        .with(fields::SD_SERDE_INFO, Value::Struct(serde))
        .with(
            fields::SD_PARAMETERS,
            Value::string_map(storage_parameters.iter().copied()),
        );
    Struct::new()
        .with(fields::TABLE_NAME, Value::string(table))
        .with(fields::TABLE_DB_NAME, Value::string(database))
        .with(fields::TABLE_OWNER, Value::string("hive"))
        .with(4, Value::I32(1_650_000_000))
        .with(fields::TABLE_SD, Value::Struct(sd))
        .with(
            fields::TABLE_PARAMETERS,
            Value::string_map(vec![("EXTERNAL", "TRUE")]),
        )
        .with(fields::TABLE_TYPE, Value::string("EXTERNAL_TABLE"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> TableDescriptor {
        TableDescriptor::from_struct(table_struct(
            "tpcds",
            "store_sales",
            "hdfs://dc1:9000/tpcds/store_sales",
            Some("hdfs://dc1:9000/tpcds/store_sales"),
            &[("qflock.storage_size", "4096")],
        ))
        .unwrap()
    }

    #[test]
    fn test_accessors() {
        let table = descriptor();
        assert_eq!(table.id(), &TableId::new("tpcds", "store_sales"));
        assert_eq!(table.location(), Some("hdfs://dc1:9000/tpcds/store_sales"));
        assert_eq!(table.serde_path(), Some("hdfs://dc1:9000/tpcds/store_sales"));
        assert_eq!(table.cached_size("qflock.storage_size"), Some(4096));
        assert_eq!(table.cached_size("missing"), None);
        assert_eq!(table.parameters(), vec![("EXTERNAL".to_string(), "TRUE".to_string())]);
    }

    #[test]
    fn test_with_location_touches_only_location() {
        let table = descriptor();
        let moved = table.with_location("hdfs://dc2:9000/tpcds/store_sales").unwrap();
        assert_eq!(moved.location(), Some("hdfs://dc2:9000/tpcds/store_sales"));
        assert_eq!(table.location(), Some("hdfs://dc1:9000/tpcds/store_sales"));

        let restored = moved.with_location("hdfs://dc1:9000/tpcds/store_sales").unwrap();
        assert_eq!(restored, table);
    }

    #[test]
    fn test_with_serde_path() {
        let table = descriptor();
        let moved = table.with_serde_path("hdfs://dc2:9000/tpcds/store_sales").unwrap();
        assert_eq!(moved.serde_path(), Some("hdfs://dc2:9000/tpcds/store_sales"));
        assert_eq!(moved.location(), table.location());
    }

    #[test]
    fn test_cached_size_falls_back_to_table_parameters() {
        let mut raw = table_struct("db", "t", "hdfs://dc1/db/t", None, &[]);
        raw.map_set(fields::TABLE_PARAMETERS, "totalSize", " 77 ").unwrap();
        let table = TableDescriptor::from_struct(raw).unwrap();
        assert_eq!(table.cached_size("totalSize"), Some(77));
        assert_eq!(table.serde_path(), None);
    }

    #[test]
    fn test_missing_names_rejected() {
        let raw = Struct::new().with(fields::TABLE_NAME, Value::string("t"));
        assert!(TableDescriptor::from_struct(raw).is_err());
    }

    #[test]
    fn test_database_from_struct() {
        let raw = Struct::new()
            .with(fields::DATABASE_NAME, Value::string("tpcds"))
            .with(fields::DATABASE_LOCATION_URI, Value::string("hdfs://dc1:9000/tpcds"))
            .with(
                fields::DATABASE_PARAMETERS,
                Value::string_map(vec![("owner", "qflock")]),
            );
        let db = DatabaseInfo::from_struct(&raw).unwrap();
        assert_eq!(db.name, "tpcds");
        assert_eq!(db.description, None);
        assert_eq!(db.location_uri.as_deref(), Some("hdfs://dc1:9000/tpcds"));
        assert_eq!(db.parameters, vec![("owner".to_string(), "qflock".to_string())]);
        assert!(DatabaseInfo::from_struct(&Struct::new()).is_err());
    }
}
