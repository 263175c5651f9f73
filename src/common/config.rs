use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::common::backend::BackendPair;
use crate::common::error::{Error, Result};
use crate::thrift::transport::TransportKind;
use crate::ufs::config::UfsConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct MetastoreConfig {
    /// Logical host name of the metastore (container name or DNS name)
    #[serde(default = "default_metastore_host")]
    pub host: String,
    #[serde(default = "default_metastore_port")]
    pub port: u16,
    /// Skip resolution and connect to this address directly
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default = "default_connect_retry_interval_ms")]
    pub connect_retry_interval_ms: u64,
    /// 0 waits forever
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl MetastoreConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.connect_retry_interval_ms)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        match self.connect_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for MetastoreConfig {
    fn default() -> Self {
        Self {
            host: default_metastore_host(),
            port: default_metastore_port(),
            address: None,
            transport: TransportKind::default(),
            connect_retry_interval_ms: default_connect_retry_interval_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResolverConfig {
    /// Container network inspected to find the metastore container
    #[serde(default = "default_network")]
    pub network: String,
    /// Host name of this process; defaults to $HOSTNAME
    #[serde(default)]
    pub local_host: Option<String>,
    /// Where to write `name address` aliases for co-located processes
    #[serde(default)]
    pub alias_file: Option<String>,
    /// Point HOSTALIASES at the alias file for child processes
    #[serde(default)]
    pub export_env: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            local_host: None,
            alias_file: None,
            export_env: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InventoryConfig {
    /// Storage descriptor parameter holding a previously computed size
    #[serde(default = "default_size_key")]
    pub size_key: String,
    /// Databases to inventory; empty means every database
    #[serde(default)]
    pub databases: Vec<String>,
    /// List the backend when the size key is missing
    #[serde(default = "default_stat_fallback")]
    pub stat_fallback: bool,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            size_key: default_size_key(),
            databases: Vec::new(),
            stat_fallback: default_stat_fallback(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub name: String,
    /// URI prefix of table locations on this backend, e.g. hdfs://dc1:9000
    pub prefix: String,
    /// Object store used to list table directories on this backend
    #[serde(default)]
    pub ufs: Option<UfsConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RebalanceConfig {
    #[serde(default)]
    pub metastore: MetastoreConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

impl RebalanceConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: RebalanceConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.backends.len() != 2 {
            return Err(Error::Config(format!(
                "Exactly two [[backends]] are required, got {}",
                self.backends.len()
            )));
        }
        BackendPair::from_config(&self.backends)?;
        if self.metastore.connect_retry_interval_ms == 0 {
            return Err(Error::Config(
                "connect_retry_interval_ms must be positive".to_string(),
            ));
        }
        if self.inventory.size_key.is_empty() {
            return Err(Error::Config("size_key cannot be empty".to_string()));
        }
        Ok(())
    }
}

fn default_metastore_host() -> String {
    "qflock-storage-dc1".to_string()
}

fn default_metastore_port() -> u16 {
    9083
}

fn default_connect_retry_interval_ms() -> u64 {
    1000
}

fn default_connect_timeout_secs() -> u64 {
    300
}

fn default_network() -> String {
    "qflock-net".to_string()
}

fn default_size_key() -> String {
    "qflock.storage_size".to_string()
}

fn default_stat_fallback() -> bool {
    true
}
