//! Endpoint resolution for the metastore.
//!
//! Order: an explicit address, an IP literal, the co-located fast path
//! (the logical name is this host), then container network discovery.

pub mod alias;
pub mod inspect;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::common::{Error, MetastoreConfig, ResolverConfig, Result};

pub use alias::{AliasSink, HostAliasFile};
pub use inspect::{DockerCli, NetworkInspector};

pub struct EndpointResolver {
    local_host: Option<String>,
    inspector: Box<dyn NetworkInspector>,
    aliases: Option<Box<dyn AliasSink>>,
}

impl EndpointResolver {
    pub fn new(inspector: Box<dyn NetworkInspector>) -> Self {
        Self {
            local_host: None,
            inspector,
            aliases: None,
        }
    }

    pub fn from_config(cfg: &ResolverConfig) -> Self {
        let local_host = cfg
            .local_host
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok());
        let mut resolver = Self::new(Box::new(DockerCli::new(cfg.network.clone())));
        resolver.local_host = local_host;
        if let Some(path) = &cfg.alias_file {
            resolver.aliases = Some(Box::new(HostAliasFile::new(path, cfg.export_env)));
        }
        resolver
    }

    pub fn with_local_host(mut self, host: impl Into<String>) -> Self {
        self.local_host = Some(host.into());
        self
    }

    pub fn with_aliases(mut self, sink: Box<dyn AliasSink>) -> Self {
        self.aliases = Some(sink);
        self
    }

    /// Address of the host known as `name`
    pub async fn resolve(&self, name: &str) -> Result<IpAddr> {
        if let Ok(ip) = name.parse::<IpAddr>() {
            return Ok(ip);
        }
        if self.local_host.as_deref() == Some(name) {
            tracing::info!("{} is this host, using loopback", name);
            return Ok(IpAddr::V4(Ipv4Addr::LOCALHOST));
        }

        let addr = self
            .inspector
            .container_address(name)
            .await?
            .ok_or_else(|| Error::EndpointNotFound(format!("No container named {}", name)))?;
        tracing::info!("Resolved {} to {}", name, addr);

        if let Some(sink) = &self.aliases {
            if let Err(e) = sink.record(name, addr) {
                tracing::warn!("Failed to record host alias for {}: {}", name, e);
            }
        }
        Ok(addr)
    }

    /// Socket address of the metastore described by `cfg`
    pub async fn resolve_metastore(&self, cfg: &MetastoreConfig) -> Result<SocketAddr> {
        if let Some(address) = &cfg.address {
            return resolve_explicit(address, cfg.port).await;
        }
        let ip = self.resolve(&cfg.host).await?;
        Ok(SocketAddr::new(ip, cfg.port))
    }
}

/// `ip`, `ip:port` or `host:port`, taken as given
async fn resolve_explicit(address: &str, default_port: u16) -> Result<SocketAddr> {
    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }
    let target = if address.contains(':') {
        address.to_string()
    } else {
        format!("{}:{}", address, default_port)
    };
    let found = tokio::net::lookup_host(target.as_str())
        .await
        .map_err(|e| Error::EndpointNotFound(format!("{}: {}", target, e)))?
        .next();
    found.ok_or_else(|| Error::EndpointNotFound(format!("{} has no addresses", target)))
}
