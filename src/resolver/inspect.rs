//! Container network discovery through `docker network inspect`.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::IpAddr;
use tokio::process::Command;

use crate::common::{Error, Result};

/// Looks up the address of a named container on a container network
#[async_trait]
pub trait NetworkInspector: Send + Sync {
    async fn container_address(&self, name: &str) -> Result<Option<IpAddr>>;
}

#[derive(Debug, Deserialize)]
struct NetworkInspect {
    #[serde(rename = "Containers", default)]
    containers: Option<HashMap<String, ContainerEndpoint>>,
}

#[derive(Debug, Deserialize)]
struct ContainerEndpoint {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "IPv4Address", default)]
    ipv4_address: String,
}

/// Find `name` in the JSON printed by `docker network inspect`.
///
/// Addresses are reported in CIDR form (`172.18.0.2/16`); the mask is dropped.
pub fn parse_network_inspect(output: &[u8], name: &str) -> Result<Option<IpAddr>> {
    let networks: Vec<NetworkInspect> = serde_json::from_slice(output)
        .map_err(|e| Error::EndpointNotFound(format!("Unreadable network description: {}", e)))?;

    let found = networks
        .iter()
        .filter_map(|network| network.containers.as_ref())
        .flat_map(|containers| containers.values())
        .find(|container| container.name == name);
    let container = match found {
        Some(container) => container,
        None => return Ok(None),
    };

    let addr = container
        .ipv4_address
        .split('/')
        .next()
        .unwrap_or_default();
    addr.parse::<IpAddr>().map(Some).map_err(|_| {
        Error::EndpointNotFound(format!(
            "Container {} has no usable address ({:?})",
            name, container.ipv4_address
        ))
    })
}

/// Runs the docker CLI against one network
pub struct DockerCli {
    program: String,
    network: String,
}

impl DockerCli {
    pub fn new(network: impl Into<String>) -> Self {
        Self {
            program: "docker".to_string(),
            network: network.into(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl NetworkInspector for DockerCli {
    async fn container_address(&self, name: &str) -> Result<Option<IpAddr>> {
        let output = Command::new(&self.program)
            .args(["network", "inspect", &self.network])
            .output()
            .await
            .map_err(|e| {
                Error::EndpointNotFound(format!("Failed to run {}: {}", self.program, e))
            })?;
        if !output.status.success() {
            return Err(Error::EndpointNotFound(format!(
                "{} network inspect {} failed: {}",
                self.program,
                self.network,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        tracing::debug!(
            "{} network inspect {}: {} bytes",
            self.program,
            self.network,
            output.stdout.len()
        );
        parse_network_inspect(&output.stdout, name)
    }
}
