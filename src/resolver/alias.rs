//! Host alias side channel for co-located processes.
//!
//! Resolved names are written as `name address` lines to an alias file;
//! optionally `HOSTALIASES` is pointed at it for child processes.

use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::common::Result;

pub const HOST_ALIASES_ENV: &str = "HOSTALIASES";

pub trait AliasSink: Send + Sync {
    fn record(&self, name: &str, addr: IpAddr) -> Result<()>;
}

pub struct HostAliasFile {
    path: PathBuf,
    export_env: bool,
}

impl HostAliasFile {
    pub fn new(path: impl Into<PathBuf>, export_env: bool) -> Self {
        Self {
            path: path.into(),
            export_env,
        }
    }
}

impl AliasSink for HostAliasFile {
    /// Add or replace the line for `name`, keeping other aliases
    fn record(&self, name: &str, addr: IpAddr) -> Result<()> {
        let existing = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let mut lines: Vec<String> = existing
            .lines()
            .filter(|line| line.split_whitespace().next() != Some(name))
            .map(str::to_string)
            .collect();
        lines.push(format!("{} {}", name, addr));
        fs::write(&self.path, lines.join("\n") + "\n")?;
        tracing::debug!("Recorded alias {} {} in {:?}", name, addr, self.path);

        if self.export_env {
            std::env::set_var(HOST_ALIASES_ENV, &self.path);
        }
        Ok(())
    }
}
