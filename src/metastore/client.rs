use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{sleep, Instant};

use crate::{
    common::{Error, MetastoreConfig, Result},
    metastore::{
        catalog::Catalog,
        descriptor::{DatabaseInfo, TableDescriptor},
    },
    thrift::{Struct, ThriftConnection, TransportKind, Value},
};

/// How long `connect` keeps waiting for the metastore to come up
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub interval: Duration,
    /// `None` waits forever
    pub timeout: Option<Duration>,
}

impl RetryPolicy {
    pub fn from_config(cfg: &MetastoreConfig) -> Self {
        Self {
            interval: cfg.retry_interval(),
            timeout: cfg.connect_timeout(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: None,
        }
    }
}

/// Hive metastore client over the Thrift binary protocol
pub struct MetastoreClient {
    addr: SocketAddr,
    conn: Option<ThriftConnection<TcpStream>>,
}

impl MetastoreClient {
    /// Connect to `addr`, retrying until the metastore accepts or the
    /// policy's timeout passes.
    pub async fn connect(
        addr: SocketAddr,
        transport: TransportKind,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let started = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match TcpStream::connect(addr).await {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    tracing::info!(
                        "Connected to metastore at {} after {} attempt(s)",
                        addr,
                        attempts
                    );
                    return Ok(Self {
                        addr,
                        conn: Some(ThriftConnection::new(stream, transport)),
                    });
                }
                Err(e) => {
                    if let Some(timeout) = retry.timeout {
                        if started.elapsed() + retry.interval > timeout {
                            return Err(Error::CatalogUnavailable(format!(
                                "Metastore at {} not reachable after {} attempts: {}",
                                addr, attempts, e
                            )));
                        }
                    }
                    tracing::warn!(
                        "Metastore at {} is not ready ({}). Retry in {:?}",
                        addr,
                        e,
                        retry.interval
                    );
                    sleep(retry.interval).await;
                }
            }
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Invoke `method` and unpack its result struct.
    ///
    /// `exceptions` lists the declared exception fields of the method. A
    /// transport or framing failure drops the connection; the caller has to
    /// reconnect.
    async fn invoke(
        &mut self,
        method: &str,
        args: Struct,
        exceptions: &[(i16, &str)],
    ) -> Result<Option<Value>> {
        let conn = self.conn.as_mut().ok_or_else(|| {
            Error::CatalogUnavailable(format!("{}: connection is closed", method))
        })?;
        let mut result = match conn.call(method, args).await {
            Ok(result) => result,
            Err(e) => {
                if matches!(e, Error::CatalogUnavailable(_) | Error::Protocol(_)) {
                    self.conn = None;
                }
                return Err(e);
            }
        };

        for (id, kind) in exceptions {
            if let Some(ex) = result.get_struct(*id) {
                let message = ex.get_str(1).unwrap_or_default().to_string();
                return Err(match *kind {
                    "NoSuchObjectException" => Error::NotFound(message),
                    _ => Error::Metastore {
                        kind: kind.to_string(),
                        message,
                    },
                });
            }
        }
        Ok(result.remove(0))
    }

    async fn invoke_value(
        &mut self,
        method: &str,
        args: Struct,
        exceptions: &[(i16, &str)],
    ) -> Result<Value> {
        self.invoke(method, args, exceptions)
            .await?
            .ok_or_else(|| Error::Protocol(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl Catalog for MetastoreClient {
    async fn list_catalogs(&mut self) -> Result<Vec<String>> {
        let response = self
            .invoke_value("get_catalogs", Struct::new(), &[(1, "MetaException")])
            .await?;
        match response.as_struct().and_then(|r| r.get(1)) {
            Some(names) => names.to_string_vec(),
            None => Ok(Vec::new()),
        }
    }

    async fn list_databases(&mut self) -> Result<Vec<String>> {
        self.invoke_value("get_all_databases", Struct::new(), &[(1, "MetaException")])
            .await?
            .to_string_vec()
    }

    async fn get_database(&mut self, name: &str) -> Result<DatabaseInfo> {
        let args = Struct::new().with(1, Value::string(name));
        let value = self
            .invoke_value(
                "get_database",
                args,
                &[(1, "NoSuchObjectException"), (2, "MetaException")],
            )
            .await?;
        let raw = value
            .as_struct()
            .ok_or_else(|| Error::Protocol("get_database returned a non-struct".to_string()))?;
        DatabaseInfo::from_struct(raw)
    }

    async fn list_tables(&mut self, database: &str) -> Result<Vec<String>> {
        let args = Struct::new().with(1, Value::string(database));
        self.invoke_value("get_all_tables", args, &[(1, "MetaException")])
            .await?
            .to_string_vec()
    }

    async fn get_table(&mut self, database: &str, name: &str) -> Result<TableDescriptor> {
        let args = Struct::new()
            .with(1, Value::string(database))
            .with(2, Value::string(name));
        let value = self
            .invoke_value(
                "get_table",
                args,
                &[(1, "MetaException"), (2, "NoSuchObjectException")],
            )
            .await?;
        match value {
            Value::Struct(raw) => TableDescriptor::from_struct(raw),
            other => Err(Error::Protocol(format!(
                "get_table returned {:?}",
                other.ttype()
            ))),
        }
    }

    async fn alter_table(
        &mut self,
        database: &str,
        name: &str,
        descriptor: &TableDescriptor,
    ) -> Result<()> {
        let args = Struct::new()
            .with(1, Value::string(database))
            .with(2, Value::string(name))
            .with(3, Value::Struct(descriptor.as_struct().clone()));
        self.invoke(
            "alter_table",
            args,
            &[(1, "InvalidOperationException"), (2, "MetaException")],
        )
        .await?;
        tracing::debug!("alter_table {}.{} applied", database, name);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = conn.shutdown().await {
                tracing::debug!("Error shutting down metastore connection: {}", e);
            }
            tracing::info!("Closed metastore connection to {}", self.addr);
        }
        Ok(())
    }
}
