use object_store::{
    aws::AmazonS3Builder, azure::MicrosoftAzureBuilder, gcp::GoogleCloudStorageBuilder,
    local::LocalFileSystem, memory::InMemory, ObjectStore,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::common::{Error, Result};

/// Object store used to list one storage backend
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UfsConfig {
    /// Amazon S3 or an S3-compatible endpoint
    S3 {
        bucket: String,
        region: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        access_key_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        secret_access_key: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },

    /// Google Cloud Storage
    Gcs {
        bucket: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        service_account_path: Option<String>,
    },

    /// Azure Blob Storage
    Azure {
        container: String,
        account: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        access_key: Option<String>,
    },

    /// Local directory standing in for the backend root, e.g. a mounted export
    Local { root_path: String },

    /// In-memory storage (for testing)
    Memory,
}

impl UfsConfig {
    /// Short description for log lines, e.g. `s3://bucket`
    pub fn describe(&self) -> String {
        match self {
            UfsConfig::S3 { bucket, .. } => format!("s3://{}", bucket),
            UfsConfig::Gcs { bucket, .. } => format!("gs://{}", bucket),
            UfsConfig::Azure {
                account, container, ..
            } => format!("az://{}/{}", account, container),
            UfsConfig::Local { root_path } => format!("file://{}", root_path),
            UfsConfig::Memory => "memory://".to_string(),
        }
    }

    /// Build the object store this config points at
    pub fn build(self) -> Result<Arc<dyn ObjectStore>> {
        let store: Arc<dyn ObjectStore> = match self {
            UfsConfig::S3 {
                bucket,
                region,
                access_key_id,
                secret_access_key,
                endpoint,
            } => {
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(bucket)
                    .with_region(region);
                if let Some(key_id) = access_key_id {
                    builder = builder.with_access_key_id(key_id);
                }
                if let Some(secret) = secret_access_key {
                    builder = builder.with_secret_access_key(secret);
                }
                if let Some(ep) = endpoint {
                    // Custom endpoints (MinIO, Ozone S3 gateway) use path-style requests
                    builder = builder
                        .with_allow_http(ep.starts_with("http://"))
                        .with_virtual_hosted_style_request(false)
                        .with_endpoint(ep);
                }
                Arc::new(builder.build().map_err(storage_error("S3"))?)
            }
            UfsConfig::Gcs {
                bucket,
                service_account_path,
            } => {
                let mut builder = GoogleCloudStorageBuilder::new().with_bucket_name(bucket);
                if let Some(sa_path) = service_account_path {
                    builder = builder.with_service_account_path(sa_path);
                }
                Arc::new(builder.build().map_err(storage_error("GCS"))?)
            }
            UfsConfig::Azure {
                container,
                account,
                access_key,
            } => {
                let mut builder = MicrosoftAzureBuilder::new()
                    .with_container_name(container)
                    .with_account(account);
                if let Some(key) = access_key {
                    builder = builder.with_access_key(key);
                }
                Arc::new(builder.build().map_err(storage_error("Azure"))?)
            }
            UfsConfig::Local { root_path } => Arc::new(
                LocalFileSystem::new_with_prefix(PathBuf::from(root_path))
                    .map_err(storage_error("local"))?,
            ),
            UfsConfig::Memory => Arc::new(InMemory::new()),
        };
        Ok(store)
    }
}

/// Credentials are never printed
impl fmt::Debug for UfsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |secret: &Option<String>| secret.as_ref().map(|_| "<redacted>");
        match self {
            UfsConfig::S3 {
                bucket,
                region,
                access_key_id,
                secret_access_key,
                endpoint,
            } => f
                .debug_struct("S3")
                .field("bucket", bucket)
                .field("region", region)
                .field("access_key_id", &redacted(access_key_id))
                .field("secret_access_key", &redacted(secret_access_key))
                .field("endpoint", endpoint)
                .finish(),
            UfsConfig::Gcs {
                bucket,
                service_account_path,
            } => f
                .debug_struct("Gcs")
                .field("bucket", bucket)
                .field("service_account_path", service_account_path)
                .finish(),
            UfsConfig::Azure {
                container,
                account,
                access_key,
            } => f
                .debug_struct("Azure")
                .field("container", container)
                .field("account", account)
                .field("access_key", &redacted(access_key))
                .finish(),
            UfsConfig::Local { root_path } => {
                f.debug_struct("Local").field("root_path", root_path).finish()
            }
            UfsConfig::Memory => write!(f, "Memory"),
        }
    }
}

fn storage_error(kind: &'static str) -> impl Fn(object_store::Error) -> Error {
    move |e| Error::Storage(format!("Failed to create {} store: {}", kind, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_credentials() {
        let s3 = UfsConfig::S3 {
            bucket: "tpcds".to_string(),
            region: "us-east-1".to_string(),
            access_key_id: Some("AKIAEXAMPLEKEY".to_string()),
            secret_access_key: Some("wJalrXUtnFEMIsecret".to_string()),
            endpoint: Some("http://minio:9000".to_string()),
        };
        let printed = format!("{:?}", s3);
        assert!(printed.contains("tpcds"));
        assert!(printed.contains("http://minio:9000"));
        assert!(!printed.contains("AKIAEXAMPLEKEY"));
        assert!(!printed.contains("wJalrXUtnFEMIsecret"));

        let azure = UfsConfig::Azure {
            container: "data".to_string(),
            account: "acct".to_string(),
            access_key: Some("azure-secret-key".to_string()),
        };
        let printed = format!("{:?}", azure);
        assert!(printed.contains("acct"));
        assert!(!printed.contains("azure-secret-key"));
    }
}
