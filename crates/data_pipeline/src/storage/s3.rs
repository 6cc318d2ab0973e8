use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use super::{DistributedStorage, Storage};

/// S3-backed storage for one bucket.
///
/// Connection lifecycle and request routing live here; the transport calls
/// themselves are integration points for an S3 client and currently return
/// empty payloads.
pub struct S3Storage {
    bucket: String,
    access_key: String,
    secret_key: String,
    region: String,
    connected: AtomicBool,
}

impl S3Storage {
    /// Anonymous access to `bucket` in the default region.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self::with_credentials(bucket, "", "", "us-east-1")
    }

    pub fn with_credentials(
        bucket: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: region.into(),
            connected: AtomicBool::new(false),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn has_credentials(&self) -> bool {
        !self.access_key.is_empty() && !self.secret_key.is_empty()
    }

    fn ensure_connected(&self) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            bail!("not connected to S3 storage (bucket: {})", self.bucket);
        }
        Ok(())
    }
}

impl Storage for S3Storage {
    fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        debug!(bucket = %self.bucket, path = %path, "reading S3 object");
        Ok(Vec::new())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.ensure_connected()?;
        debug!(bucket = %self.bucket, path = %path, "checking S3 object");
        Ok(true)
    }

    fn file_size(&self, path: &str) -> Result<u64> {
        self.ensure_connected()?;
        debug!(bucket = %self.bucket, path = %path, "sizing S3 object");
        Ok(0)
    }

    fn read_text(&self, path: &str) -> Result<String> {
        self.ensure_connected()?;
        debug!(bucket = %self.bucket, path = %path, "reading S3 text object");
        Ok(String::new())
    }

    fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        self.ensure_connected()?;
        debug!(bucket = %self.bucket, prefix = %dir, "listing S3 objects");
        Ok(Vec::new())
    }
}

impl DistributedStorage for S3Storage {
    fn connect(&self) -> Result<()> {
        info!(
            bucket = %self.bucket,
            region = %self.region,
            authenticated = self.has_credentials(),
            "connecting to S3"
        );
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) {
        info!(bucket = %self.bucket, "disconnecting from S3");
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
