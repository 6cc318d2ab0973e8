use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use super::{DistributedStorage, Storage};

/// HDFS-backed storage addressed by namenode host and port.
///
/// Like [`S3Storage`](super::S3Storage), the connection lifecycle is real and
/// the transport calls are integration points for an HDFS client.
pub struct HdfsStorage {
    namenode: String,
    port: u16,
    connected: AtomicBool,
}

impl HdfsStorage {
    pub fn new(namenode: impl Into<String>, port: u16) -> Self {
        Self {
            namenode: namenode.into(),
            port,
            connected: AtomicBool::new(false),
        }
    }

    pub fn namenode(&self) -> &str {
        &self.namenode
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn ensure_connected(&self) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            bail!(
                "not connected to HDFS (namenode: {}:{})",
                self.namenode,
                self.port
            );
        }
        Ok(())
    }
}

impl Storage for HdfsStorage {
    fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        debug!(namenode = %self.namenode, path = %path, "reading HDFS file");
        Ok(Vec::new())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.ensure_connected()?;
        debug!(namenode = %self.namenode, path = %path, "checking HDFS file");
        Ok(true)
    }

    fn file_size(&self, path: &str) -> Result<u64> {
        self.ensure_connected()?;
        debug!(namenode = %self.namenode, path = %path, "sizing HDFS file");
        Ok(0)
    }

    fn read_text(&self, path: &str) -> Result<String> {
        self.ensure_connected()?;
        debug!(namenode = %self.namenode, path = %path, "reading HDFS text file");
        Ok(String::new())
    }

    fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        self.ensure_connected()?;
        debug!(namenode = %self.namenode, dir = %dir, "listing HDFS directory");
        Ok(Vec::new())
    }
}

impl DistributedStorage for HdfsStorage {
    fn connect(&self) -> Result<()> {
        info!(namenode = %self.namenode, port = self.port, "connecting to HDFS");
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disconnect(&self) {
        info!(namenode = %self.namenode, "disconnecting from HDFS");
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
