//! Storage backends behind a capability trait.
//!
//! The pipeline only ever talks to [`Storage`]; which implementation backs a
//! run is decided from the locator scheme at construction time (or overridden
//! with [`DataPipeline::set_storage`](crate::DataPipeline::set_storage)):
//!
//! - `s3://bucket/...` -> [`S3Storage`] for the parsed bucket
//! - `hdfs://host[:port]/...` -> [`HdfsStorage`] (port defaults to 9000)
//! - anything else -> [`LocalStorage`]

pub mod hdfs;
pub mod local;
pub mod s3;

pub use hdfs::HdfsStorage;
pub use local::LocalStorage;
pub use s3::S3Storage;

use anyhow::Result;
use std::sync::Arc;

/// Uniform file access across local and remote backends.
pub trait Storage: Send + Sync {
    /// Reads the entire object into memory.
    fn read_bytes(&self, path: &str) -> Result<Vec<u8>>;

    /// Whether `path` names an existing regular file.
    fn exists(&self, path: &str) -> Result<bool>;

    /// Object size in bytes.
    fn file_size(&self, path: &str) -> Result<u64>;

    /// Reads the object as UTF-8 text.
    fn read_text(&self, path: &str) -> Result<String>;

    /// Lists the files directly under `dir`.
    fn list_files(&self, dir: &str) -> Result<Vec<String>>;
}

/// Extra lifecycle surface for backends with a connection to manage.
pub trait DistributedStorage: Storage {
    fn connect(&self) -> Result<()>;
    fn disconnect(&self);
    fn is_connected(&self) -> bool;
}

/// Backend selection parsed from a locator prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorScheme {
    Local,
    S3 { bucket: String },
    Hdfs { namenode: String, port: u16 },
}

/// Extracts the scheme, bucket, and host information from a locator.
pub fn parse_locator_scheme(locator: &str) -> LocatorScheme {
    if let Some(rest) = locator.strip_prefix("s3://") {
        let bucket = rest.split('/').next().unwrap_or("").to_string();
        return LocatorScheme::S3 { bucket };
    }
    if let Some(rest) = locator.strip_prefix("hdfs://") {
        let authority = rest.split('/').next().unwrap_or("");
        let (namenode, port) = match authority.split_once(':') {
            Some((host, port)) => (host, port.parse().unwrap_or(9000)),
            None => (authority, 9000),
        };
        let namenode = if namenode.is_empty() {
            "localhost".to_string()
        } else {
            namenode.to_string()
        };
        return LocatorScheme::Hdfs { namenode, port };
    }
    LocatorScheme::Local
}

/// Builds the default storage for a locator based on its scheme.
pub fn storage_for_locator(locator: &str) -> Arc<dyn Storage> {
    match parse_locator_scheme(locator) {
        LocatorScheme::Local => Arc::new(LocalStorage::new()),
        LocatorScheme::S3 { bucket } => Arc::new(S3Storage::new(bucket)),
        LocatorScheme::Hdfs { namenode, port } => Arc::new(HdfsStorage::new(namenode, port)),
    }
}

#[cfg(test)]
mod scheme_test {
    use super::*;

    #[test]
    fn test_s3_scheme_parsing() {
        assert_eq!(
            parse_locator_scheme("s3://my-bucket/images/cat.jpg"),
            LocatorScheme::S3 {
                bucket: "my-bucket".to_string()
            }
        );
        assert_eq!(
            parse_locator_scheme("s3://bare-bucket"),
            LocatorScheme::S3 {
                bucket: "bare-bucket".to_string()
            }
        );
    }

    #[test]
    fn test_hdfs_scheme_parsing() {
        assert_eq!(
            parse_locator_scheme("hdfs://namenode:8020/data/part-0"),
            LocatorScheme::Hdfs {
                namenode: "namenode".to_string(),
                port: 8020
            }
        );
        assert_eq!(
            parse_locator_scheme("hdfs://namenode/data/part-0"),
            LocatorScheme::Hdfs {
                namenode: "namenode".to_string(),
                port: 9000
            }
        );
        // unparseable port falls back to the default
        assert_eq!(
            parse_locator_scheme("hdfs://namenode:not-a-port/x"),
            LocatorScheme::Hdfs {
                namenode: "namenode".to_string(),
                port: 9000
            }
        );
        assert_eq!(
            parse_locator_scheme("hdfs:///x"),
            LocatorScheme::Hdfs {
                namenode: "localhost".to_string(),
                port: 9000
            }
        );
    }

    #[test]
    fn test_everything_else_is_local() {
        assert_eq!(parse_locator_scheme("/var/data/a.bin"), LocatorScheme::Local);
        assert_eq!(parse_locator_scheme("relative/path.txt"), LocatorScheme::Local);
        assert_eq!(parse_locator_scheme(""), LocatorScheme::Local);
        // close but not a recognized prefix
        assert_eq!(parse_locator_scheme("s3:/one-slash"), LocatorScheme::Local);
    }
}
