//! Configuration for pipeline behaviour.
//!
//! Example:
//! ```ignore
//! let config = PipelineConfig::builder()
//!     .locators(paths)
//!     .batch_size(32)
//!     .loader_threads(4)
//!     .processor_threads(4)
//!     .buffer_size(64)
//!     .cache_capacity(256)
//!     .loader_fn(loaders::text_loader(storage))
//!     .build();
//! let pipeline = DataPipeline::new(config)?;
//! ```
//!
//! # Performance considerations:
//! - `loader_threads`/`processor_threads`: more threads raise throughput
//!   until storage or CPU saturates; each held item costs memory.
//! - `buffer_size`: deeper queues smooth latency spikes at the cost of
//!   memory; a size of 1 gives the tightest backpressure.
//! - `cache_capacity`: trades memory for repeated-pass speed; 0 disables
//!   caching entirely.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use crate::item::DataItem;
use crate::storage::Storage;

/// Turns a locator into an item. Runs on loader threads, so implementations
/// must be thread-safe.
pub type LoaderFn = Arc<dyn Fn(&str) -> Result<DataItem> + Send + Sync>;

/// Rewrites an item between loading and batch assembly.
pub type ProcessorFn = Arc<dyn Fn(DataItem) -> Result<DataItem> + Send + Sync>;

/// Options recognized by [`DataPipeline`](crate::DataPipeline).
#[derive(Clone)]
pub struct PipelineConfig {
    /// Ordered source locators to ingest.
    pub locators: Vec<String>,
    /// Items per batch handed to the consumer.
    pub batch_size: usize,
    /// Worker threads running load tasks.
    pub loader_threads: usize,
    /// Persistent preprocess workers.
    pub processor_threads: usize,
    /// Capacity of each of the loaded/processed queues.
    pub buffer_size: usize,
    /// Item cache capacity; 0 disables the cache.
    pub cache_capacity: usize,
    /// How often blocked workers re-check the stop flag.
    /// Not an error timeout, just a polling interval.
    pub worker_timeout: Duration,
    /// Required before load tasks run; tasks without it fail individually.
    pub loader_fn: Option<LoaderFn>,
    /// Optional; items pass through unchanged when absent.
    pub processor_fn: Option<ProcessorFn>,
    /// Storage handle; derived from the first locator's scheme when absent.
    pub storage: Option<Arc<dyn Storage>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            locators: Vec::new(),
            batch_size: 1,
            loader_threads: 4,
            processor_threads: 4,
            buffer_size: 100,
            cache_capacity: 0,
            worker_timeout: Duration::from_millis(100),
            loader_fn: None,
            processor_fn: None,
            storage: None,
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

/// Builder for [`PipelineConfig`] with method chaining.
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn locators<I, S>(mut self, locators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.locators = locators.into_iter().map(Into::into).collect();
        self
    }

    /// Set the batch size (must be > 0).
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn loader_threads(mut self, threads: usize) -> Self {
        self.config.loader_threads = threads;
        self
    }

    pub fn processor_threads(mut self, threads: usize) -> Self {
        self.config.processor_threads = threads;
        self
    }

    /// Set the queue bound (must be > 0).
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size;
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Set the stop-flag polling interval.
    ///
    /// - Too low: more responsive shutdown, higher idle CPU.
    /// - Too high: slower shutdown response.
    pub fn worker_timeout(mut self, worker_timeout: Duration) -> Self {
        self.config.worker_timeout = worker_timeout;
        self
    }

    pub fn loader_fn<F>(mut self, loader: F) -> Self
    where
        F: Fn(&str) -> Result<DataItem> + Send + Sync + 'static,
    {
        self.config.loader_fn = Some(Arc::new(loader));
        self
    }

    pub fn processor_fn<F>(mut self, processor: F) -> Self
    where
        F: Fn(DataItem) -> Result<DataItem> + Send + Sync + 'static,
    {
        self.config.processor_fn = Some(Arc::new(processor));
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.config.storage = Some(storage);
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}
