//! The pipeline engine.
//!
//! Orchestrates two stages over two bounded queues:
//!
//! ```text
//! locators --{load tasks}--> loaded queue --{process workers}--> processed queue --> next_batch()
//! ```
//!
//! One load task is submitted per locator; `processor_threads` long-running
//! process workers drain the loaded queue. Both queues are bounded by
//! `buffer_size`, so a slow consumer backpressures the processors and a slow
//! processor backpressures the loaders. Every blocking push or pop re-checks
//! the stop flag on the `worker_timeout` interval, which is what lets
//! `stop`, `reset`, and drop cancel workers that are parked on a full or
//! empty queue.
//!
//! # Ordering
//!
//! Items keep FIFO order within each queue, but locators complete loading in
//! whatever order the worker pool and storage latency dictate. The engine
//! guarantees at-most-once delivery of every successfully processed item
//! between resets, not a total order.
//!
//! # Per-item failures
//!
//! A loader or processor failure costs exactly that item: the error is
//! logged, accounted, and the pipeline moves on. `next_batch` only ever
//! yields successfully processed items.

use anyhow::{Context, Result};
use crossbeam_channel::{
    bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender, TryRecvError,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::config::{LoaderFn, PipelineConfig, ProcessorFn};
use crate::batch::Batch;
use crate::cache::LruCache;
use crate::error::PipelineError;
use crate::item::DataItem;
use crate::pool::{TaskHandle, WorkerPool};
use crate::storage::{storage_for_locator, Storage};

/// Items are cached behind `Arc`: the cache hands out cheap shared handles,
/// and the engine deep-copies the payload whenever the pipeline needs an
/// owned item (processors consume items by value).
type ItemCache = LruCache<String, Arc<DataItem>>;

/// State shared between the engine handle and its worker tasks.
struct Shared {
    locators: Vec<String>,
    worker_timeout: Duration,
    /// Stop flag; every blocking wait observes it.
    done: AtomicBool,
    /// Count of load tasks that have completed their locator.
    current_index: AtomicUsize,
    /// Locators not yet retired. An item retires when it reaches the
    /// processed queue or is dropped by a failure or cancellation; once this
    /// hits zero, nothing more will ever arrive downstream.
    outstanding: AtomicUsize,
    loaded_tx: Sender<DataItem>,
    loaded_rx: Receiver<DataItem>,
    processed_tx: Sender<DataItem>,
    processed_rx: Receiver<DataItem>,
    cache: Mutex<Option<Arc<ItemCache>>>,
    storage: RwLock<Arc<dyn Storage>>,
    loader_fn: RwLock<Option<LoaderFn>>,
    processor_fn: RwLock<Option<ProcessorFn>>,
}

impl Shared {
    fn retire_item(&self) {
        self.outstanding.fetch_sub(1, Ordering::SeqCst);
    }

    /// Pushes with backpressure, bailing out when the stop flag rises.
    /// Returns false if the item was dropped instead of enqueued.
    fn push(&self, tx: &Sender<DataItem>, item: DataItem) -> bool {
        let mut item = item;
        loop {
            if self.done.load(Ordering::SeqCst) {
                return false;
            }
            match tx.send_timeout(item, self.worker_timeout) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(returned)) => item = returned,
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }

    /// One load task: cache probe, load on miss, push to the loaded queue.
    fn run_load_task(&self, index: usize) {
        if self.done.load(Ordering::SeqCst) {
            self.retire_item();
            return;
        }

        let locator = self.locators[index].as_str();
        let loader = self.loader_fn.read().clone();
        let Some(loader) = loader else {
            warn!(locator = %locator, error = %PipelineError::LoaderUnset, "dropping item");
            self.retire_item();
            return;
        };

        let item = match self.load_item(locator, &loader) {
            Ok(item) => item,
            Err(error) => {
                warn!(locator = %locator, error = %error, "dropping item");
                self.retire_item();
                return;
            }
        };

        self.current_index.fetch_add(1, Ordering::SeqCst);
        if !self.push(&self.loaded_tx, item) {
            trace!(locator = %locator, "pipeline stopping; dropping loaded item");
            self.retire_item();
        }
    }

    fn load_item(&self, locator: &str, loader: &LoaderFn) -> Result<DataItem, PipelineError> {
        let cache = self.cache.lock().clone();
        let Some(cache) = cache else {
            return loader(locator).map_err(|source| PipelineError::loader_failure(locator, source));
        };

        let key = locator.to_string();
        if let Some(shared_item) = cache.get(&key) {
            trace!(locator = %locator, "cache hit");
            return Ok(shared_item.as_ref().clone());
        }

        let item =
            loader(locator).map_err(|source| PipelineError::loader_failure(locator, source))?;
        cache.put(key, Arc::new(item.clone()));
        Ok(item)
    }

    /// One persistent process worker: drain the loaded queue until the stop
    /// flag rises and the queue is empty.
    fn run_process_loop(&self) {
        loop {
            if self.done.load(Ordering::SeqCst) && self.loaded_rx.is_empty() {
                break;
            }
            let item = match self.loaded_rx.recv_timeout(self.worker_timeout) {
                Ok(item) => item,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            // Stopping: drain without paying for preprocessing.
            if self.done.load(Ordering::SeqCst) {
                self.retire_item();
                continue;
            }

            let processor = self.processor_fn.read().clone();
            let item = match processor {
                Some(processor) => match processor(item) {
                    Ok(item) => item,
                    Err(source) => {
                        let error = PipelineError::processor_failure(source);
                        warn!(error = %error, "dropping item");
                        self.retire_item();
                        continue;
                    }
                },
                None => item,
            };

            if !self.push(&self.processed_tx, item) {
                trace!("pipeline stopping; dropping processed item");
            }
            self.retire_item();
        }
    }
}

/// Pipelined loader producing batches of preprocessed items.
///
/// Loading starts at construction. The consumer pulls with
/// [`next_batch`](Self::next_batch); `stop`/`reset` and drop cancel
/// cooperatively through the shared stop flag.
pub struct DataPipeline {
    shared: Arc<Shared>,
    batch_size: usize,
    processor_threads: usize,
    loader_pool: WorkerPool,
    processor_pool: WorkerPool,
    inflight: Mutex<Vec<TaskHandle<()>>>,
}

impl DataPipeline {
    /// Validates the configuration, sets up storage, cache, and worker
    /// pools, and starts loading.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(
                PipelineError::InvalidConfig("batch_size must be greater than 0".to_string())
                    .into(),
            );
        }
        if config.buffer_size == 0 {
            return Err(
                PipelineError::InvalidConfig("buffer_size must be greater than 0".to_string())
                    .into(),
            );
        }
        if config.loader_threads == 0 || config.processor_threads == 0 {
            return Err(PipelineError::InvalidConfig(
                "loader_threads and processor_threads must be greater than 0".to_string(),
            )
            .into());
        }

        let storage = match config.storage {
            Some(storage) => storage,
            None => storage_for_locator(config.locators.first().map(String::as_str).unwrap_or("")),
        };
        let cache = if config.cache_capacity > 0 {
            Some(Arc::new(ItemCache::new(config.cache_capacity)))
        } else {
            None
        };

        let (loaded_tx, loaded_rx) = bounded(config.buffer_size);
        let (processed_tx, processed_rx) = bounded(config.buffer_size);

        let shared = Arc::new(Shared {
            locators: config.locators,
            worker_timeout: config.worker_timeout,
            done: AtomicBool::new(false),
            current_index: AtomicUsize::new(0),
            outstanding: AtomicUsize::new(0),
            loaded_tx,
            loaded_rx,
            processed_tx,
            processed_rx,
            cache: Mutex::new(cache),
            storage: RwLock::new(storage),
            loader_fn: RwLock::new(config.loader_fn),
            processor_fn: RwLock::new(config.processor_fn),
        });

        let loader_pool =
            WorkerPool::new(config.loader_threads).context("failed to start loader pool")?;
        let processor_pool =
            WorkerPool::new(config.processor_threads).context("failed to start processor pool")?;

        let pipeline = Self {
            shared,
            batch_size: config.batch_size,
            processor_threads: config.processor_threads,
            loader_pool,
            processor_pool,
            inflight: Mutex::new(Vec::new()),
        };
        pipeline.start()?;
        Ok(pipeline)
    }

    /// Submits one load task per locator and the persistent process workers.
    fn start(&self) -> Result<()> {
        let mut inflight = self.inflight.lock();
        self.shared
            .outstanding
            .store(self.shared.locators.len(), Ordering::SeqCst);

        for index in 0..self.shared.locators.len() {
            let shared = Arc::clone(&self.shared);
            inflight.push(self.loader_pool.submit(move || shared.run_load_task(index))?);
        }
        for _ in 0..self.processor_threads {
            let shared = Arc::clone(&self.shared);
            inflight.push(self.processor_pool.submit(move || shared.run_process_loop())?);
        }
        debug!(
            locators = self.shared.locators.len(),
            processors = self.processor_threads,
            "pipeline started"
        );
        Ok(())
    }

    /// Assembles the next batch, blocking while items are still on the way.
    ///
    /// Returns up to `batch_size` items; a shorter batch means the pipeline
    /// drained mid-assembly. Returns `None` once every locator has been
    /// delivered or dropped (or the pipeline was stopped) and the processed
    /// queue is empty.
    pub fn next_batch(&self) -> Option<Batch> {
        let mut items = Vec::with_capacity(self.batch_size);
        while items.len() < self.batch_size {
            match self.next_item() {
                Some(item) => items.push(item),
                None => break,
            }
        }
        if items.is_empty() {
            None
        } else {
            Some(Batch::new(items))
        }
    }

    fn next_item(&self) -> Option<DataItem> {
        loop {
            // Read the flags before probing the queue: once `outstanding`
            // hits zero every surviving item is already enqueued, so an
            // empty probe after that is conclusive.
            let finished = self.shared.done.load(Ordering::SeqCst)
                || self.shared.outstanding.load(Ordering::SeqCst) == 0;
            match self.shared.processed_rx.try_recv() {
                Ok(item) => return Some(item),
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => {
                    if finished {
                        return None;
                    }
                }
            }
            match self
                .shared
                .processed_rx
                .recv_timeout(self.shared.worker_timeout)
            {
                Ok(item) => return Some(item),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Signals all workers to stop. Idempotent; already-processed items can
    /// still be drained with [`next_batch`](Self::next_batch).
    pub fn stop(&self) {
        if !self.shared.done.swap(true, Ordering::SeqCst) {
            debug!(
                loaded = self.shared.current_index.load(Ordering::SeqCst),
                "pipeline stopping"
            );
        }
    }

    /// Stops the pipeline, waits for every in-flight task to quiesce, drops
    /// whatever sat in the queues, and starts a fresh pass over the same
    /// locators. Cache contents survive.
    pub fn reset(&self) -> Result<()> {
        self.stop();
        self.quiesce();
        self.drain_queues();
        self.shared.current_index.store(0, Ordering::SeqCst);
        self.shared.done.store(false, Ordering::SeqCst);
        self.start()
    }

    /// Waits for every submitted task to finish. Pre-reset workers must be
    /// gone before the flag flips back, or they would race the new pass.
    fn quiesce(&self) {
        let handles: Vec<_> = {
            let mut inflight = self.inflight.lock();
            inflight.drain(..).collect()
        };
        for handle in handles {
            if let Err(error) = handle.wait() {
                debug!(error = %error, "pipeline task ended abnormally");
            }
        }
    }

    fn drain_queues(&self) {
        let dropped =
            self.shared.loaded_rx.try_iter().count() + self.shared.processed_rx.try_iter().count();
        if dropped > 0 {
            debug!(dropped, "discarded undelivered items");
        }
    }

    /// Number of configured locators.
    pub fn size(&self) -> usize {
        self.shared.locators.len()
    }

    /// Current (loaded, processed) queue depths. Observational.
    pub fn queue_depths(&self) -> (usize, usize) {
        (self.shared.loaded_rx.len(), self.shared.processed_rx.len())
    }

    /// Replaces the loader for subsequent load tasks.
    pub fn set_loader_fn<F>(&self, loader: F)
    where
        F: Fn(&str) -> Result<DataItem> + Send + Sync + 'static,
    {
        *self.shared.loader_fn.write() = Some(Arc::new(loader));
    }

    /// Replaces the processor for subsequent items.
    pub fn set_processor_fn<F>(&self, processor: F)
    where
        F: Fn(DataItem) -> Result<DataItem> + Send + Sync + 'static,
    {
        *self.shared.processor_fn.write() = Some(Arc::new(processor));
    }

    /// Swaps the storage handle. Quiesce the pipeline first; running load
    /// tasks are not re-pointed.
    pub fn set_storage(&self, storage: Arc<dyn Storage>) {
        *self.shared.storage.write() = storage;
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        Arc::clone(&self.shared.storage.read())
    }

    /// Resizes the item cache; 0 disables it, a nonzero capacity creates or
    /// shrinks it (shrinking evicts least-recently-used entries).
    pub fn set_cache_capacity(&self, capacity: usize) {
        let mut slot = self.shared.cache.lock();
        if capacity == 0 {
            *slot = None;
        } else if let Some(cache) = slot.as_ref() {
            cache.set_capacity(capacity);
        } else {
            *slot = Some(Arc::new(ItemCache::new(capacity)));
        }
    }

    /// Entries currently cached; 0 when the cache is disabled.
    pub fn cache_size(&self) -> usize {
        self.shared.cache.lock().as_ref().map_or(0, |c| c.len())
    }

    /// Empties the item cache. No-op when the cache is disabled.
    pub fn clear_cache(&self) {
        if let Some(cache) = self.shared.cache.lock().as_ref() {
            cache.clear();
        }
    }
}

impl Drop for DataPipeline {
    fn drop(&mut self) {
        self.stop();
        self.quiesce();
        self.loader_pool.shutdown();
        self.processor_pool.shutdown();
    }
}
