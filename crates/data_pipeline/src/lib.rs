pub mod batch;
pub mod cache;
pub mod discover;
pub mod error;
pub mod item;
pub mod loaders;
pub mod pipeline;
pub mod pool;
pub mod storage;

pub use batch::Batch;
pub use cache::LruCache;
pub use error::PipelineError;
pub use item::DataItem;
pub use pipeline::{DataPipeline, LoaderFn, PipelineConfig, ProcessorFn};
pub use pool::{TaskHandle, WorkerPool};
pub use storage::{DistributedStorage, HdfsStorage, LocalStorage, S3Storage, Storage};
