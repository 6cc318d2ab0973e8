pub mod config;
pub mod engine;

pub use config::{LoaderFn, PipelineConfig, PipelineConfigBuilder, ProcessorFn};
pub use engine::DataPipeline;
