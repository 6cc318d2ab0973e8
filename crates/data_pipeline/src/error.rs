//! Error kinds surfaced by the pipeline core.
//!
//! Per-item failures (`LoaderFailure`, `ProcessorFailure`) are recorded
//! against the item that hit them and logged; the rest of the pipeline keeps
//! going and the item simply never appears in a batch. `InvalidConfig` and
//! `PoolStopped` surface synchronously from the offending call.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A load task ran before any loader function was configured.
    #[error("no loader function configured")]
    LoaderUnset,

    /// The user-supplied loader reported an error for one locator.
    #[error("loader failed for `{locator}`: {message}")]
    LoaderFailure { locator: String, message: String },

    /// The user-supplied processor reported an error for one item.
    #[error("processor failed: {message}")]
    ProcessorFailure { message: String },

    /// A task was submitted to a worker pool that has been shut down.
    #[error("worker pool has been shut down")]
    PoolStopped,

    /// A worker task panicked; the panic was captured into its handle.
    #[error("worker task panicked: {0}")]
    TaskPanicked(String),

    /// The worker executing a task went away before producing a result.
    #[error("worker task result was dropped before completion")]
    TaskLost,

    /// Rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub(crate) fn loader_failure(locator: &str, source: anyhow::Error) -> Self {
        Self::LoaderFailure {
            locator: locator.to_string(),
            message: format!("{source:#}"),
        }
    }

    pub(crate) fn processor_failure(source: anyhow::Error) -> Self {
        Self::ProcessorFailure {
            message: format!("{source:#}"),
        }
    }
}
