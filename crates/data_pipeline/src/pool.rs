//! Fixed-size worker pool with future-style result handles.
//!
//! Workers pull boxed jobs from a single shared FIFO channel. Submitting a
//! task returns a [`TaskHandle`] that resolves exactly once with the task's
//! return value; panics inside a task are caught and surface through the
//! handle instead of killing the worker.
//!
//! Shutdown is drain-then-exit: closing the job channel lets every worker
//! finish the jobs already queued, then exit once the queue is both empty
//! and disconnected. Dropping the pool performs the shutdown and joins all
//! worker threads.

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use crate::error::PipelineError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Resolves once with the submitted task's result.
pub struct TaskHandle<R> {
    result_rx: Receiver<Result<R, PipelineError>>,
}

impl<R> TaskHandle<R> {
    /// Blocks until the task has run. Returns [`PipelineError::TaskLost`] if
    /// the pool was torn down before the task produced a result.
    pub fn wait(self) -> Result<R, PipelineError> {
        self.result_rx
            .recv()
            .unwrap_or(Err(PipelineError::TaskLost))
    }
}

/// Thread pool consuming a FIFO task queue.
pub struct WorkerPool {
    job_tx: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    /// Spawns `num_workers` named worker threads.
    pub fn new(num_workers: usize) -> Result<Self> {
        if num_workers == 0 {
            return Err(PipelineError::InvalidConfig(
                "worker pool needs at least one worker".to_string(),
            )
            .into());
        }

        let (job_tx, job_rx) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let job_rx = job_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("pipeline-worker-{}", worker_id))
                .spawn(move || worker_loop(job_rx))
                .with_context(|| format!("failed to spawn worker thread {}", worker_id))?;
            workers.push(handle);
        }

        Ok(Self {
            job_tx: Mutex::new(Some(job_tx)),
            workers: Mutex::new(workers),
            size: num_workers,
        })
    }

    /// Schedules `task` and returns a handle to its result.
    ///
    /// Fails with [`PipelineError::PoolStopped`] once the pool has been shut
    /// down.
    pub fn submit<R, F>(&self, task: F) -> Result<TaskHandle<R>, PipelineError>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let guard = self.job_tx.lock();
        let job_tx = guard.as_ref().ok_or(PipelineError::PoolStopped)?;

        let (result_tx, result_rx) = bounded(1);
        let job: Job = Box::new(move || {
            let outcome = catch_unwind(AssertUnwindSafe(task))
                .map_err(|payload| PipelineError::TaskPanicked(panic_message(payload.as_ref())));
            // The submitter may have dropped the handle; that is not an error.
            let _ = result_tx.send(outcome);
        });

        job_tx.send(job).map_err(|_| PipelineError::PoolStopped)?;
        Ok(TaskHandle { result_rx })
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.size
    }

    /// Currently queued (not yet started) task count. Observational; may be
    /// stale by the time the caller looks at it.
    pub fn pending(&self) -> usize {
        self.job_tx.lock().as_ref().map_or(0, |tx| tx.len())
    }

    /// Closes the job queue and joins every worker after it drains the
    /// remaining jobs. Idempotent; also invoked on drop.
    pub fn shutdown(&self) {
        self.job_tx.lock().take();
        let mut workers = self.workers.lock();
        for worker in workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(jobs: Receiver<Job>) {
    // recv fails only when the channel is empty and disconnected, which is
    // exactly the drain-then-exit condition.
    while let Ok(job) = jobs.recv() {
        job();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
