//! Tracestore Compression Workers
//!
//! Fixed pool of named threads that compress sealed chunks off the writer's
//! path. Jobs arrive over a bounded channel; submission never blocks, so a
//! full queue is reported back to the caller who keeps the job for later.
//!
//! @version 0.1.0
//! @author Tracestore Development Team

use crossbeam::channel::{bounded, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracestore_common::Result;

// =============================================================================
// Pending Counter
// =============================================================================

#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Pending {
    fn increment(&self) {
        *self.count.lock() += 1;
    }

    fn decrement(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn get(&self) -> usize {
        *self.count.lock()
    }

    fn wait_zero(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }
}

struct Done<'a>(&'a Pending);

impl Drop for Done<'_> {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

// =============================================================================
// Compression Pool
// =============================================================================

/// Bounded worker pool running one handler over submitted jobs.
pub struct CompressionPool<T: Send + 'static> {
    sender: Option<Sender<T>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<Pending>,
}

impl<T: Send + 'static> CompressionPool<T> {
    /// Spawn `workers` threads named `{name}-{i}` sharing a queue of `queue` slots.
    pub fn new<F>(name: &str, workers: usize, queue: usize, handler: F) -> Result<Self>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let (sender, receiver) = bounded::<T>(queue.max(1));
        let handler = Arc::new(handler);
        let pending = Arc::new(Pending::default());

        let mut handles = Vec::with_capacity(workers.max(1));
        for i in 0..workers.max(1) {
            let receiver = receiver.clone();
            let handler = Arc::clone(&handler);
            let pending = Arc::clone(&pending);
            let handle = std::thread::Builder::new()
                .name(format!("{}-{}", name, i))
                .spawn(move || {
                    for job in receiver.iter() {
                        let _done = Done(&pending);
                        if catch_unwind(AssertUnwindSafe(|| handler(job))).is_err() {
                            tracing::error!("compression job panicked");
                        }
                    }
                })?;
            handles.push(handle);
        }

        tracing::debug!(name, workers = handles.len(), queue, "compression pool started");

        Ok(Self {
            sender: Some(sender),
            workers: handles,
            pending,
        })
    }

    /// Queue a job without blocking. A full or closed queue hands the job back.
    pub fn try_submit(&self, job: T) -> std::result::Result<(), T> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(job);
        };
        self.pending.increment();
        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => {
                self.pending.decrement();
                Err(job)
            }
        }
    }

    /// Jobs queued or running.
    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Block until every submitted job has finished.
    pub fn wait_idle(&self) {
        self.pending.wait_zero();
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl<T: Send + 'static> Drop for CompressionPool<T> {
    fn drop(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
