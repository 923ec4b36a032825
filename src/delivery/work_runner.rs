//! Delivery scheduling.
//!
//! Every callback into an observer is marshaled through a [`WorkRunner`]. A
//! runner executes work items one at a time, in the order they were posted,
//! so observers never see concurrent or reordered callbacks.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::error::{LoopViewError, Result};
use crate::sync::lock;

/// Unit of delivery work.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Single ordered execution context for delivery callbacks.
pub trait WorkRunner: Send + Sync {
    /// Schedule `work`; must not block waiting for it to run
    fn post(&self, work: Work);
}

/// Runs work inline on the posting thread.
///
/// Suitable when every producer already lives on the delivery context.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateRunner;

impl WorkRunner for ImmediateRunner {
    fn post(&self, work: Work) {
        work();
    }
}

/// Holds work until [`QueuedRunner::run_pending`] is called.
#[derive(Default)]
pub struct QueuedRunner {
    queue: Mutex<VecDeque<Work>>,
    running: AtomicBool,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl QueuedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of work items waiting to run
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Run queued work, including work posted while draining.
    ///
    /// Returns the number of items run. A nested call from inside a work item
    /// returns 0; the outer drain picks up the remaining work. A panicking item
    /// propagates, and the items after it stay queued for the next call.
    pub fn run_pending(&self) -> usize {
        if self.running.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let _guard = RunningGuard(&self.running);
        let mut ran = 0;
        loop {
            let next = lock(&self.queue).pop_front();
            match next {
                Some(work) => {
                    work();
                    ran += 1;
                }
                None => break,
            }
        }
        ran
    }
}

impl WorkRunner for QueuedRunner {
    fn post(&self, work: Work) {
        lock(&self.queue).push_back(work);
    }
}

/// Delivery context backed by a dedicated tokio task.
///
/// Work is sent over an unbounded channel and run by one task in order.
/// Dropping the runner closes the channel; the task finishes the queued work
/// and exits.
pub struct DeliveryThread {
    tx: mpsc::UnboundedSender<Work>,
}

impl DeliveryThread {
    /// Spawn the delivery task on the current tokio runtime
    pub fn spawn() -> Result<Self> {
        let handle = Handle::try_current().map_err(|e| {
            LoopViewError::InvalidState(format!("delivery thread needs a tokio runtime: {}", e))
        })?;
        Ok(Self::spawn_on(&handle))
    }

    /// Spawn the delivery task on the given runtime
    pub fn spawn_on(handle: &Handle) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Work>();
        handle.spawn(async move {
            while let Some(work) = rx.recv().await {
                if catch_unwind(AssertUnwindSafe(work)).is_err() {
                    tracing::error!("Delivery work item panicked");
                }
            }
            tracing::debug!("Delivery thread stopped");
        });
        Self { tx }
    }
}

impl WorkRunner for DeliveryThread {
    fn post(&self, work: Work) {
        if self.tx.send(work).is_err() {
            tracing::warn!("Delivery thread gone, dropping work item");
        }
    }
}
