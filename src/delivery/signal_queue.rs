//! Bounded, lifecycle-gated queue of view signals.
//!
//! While an observer is attached, posted signals are delivered through the
//! delivery [`WorkRunner`]. While detached they are buffered. Either way at
//! most `capacity` signals are ever waiting for delivery; posting into a full
//! buffer fails with [`LoopViewError::QueueOverflow`] instead of dropping or
//! blocking.
//!
//! All signals live in one FIFO. Delivery work items carry no payload, they
//! only drain the FIFO for whoever is attached when they run. A signal posted
//! while attached but not yet delivered when the observer detaches therefore
//! stays queued, in order, for the next observer, and still counts against
//! the capacity.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::delivery::token::{ObserverToken, TokenClock};
use crate::delivery::work_runner::WorkRunner;
use crate::error::{LoopViewError, Result};
use crate::sync::lock;

/// Receives one signal at a time while attached.
pub type SignalObserver<V> = Arc<dyn Fn(V) + Send + Sync>;

/// Receives everything buffered while detached, in one batch, on attach.
pub type BacklogObserver<V> = Arc<dyn Fn(Vec<V>) + Send + Sync>;

struct QueueState<V> {
    observer: Option<SignalObserver<V>>,
    token: Option<ObserverToken>,
    pending: VecDeque<V>,
    backlog: Option<(BacklogObserver<V>, Vec<V>)>,
}

impl<V> QueueState<V> {
    fn undelivered(&self) -> usize {
        self.pending.len() + self.backlog.as_ref().map_or(0, |(_, items)| items.len())
    }

    // Undelivered backlog goes back to the head of the FIFO.
    fn requeue_backlog(&mut self) {
        if let Some((_, items)) = self.backlog.take() {
            for item in items.into_iter().rev() {
                self.pending.push_front(item);
            }
        }
    }
}

enum Step<V> {
    Backlog(BacklogObserver<V>, Vec<V>),
    Live(SignalObserver<V>, V),
}

struct QueueInner<V> {
    capacity: usize,
    state: Mutex<QueueState<V>>,
    draining: AtomicBool,
    clock: TokenClock,
    runner: Arc<dyn WorkRunner>,
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<V> QueueInner<V> {
    fn drain(&self) {
        if self.draining.swap(true, Ordering::AcqRel) {
            return;
        }
        let _guard = DrainGuard(&self.draining);

        loop {
            let step = {
                let mut state = lock(&self.state);
                let Some(live) = state.observer.clone() else {
                    break;
                };
                if let Some((backlog, items)) = state.backlog.take() {
                    Step::Backlog(backlog, items)
                } else if let Some(signal) = state.pending.pop_front() {
                    Step::Live(live, signal)
                } else {
                    break;
                }
            };

            match step {
                Step::Backlog(observer, items) => {
                    tracing::debug!(count = items.len(), "Flushing signal backlog");
                    observer(items);
                }
                Step::Live(observer, signal) => observer(signal),
            }
        }
    }
}

/// FIFO of view signals with capacity-bounded buffering while detached.
pub struct SignalQueue<V> {
    inner: Arc<QueueInner<V>>,
}

impl<V> Clone for SignalQueue<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Send + 'static> SignalQueue<V> {
    /// Create a detached queue holding at most `capacity` undelivered signals
    pub fn new(runner: Arc<dyn WorkRunner>, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(LoopViewError::InvalidState(
                "signal queue capacity must be > 0".to_string(),
            ));
        }
        Ok(Self {
            inner: Arc::new(QueueInner {
                capacity,
                state: Mutex::new(QueueState {
                    observer: None,
                    token: None,
                    pending: VecDeque::with_capacity(capacity),
                    backlog: None,
                }),
                draining: AtomicBool::new(false),
                clock: TokenClock::default(),
                runner,
            }),
        })
    }

    /// Post a signal.
    ///
    /// Delivered through the runner when an observer is attached, buffered
    /// otherwise. Fails with `QueueOverflow` when `capacity` signals are
    /// already waiting for delivery; the rejected signal is dropped and the
    /// buffer is left untouched.
    pub fn post(&self, signal: V) -> Result<()> {
        let attached = {
            let mut state = lock(&self.inner.state);
            if state.undelivered() >= self.inner.capacity {
                let attached = state.observer.is_some();
                drop(state);
                tracing::error!(capacity = self.inner.capacity, attached, "Signal queue full");
                return Err(LoopViewError::QueueOverflow {
                    capacity: self.inner.capacity,
                });
            }
            state.pending.push_back(signal);
            state.observer.is_some()
        };
        if attached {
            self.schedule_drain();
        }
        Ok(())
    }

    /// Attach `observer`, replacing any previous one, and flush the buffer to
    /// it in post order. Call from the delivery context.
    pub fn attach(&self, observer: impl Fn(V) + Send + Sync + 'static) -> ObserverToken {
        let token = self.inner.clock.next();
        {
            let mut state = lock(&self.inner.state);
            state.requeue_backlog();
            let replaced = state.observer.replace(Arc::new(observer)).is_some();
            state.token = Some(token);
            tracing::debug!(replaced, queued = state.pending.len(), "Signal observer attached");
        }
        self.schedule_drain();
        token
    }

    /// Attach `live` and hand everything buffered so far to `backlog` as one
    /// batch before any live delivery. `backlog` is skipped when nothing is
    /// buffered.
    pub fn attach_with_backlog(
        &self,
        live: impl Fn(V) + Send + Sync + 'static,
        backlog: impl Fn(Vec<V>) + Send + Sync + 'static,
    ) -> ObserverToken {
        let token = self.inner.clock.next();
        {
            let mut state = lock(&self.inner.state);
            state.requeue_backlog();
            if !state.pending.is_empty() {
                let items: Vec<V> = state.pending.drain(..).collect();
                state.backlog = Some((Arc::new(backlog), items));
            }
            let replaced = state.observer.replace(Arc::new(live)).is_some();
            state.token = Some(token);
            tracing::debug!(replaced, "Signal observer attached with backlog");
        }
        self.schedule_drain();
        token
    }

    /// Detach the observer; later signals are buffered
    pub fn detach(&self) {
        let mut state = lock(&self.inner.state);
        Self::detach_locked(&mut state);
    }

    /// Detach only if the attached observer is the one `token` attached.
    ///
    /// Returns whether it was detached.
    pub fn detach_if(&self, token: ObserverToken) -> bool {
        let mut state = lock(&self.inner.state);
        if state.token != Some(token) {
            return false;
        }
        Self::detach_locked(&mut state);
        true
    }

    fn detach_locked(state: &mut QueueState<V>) {
        state.token = None;
        if state.observer.take().is_some() {
            state.requeue_backlog();
            tracing::debug!(queued = state.pending.len(), "Signal observer detached");
        }
    }

    /// Whether an observer is attached
    pub fn has_observer(&self) -> bool {
        lock(&self.inner.state).observer.is_some()
    }

    /// Signals waiting for delivery
    pub fn queued(&self) -> usize {
        lock(&self.inner.state).undelivered()
    }

    /// Maximum number of signals waiting for delivery
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Observer-side handle; cannot post
    pub fn signals(&self) -> ViewSignals<V> {
        ViewSignals {
            queue: self.clone(),
        }
    }

    fn schedule_drain(&self) {
        let inner = Arc::clone(&self.inner);
        self.inner.runner.post(Box::new(move || inner.drain()));
    }
}

/// Observer side of a [`SignalQueue`].
pub struct ViewSignals<V> {
    queue: SignalQueue<V>,
}

impl<V> Clone for ViewSignals<V> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<V: Send + 'static> ViewSignals<V> {
    /// See [`SignalQueue::attach`]
    pub fn attach(&self, observer: impl Fn(V) + Send + Sync + 'static) -> ObserverToken {
        self.queue.attach(observer)
    }

    /// See [`SignalQueue::attach_with_backlog`]
    pub fn attach_with_backlog(
        &self,
        live: impl Fn(V) + Send + Sync + 'static,
        backlog: impl Fn(Vec<V>) + Send + Sync + 'static,
    ) -> ObserverToken {
        self.queue.attach_with_backlog(live, backlog)
    }

    pub fn detach(&self) {
        self.queue.detach();
    }

    pub fn detach_if(&self, token: ObserverToken) -> bool {
        self.queue.detach_if(token)
    }

    pub fn has_observer(&self) -> bool {
        self.queue.has_observer()
    }

    pub fn queued(&self) -> usize {
        self.queue.queued()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::work_runner::{ImmediateRunner, QueuedRunner};

    fn sink<V: Send + 'static>() -> (Arc<Mutex<Vec<V>>>, impl Fn(V) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let inner = Arc::clone(&seen);
        (seen, move |v| inner.lock().unwrap().push(v))
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = SignalQueue::<u32>::new(Arc::new(ImmediateRunner), 0).err().unwrap();
        assert!(matches!(err, LoopViewError::InvalidState(_)));
    }

    #[test]
    fn test_buffered_signals_flushed_in_order_on_attach() {
        let queue = SignalQueue::new(Arc::new(ImmediateRunner), 10).unwrap();
        for n in 0..5 {
            queue.post(n).unwrap();
        }
        assert_eq!(queue.queued(), 5);

        let (seen, observer) = sink();
        queue.attach(observer);

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.queued(), 0);
    }

    #[test]
    fn test_overflow_keeps_buffer_intact() {
        let queue = SignalQueue::new(Arc::new(ImmediateRunner), 3).unwrap();
        for n in 0..3 {
            queue.post(n).unwrap();
        }

        for n in 3..6 {
            let err = queue.post(n).unwrap_err();
            assert!(matches!(err, LoopViewError::QueueOverflow { capacity: 3 }));
        }
        assert_eq!(queue.queued(), 3);

        let (seen, observer) = sink();
        queue.attach(observer);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_attached_posts_delivered_as_they_arrive() {
        let queue = SignalQueue::new(Arc::new(ImmediateRunner), 1).unwrap();
        let (seen, observer) = sink();
        queue.attach(observer);

        for n in 0..5 {
            queue.post(n).unwrap();
        }
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_undelivered_attached_posts_count_against_capacity() {
        let runner = Arc::new(QueuedRunner::new());
        let queue = SignalQueue::new(runner.clone(), 2).unwrap();
        let (first_seen, first) = sink();
        queue.attach(first);

        queue.post(0).unwrap();
        queue.post(1).unwrap();
        for n in 2..5 {
            assert!(queue.post(n).unwrap_err().is_overflow());
        }
        queue.detach();
        runner.run_pending();
        assert!(first_seen.lock().unwrap().is_empty());
        assert!(queue.queued() <= queue.capacity());
        assert_eq!(queue.queued(), 2);

        let (second_seen, second) = sink();
        queue.attach(second);
        runner.run_pending();
        assert_eq!(*second_seen.lock().unwrap(), vec![0, 1]);
        queue.post(5).unwrap();
        runner.run_pending();
        assert_eq!(*second_seen.lock().unwrap(), vec![0, 1, 5]);
    }

    #[test]
    fn test_capacity_scenario() {
        let runner = Arc::new(QueuedRunner::new());
        let queue = SignalQueue::new(runner.clone(), 2).unwrap();

        queue.post("A").unwrap();
        queue.post("B").unwrap();
        assert!(queue.post("C").unwrap_err().is_overflow());

        let (seen, observer) = sink();
        queue.attach(observer);
        runner.run_pending();
        assert_eq!(*seen.lock().unwrap(), vec!["A", "B"]);

        queue.detach();
        queue.post("D").unwrap();
        assert!(runner.pending() == 0);

        let observer_seen = Arc::clone(&seen);
        queue.attach(move |v| observer_seen.lock().unwrap().push(v));
        runner.run_pending();
        assert_eq!(*seen.lock().unwrap(), vec!["A", "B", "D"]);
    }

    #[test]
    fn test_detach_before_delivery_keeps_signal_for_next_observer() {
        let runner = Arc::new(QueuedRunner::new());
        let queue = SignalQueue::new(runner.clone(), 4).unwrap();
        let (first_seen, first) = sink();
        queue.attach(first);
        runner.run_pending();

        queue.post(1).unwrap();
        queue.detach();
        queue.post(2).unwrap();
        runner.run_pending();
        assert!(first_seen.lock().unwrap().is_empty());
        assert_eq!(queue.queued(), 2);

        let (second_seen, second) = sink();
        queue.attach(second);
        runner.run_pending();
        assert_eq!(*second_seen.lock().unwrap(), vec![1, 2]);
        assert!(first_seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_attach_replaces_previous_observer() {
        let queue = SignalQueue::new(Arc::new(ImmediateRunner), 4).unwrap();
        let (first_seen, first) = sink();
        let (second_seen, second) = sink();

        queue.attach(first);
        queue.post(1).unwrap();
        queue.attach(second);
        queue.post(2).unwrap();

        assert_eq!(*first_seen.lock().unwrap(), vec![1]);
        assert_eq!(*second_seen.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_backlog_observer_gets_one_batch() {
        let runner = Arc::new(QueuedRunner::new());
        let queue = SignalQueue::new(runner.clone(), 4).unwrap();
        queue.post(1).unwrap();
        queue.post(2).unwrap();

        let (live_seen, live) = sink();
        let (batches, backlog) = sink();
        queue.attach_with_backlog(live, backlog);
        queue.post(3).unwrap();
        runner.run_pending();

        assert_eq!(*batches.lock().unwrap(), vec![vec![1, 2]]);
        assert_eq!(*live_seen.lock().unwrap(), vec![3]);
    }

    #[test]
    fn test_backlog_skipped_when_empty() {
        let queue = SignalQueue::new(Arc::new(ImmediateRunner), 4).unwrap();
        let (live_seen, live) = sink();
        let (batches, backlog) = sink::<Vec<u32>>();
        queue.attach_with_backlog(live, backlog);
        queue.post(1).unwrap();

        assert!(batches.lock().unwrap().is_empty());
        assert_eq!(*live_seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_undelivered_backlog_requeued_on_detach() {
        let runner = Arc::new(QueuedRunner::new());
        let queue = SignalQueue::new(runner.clone(), 4).unwrap();
        queue.post(1).unwrap();
        queue.post(2).unwrap();

        let (_, live) = sink();
        let (batches, backlog) = sink::<Vec<u32>>();
        queue.attach_with_backlog(live, backlog);
        queue.detach();
        queue.post(3).unwrap();
        runner.run_pending();
        assert!(batches.lock().unwrap().is_empty());

        let (seen, observer) = sink();
        queue.attach(observer);
        runner.run_pending();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_observer_posting_during_delivery_keeps_order() {
        let queue = SignalQueue::new(Arc::new(ImmediateRunner), 8).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let inner_queue = queue.clone();
        let inner_seen = Arc::clone(&seen);
        queue.post(1).unwrap();
        queue.post(2).unwrap();
        queue.attach(move |v: u32| {
            inner_seen.lock().unwrap().push(v);
            if v == 1 {
                inner_queue.post(10).unwrap();
            }
        });

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 10]);
    }

    #[test]
    fn test_detach_if_ignores_stale_token() {
        let queue = SignalQueue::new(Arc::new(ImmediateRunner), 4).unwrap();
        let (first_seen, first) = sink();
        let (second_seen, second) = sink();

        let stale = queue.attach(first);
        let current = queue.attach(second);
        assert!(!queue.detach_if(stale));
        queue.post(1).unwrap();

        assert!(first_seen.lock().unwrap().is_empty());
        assert_eq!(*second_seen.lock().unwrap(), vec![1]);
        assert!(queue.detach_if(current));
        assert!(!queue.has_observer());
    }

    #[test]
    fn test_detach_is_idempotent() {
        let queue = SignalQueue::<u32>::new(Arc::new(ImmediateRunner), 2).unwrap();
        queue.detach();
        queue.detach();
        assert!(!queue.has_observer());
    }

    #[test]
    fn test_view_signals_handle() {
        let queue = SignalQueue::new(Arc::new(ImmediateRunner), 2).unwrap();
        let signals = queue.signals();
        queue.post(1).unwrap();
        assert_eq!(signals.queued(), 1);
        assert_eq!(signals.capacity(), 2);

        let (seen, observer) = sink();
        signals.attach(observer);
        assert!(signals.has_observer());
        assert_eq!(*seen.lock().unwrap(), vec![1]);

        signals.detach();
        assert!(!signals.has_observer());
    }
}
