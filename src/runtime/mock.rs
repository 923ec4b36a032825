//! Scriptable loop for tests and examples.
//!
//! `MockLoop` records every dispatched event and lets the caller emit models
//! to observers by hand, standing in for a real runtime.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{LoopViewError, Result};
use crate::runtime::traits::{EventLoop, First, LoopFactory, ModelObserver};
use crate::sync::lock;

struct MockState<M, E, F> {
    started: Mutex<Option<First<M, F>>>,
    events: Mutex<Vec<E>>,
    observers: Mutex<Vec<ModelObserver<M>>>,
    model: Mutex<Option<M>>,
    disposed: AtomicBool,
    dispose_calls: AtomicUsize,
    rejected: AtomicUsize,
}

/// Loop double that records events and emits models on demand.
///
/// Clones share state, so a test can keep one handle while the host owns
/// another.
pub struct MockLoop<M, E, F> {
    state: Arc<MockState<M, E, F>>,
}

impl<M, E, F> Clone for MockLoop<M, E, F> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<M, E, F> Default for MockLoop<M, E, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M, E, F> MockLoop<M, E, F> {
    /// Create a mock loop that has not been started yet
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState {
                started: Mutex::new(None),
                events: Mutex::new(Vec::new()),
                observers: Mutex::new(Vec::new()),
                model: Mutex::new(None),
                disposed: AtomicBool::new(false),
                dispose_calls: AtomicUsize::new(0),
                rejected: AtomicUsize::new(0),
            }),
        }
    }

    /// Factory that starts this mock
    pub fn factory(&self) -> MockLoopFactory<M, E, F> {
        MockLoopFactory { mock: self.clone() }
    }

    /// Whether `dispose` has been called
    pub fn is_disposed(&self) -> bool {
        self.state.disposed.load(Ordering::Acquire)
    }

    /// Number of times `dispose` has been called
    pub fn dispose_count(&self) -> usize {
        self.state.dispose_calls.load(Ordering::Acquire)
    }

    /// Number of events that arrived after disposal
    pub fn rejected_count(&self) -> usize {
        self.state.rejected.load(Ordering::Acquire)
    }

    /// Number of events received
    pub fn event_count(&self) -> usize {
        lock(&self.state.events).len()
    }

    /// Number of registered model observers
    pub fn observer_count(&self) -> usize {
        lock(&self.state.observers).len()
    }
}

impl<M: Clone, E: Clone, F: Clone> MockLoop<M, E, F> {
    /// Starting point the loop was started from, if started
    pub fn started_from(&self) -> Option<First<M, F>> {
        lock(&self.state.started).clone()
    }

    /// Events received so far, in dispatch order
    pub fn events(&self) -> Vec<E> {
        lock(&self.state.events).clone()
    }

    /// Publish a model to every observer, as a loop step would
    pub fn emit(&self, model: M) {
        *lock(&self.state.model) = Some(model.clone());
        let observers = lock(&self.state.observers).clone();
        for observer in observers {
            observer(model.clone());
        }
    }
}

impl<M, E, F> EventLoop<M, E> for MockLoop<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    fn observe(&self, observer: ModelObserver<M>) {
        lock(&self.state.observers).push(observer);
    }

    fn dispatch_event(&self, event: E) -> Result<()> {
        if self.is_disposed() {
            self.state.rejected.fetch_add(1, Ordering::AcqRel);
            return Err(LoopViewError::LoopDisposed);
        }
        lock(&self.state.events).push(event);
        Ok(())
    }

    fn most_recent_model(&self) -> Option<M> {
        lock(&self.state.model).clone()
    }

    fn dispose(&self) {
        self.state.dispose_calls.fetch_add(1, Ordering::AcqRel);
        self.state.disposed.store(true, Ordering::Release);
        lock(&self.state.observers).clear();
    }
}

/// Factory handing out a shared [`MockLoop`].
pub struct MockLoopFactory<M, E, F> {
    mock: MockLoop<M, E, F>,
}

impl<M, E, F> LoopFactory<M, E, F> for MockLoopFactory<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    type Loop = MockLoop<M, E, F>;

    fn start_from(self, model: M, effects: Vec<F>) -> Result<Self::Loop> {
        *lock(&self.mock.state.started) = Some(First { model, effects });
        Ok(self.mock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_starts_from_first() {
        let mock: MockLoop<u32, u32, &str> = MockLoop::new();
        let started = mock.factory().start_from(3, vec!["load"]).unwrap();

        let first = started.started_from().unwrap();
        assert_eq!(first.model, 3);
        assert_eq!(first.effects, vec!["load"]);
        assert!(started.most_recent_model().is_none());
    }

    #[test]
    fn test_mock_records_events() {
        let mock: MockLoop<u32, &str, ()> = MockLoop::new();
        mock.dispatch_event("a").unwrap();
        mock.dispatch_event("b").unwrap();
        assert_eq!(mock.events(), vec!["a", "b"]);
        assert_eq!(mock.event_count(), 2);
    }

    #[test]
    fn test_mock_emit_reaches_observers() {
        let mock: MockLoop<u32, (), ()> = MockLoop::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        mock.observe(Arc::new(move |m: u32| sink.lock().unwrap().push(m)));

        mock.emit(1);
        mock.emit(2);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(mock.most_recent_model(), Some(2));
    }

    #[test]
    fn test_mock_rejects_after_dispose() {
        let mock: MockLoop<u32, u32, ()> = MockLoop::new();
        mock.dispose();

        let err = mock.dispatch_event(1).unwrap_err();
        assert!(matches!(err, LoopViewError::LoopDisposed));
        assert!(mock.is_disposed());
        assert_eq!(mock.rejected_count(), 1);
        assert_eq!(mock.dispose_count(), 1);
        assert_eq!(mock.observer_count(), 0);
    }
}
