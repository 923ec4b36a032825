//! Last-value broadcast of models.
//!
//! [`ModelBroadcast`] keeps the most recent model and hands every new one to
//! the single attached observer through the delivery [`WorkRunner`]. Values
//! are stored on the delivery context as part of the delivery work item, so
//! the cached value and what the observer has seen never disagree.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::delivery::token::{ObserverToken, TokenClock};
use crate::delivery::work_runner::WorkRunner;
use crate::runtime::ModelObserver;
use crate::sync::lock;

/// Receiver of the latest model; `None` until the first one arrives.
pub type ModelSource<M> = watch::Receiver<Option<M>>;

struct BroadcastInner<M> {
    value: watch::Sender<Option<M>>,
    observer: Mutex<Option<(ObserverToken, ModelObserver<M>)>>,
    clock: TokenClock,
    runner: Arc<dyn WorkRunner>,
}

impl<M: Clone> BroadcastInner<M> {
    fn deliver(&self, model: M) {
        self.value.send_replace(Some(model.clone()));
        let observer = lock(&self.observer).as_ref().map(|(_, o)| Arc::clone(o));
        if let Some(observer) = observer {
            observer(model);
        }
    }
}

/// Single-slot cache of the latest model plus delivery to one observer.
pub struct ModelBroadcast<M> {
    inner: Arc<BroadcastInner<M>>,
}

impl<M> Clone for ModelBroadcast<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> ModelBroadcast<M>
where
    M: Clone + Send + Sync + 'static,
{
    /// Create an empty broadcast delivering through `runner`
    pub fn new(runner: Arc<dyn WorkRunner>) -> Self {
        let (value, _) = watch::channel(None);
        Self {
            inner: Arc::new(BroadcastInner {
                value,
                observer: Mutex::new(None),
                clock: TokenClock::default(),
                runner,
            }),
        }
    }

    /// Store `model` as current and deliver it to the attached observer.
    ///
    /// Both happen in one work item on the delivery context, in `set` order.
    pub fn set(&self, model: M) {
        let inner = Arc::clone(&self.inner);
        self.inner.runner.post(Box::new(move || inner.deliver(model)));
    }

    /// Attach `observer`, replacing any previous one.
    ///
    /// The observer is called right away with the current value, if any, then
    /// with every later value. Call from the delivery context.
    pub fn observe(&self, observer: impl Fn(M) + Send + Sync + 'static) -> ObserverToken {
        let observer: ModelObserver<M> = Arc::new(observer);
        let token = self.inner.clock.next();
        let replaced = lock(&self.inner.observer)
            .replace((token, Arc::clone(&observer)))
            .is_some();
        tracing::debug!(replaced, generation = token.generation(), "Model observer attached");

        if let Some(current) = self.get() {
            observer(current);
        }
        token
    }

    /// Detach the current observer, if any
    pub fn remove_observer(&self) {
        if lock(&self.inner.observer).take().is_some() {
            tracing::debug!("Model observer removed");
        }
    }

    /// Detach the observer only if it is still the one `token` attached.
    ///
    /// Returns whether it was removed.
    pub fn remove_observer_if(&self, token: ObserverToken) -> bool {
        let mut slot = lock(&self.inner.observer);
        if slot.as_ref().is_some_and(|(current, _)| *current == token) {
            *slot = None;
            tracing::debug!(generation = token.generation(), "Model observer removed");
            true
        } else {
            false
        }
    }

    /// Whether an observer is attached
    pub fn has_observer(&self) -> bool {
        lock(&self.inner.observer).is_some()
    }

    /// Current value, if one has been delivered
    pub fn get(&self) -> Option<M> {
        self.inner.value.borrow().clone()
    }

    /// Current value, or `fallback` before the first one
    pub fn get_or(&self, fallback: M) -> M {
        self.get().unwrap_or(fallback)
    }

    /// Async receiver of the latest value
    pub fn subscribe(&self) -> ModelSource<M> {
        self.inner.value.subscribe()
    }

    /// Read-only handle for observers
    pub fn models(&self) -> Models<M> {
        Models {
            broadcast: self.clone(),
        }
    }
}

/// Observation side of a [`ModelBroadcast`]; cannot publish.
pub struct Models<M> {
    broadcast: ModelBroadcast<M>,
}

impl<M> Clone for Models<M> {
    fn clone(&self) -> Self {
        Self {
            broadcast: self.broadcast.clone(),
        }
    }
}

impl<M> Models<M>
where
    M: Clone + Send + Sync + 'static,
{
    /// See [`ModelBroadcast::observe`]
    pub fn observe(&self, observer: impl Fn(M) + Send + Sync + 'static) -> ObserverToken {
        self.broadcast.observe(observer)
    }

    pub fn remove_observer(&self) {
        self.broadcast.remove_observer();
    }

    pub fn remove_observer_if(&self, token: ObserverToken) -> bool {
        self.broadcast.remove_observer_if(token)
    }

    pub fn has_observer(&self) -> bool {
        self.broadcast.has_observer()
    }

    pub fn get(&self) -> Option<M> {
        self.broadcast.get()
    }

    pub fn get_or(&self, fallback: M) -> M {
        self.broadcast.get_or(fallback)
    }

    pub fn subscribe(&self) -> ModelSource<M> {
        self.broadcast.subscribe()
    }
}
