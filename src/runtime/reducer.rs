//! Reference reducer loop running on tokio.
//!
//! Events are processed one at a time in arrival order by a single task:
//! `update` produces the next model and effects, the model is published to
//! observers, and each effect is handed to the [`EffectHandler`] on its own
//! task. Effect handlers feed results back through an [`EventSender`].
//! Effect tasks belong to the loop task; disposing the loop aborts both.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use crate::error::{LoopViewError, Result};
use crate::runtime::traits::{EventLoop, LoopFactory, ModelObserver};
use crate::sync::lock;

/// Result of one update step.
#[derive(Debug, Clone, PartialEq)]
pub struct Next<M, F> {
    /// New model, if the event changed it
    pub model: Option<M>,
    /// Effects to run
    pub effects: Vec<F>,
}

impl<M, F> Next<M, F> {
    /// Replace the model, no effects
    pub fn next(model: M) -> Self {
        Self {
            model: Some(model),
            effects: Vec::new(),
        }
    }

    /// Replace the model and run effects
    pub fn next_with(model: M, effects: impl IntoIterator<Item = F>) -> Self {
        Self {
            model: Some(model),
            effects: effects.into_iter().collect(),
        }
    }

    /// Keep the model, run effects
    pub fn dispatch(effects: impl IntoIterator<Item = F>) -> Self {
        Self {
            model: None,
            effects: effects.into_iter().collect(),
        }
    }

    /// Nothing changes
    pub fn noop() -> Self {
        Self {
            model: None,
            effects: Vec::new(),
        }
    }

    /// Whether this step replaces the model
    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }
}

/// Pure state transition.
pub trait Update<M, E, F>: Send + Sync {
    fn update(&self, model: &M, event: E) -> Next<M, F>;
}

impl<M, E, F, T> Update<M, E, F> for T
where
    T: Fn(&M, E) -> Next<M, F> + Send + Sync,
{
    fn update(&self, model: &M, event: E) -> Next<M, F> {
        self(model, event)
    }
}

/// Handles effects, feeding results back as events.
#[async_trait]
pub trait EffectHandler<F, E>: Send + Sync {
    async fn handle(&self, effect: F, events: EventSender<E>);
}

/// Effect handler that ignores every effect.
pub struct NoEffects;

#[async_trait]
impl<F: Send + 'static, E: Send + 'static> EffectHandler<F, E> for NoEffects {
    async fn handle(&self, _effect: F, _events: EventSender<E>) {}
}

/// Handle for pushing events back into a running loop.
pub struct EventSender<E> {
    tx: mpsc::UnboundedSender<E>,
}

impl<E> Clone for EventSender<E> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<E> EventSender<E> {
    /// Push an event; fails once the loop has stopped
    pub fn send(&self, event: E) -> Result<()> {
        self.tx.send(event).map_err(|_| LoopViewError::LoopDisposed)
    }
}

// `notify` serializes publishing against registration, so a new observer
// sees the current model followed only by newer ones. Observers must not call
// back into `observe` from inside a notification.
struct Published<M> {
    model: Mutex<M>,
    observers: Mutex<Vec<ModelObserver<M>>>,
    notify: Mutex<()>,
}

impl<M: Clone> Published<M> {
    fn new(model: M) -> Self {
        Self {
            model: Mutex::new(model),
            observers: Mutex::new(Vec::new()),
            notify: Mutex::new(()),
        }
    }

    fn current(&self) -> M {
        lock(&self.model).clone()
    }

    fn publish(&self, model: M) {
        let _notify = lock(&self.notify);
        *lock(&self.model) = model.clone();
        let observers = lock(&self.observers).clone();
        for observer in observers {
            observer(model.clone());
        }
    }

    fn register(&self, observer: ModelObserver<M>) {
        let _notify = lock(&self.notify);
        let current = self.current();
        lock(&self.observers).push(Arc::clone(&observer));
        observer(current);
    }
}

/// Builds [`ReducerLoop`]s.
pub struct ReducerLoopFactory<M, E, F> {
    update: Arc<dyn Update<M, E, F>>,
    handler: Arc<dyn EffectHandler<F, E>>,
    handle: Option<Handle>,
}

impl<M, E, F> ReducerLoopFactory<M, E, F> {
    /// Create a factory; loops spawn on the current tokio runtime
    pub fn new(
        update: impl Update<M, E, F> + 'static,
        handler: impl EffectHandler<F, E> + 'static,
    ) -> Self {
        Self {
            update: Arc::new(update),
            handler: Arc::new(handler),
            handle: None,
        }
    }

    /// Spawn loops on the given runtime instead of the current one
    pub fn with_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }
}

impl<M, E, F> LoopFactory<M, E, F> for ReducerLoopFactory<M, E, F>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    type Loop = ReducerLoop<M, E>;

    fn start_from(self, model: M, effects: Vec<F>) -> Result<Self::Loop> {
        let handle = match self.handle {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| {
                LoopViewError::InvalidState(format!("reducer loop needs a tokio runtime: {}", e))
            })?,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let published = Arc::new(Published::new(model));
        let events = EventSender { tx: tx.clone() };

        let task = handle.spawn(run_loop(
            rx,
            self.update,
            self.handler,
            Arc::clone(&published),
            events,
            effects,
            handle.clone(),
        ));

        Ok(ReducerLoop {
            tx,
            published,
            task: Mutex::new(Some(task)),
            disposed: AtomicBool::new(false),
        })
    }
}

async fn run_loop<M, E, F>(
    mut rx: mpsc::UnboundedReceiver<E>,
    update: Arc<dyn Update<M, E, F>>,
    handler: Arc<dyn EffectHandler<F, E>>,
    published: Arc<Published<M>>,
    events: EventSender<E>,
    startup: Vec<F>,
    handle: Handle,
) where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    F: Send + 'static,
{
    // Dropped with this future, which aborts every effect still running.
    let mut running = JoinSet::new();
    for effect in startup {
        spawn_effect(&mut running, &handle, &handler, effect, &events);
    }

    while let Some(event) = rx.recv().await {
        reap_effects(&mut running);
        let current = published.current();
        let next = update.update(&current, event);
        if let Some(model) = next.model {
            published.publish(model);
        }
        for effect in next.effects {
            spawn_effect(&mut running, &handle, &handler, effect, &events);
        }
    }

    tracing::debug!(effects = running.len(), "Reducer loop input closed");
}

fn spawn_effect<F, E>(
    running: &mut JoinSet<()>,
    handle: &Handle,
    handler: &Arc<dyn EffectHandler<F, E>>,
    effect: F,
    events: &EventSender<E>,
) where
    F: Send + 'static,
    E: Send + 'static,
{
    let handler = Arc::clone(handler);
    let events = events.clone();
    running.spawn_on(
        async move {
            handler.handle(effect, events).await;
        },
        handle,
    );
}

fn reap_effects(running: &mut JoinSet<()>) {
    while let Some(result) = running.try_join_next() {
        if let Err(e) = result {
            if e.is_panic() {
                tracing::error!("Effect handler panicked");
            }
        }
    }
}

/// Event loop driven by a tokio task.
pub struct ReducerLoop<M, E> {
    tx: mpsc::UnboundedSender<E>,
    published: Arc<Published<M>>,
    task: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl<M, E> ReducerLoop<M, E> {
    /// Sender for pushing events from outside the host
    pub fn event_sender(&self) -> EventSender<E> {
        EventSender { tx: self.tx.clone() }
    }

    /// Whether the loop has been disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl<M, E> EventLoop<M, E> for ReducerLoop<M, E>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    /// Registers the observer and immediately hands it the current model.
    fn observe(&self, observer: ModelObserver<M>) {
        self.published.register(observer);
    }

    fn dispatch_event(&self, event: E) -> Result<()> {
        if self.is_disposed() {
            return Err(LoopViewError::LoopDisposed);
        }
        self.tx.send(event).map_err(|_| LoopViewError::LoopDisposed)
    }

    fn most_recent_model(&self) -> Option<M> {
        Some(self.published.current())
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
        lock(&self.published.observers).clear();
        tracing::debug!("Reducer loop disposed");
    }
}

impl<M, E> Drop for ReducerLoop<M, E> {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
    }
}
