//! LoopHost - binds a long-lived loop to an intermittently attached view.
//!
//! The host starts the loop on construction, forwards its models into a
//! [`ModelBroadcast`] and its view signals into a [`SignalQueue`], gates
//! incoming events on the disposal state, and tears the loop down exactly
//! once.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, RwLock};

use crate::delivery::{
    ImmediateRunner, ModelBroadcast, ModelSource, Models, SignalQueue, ViewSignals, WorkRunner,
};
use crate::error::Result;
use crate::host::config::HostConfig;
use crate::host::state::{HostState, StateCell};
use crate::runtime::{EventLoop, Init, LoopFactory};
use crate::sync::{lock, read, write};

type DisposeHook = Box<dyn FnOnce() + Send>;

/// Handle the loop uses to emit view signals.
///
/// Signals sent after the host starts disposing are dropped silently.
pub struct SignalSender<V> {
    queue: SignalQueue<V>,
    state: Arc<StateCell>,
}

impl<V> Clone for SignalSender<V> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<V: Send + 'static> SignalSender<V> {
    /// Emit a signal toward the view.
    ///
    /// Fails with `QueueOverflow` when the view has been detached long enough
    /// to fill the buffer.
    pub fn send(&self, signal: V) -> Result<()> {
        if !self.state.is_active() {
            tracing::trace!("Dropping view signal emitted after disposal");
            return Ok(());
        }
        self.queue.post(signal)
    }
}

/// Owns a running loop and its delivery channels.
///
/// `M` is the model, `E` the event and `V` the view signal type.
pub struct LoopHost<M, E, V> {
    state: Arc<StateCell>,
    event_loop: RwLock<Option<Box<dyn EventLoop<M, E>>>>,
    last_model: Mutex<M>,
    models: ModelBroadcast<M>,
    signals: SignalQueue<V>,
    before_dispose: Mutex<Option<DisposeHook>>,
}

impl<M, E, V> LoopHost<M, E, V>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    V: Send + 'static,
{
    /// Start a host with default settings: inline delivery and a signal buffer
    /// of [`DEFAULT_MAX_QUEUED`](crate::host::DEFAULT_MAX_QUEUED).
    pub fn new<F, Fac>(
        provider: impl FnOnce(SignalSender<V>) -> Fac + 'static,
        start_model: M,
        init: impl Init<M, F> + 'static,
    ) -> Result<Self>
    where
        Fac: LoopFactory<M, E, F>,
    {
        Self::builder(provider, start_model, init).build()
    }

    /// Start a host delivering through `runner` with a buffer of `max_queued`
    pub fn with_runner<F, Fac>(
        provider: impl FnOnce(SignalSender<V>) -> Fac + 'static,
        start_model: M,
        init: impl Init<M, F> + 'static,
        runner: Arc<dyn WorkRunner>,
        max_queued: usize,
    ) -> Result<Self>
    where
        Fac: LoopFactory<M, E, F>,
    {
        Self::builder(provider, start_model, init)
            .work_runner(runner)
            .max_queued(max_queued)
            .build()
    }

    /// Configure a host whose factory only needs the signal sender
    pub fn builder<F, Fac>(
        provider: impl FnOnce(SignalSender<V>) -> Fac + 'static,
        start_model: M,
        init: impl Init<M, F> + 'static,
    ) -> LoopHostBuilder<M, E, F, V, Fac>
    where
        Fac: LoopFactory<M, E, F>,
    {
        Self::builder_with_model_source(move |signals, _models| provider(signals), start_model, init)
    }

    /// Configure a host whose factory also receives the host's own model
    /// stream, e.g. to derive events from published models
    pub fn builder_with_model_source<F, Fac>(
        provider: impl FnOnce(SignalSender<V>, ModelSource<M>) -> Fac + 'static,
        start_model: M,
        init: impl Init<M, F> + 'static,
    ) -> LoopHostBuilder<M, E, F, V, Fac>
    where
        Fac: LoopFactory<M, E, F>,
    {
        LoopHostBuilder {
            provider: Box::new(provider),
            start_model,
            init: Box::new(init),
            config: HostConfig::default(),
            runner: None,
            before_dispose: None,
            _event: PhantomData,
        }
    }

    /// Most recent model.
    ///
    /// Falls back to the starting model until the loop reports one, and keeps
    /// returning the last known model after disposal.
    pub fn model(&self) -> M {
        let event_loop = read(&self.event_loop);
        event_loop
            .as_ref()
            .and_then(|l| l.most_recent_model())
            .unwrap_or_else(|| lock(&self.last_model).clone())
    }

    /// Observation handle for the model stream
    pub fn models(&self) -> Models<M> {
        self.models.models()
    }

    /// Observer-side handle for view signals
    pub fn signals(&self) -> ViewSignals<V> {
        self.signals.signals()
    }
}

impl<M, E, V> LoopHost<M, E, V> {
    /// Current lifecycle state
    pub fn state(&self) -> HostState {
        self.state.get()
    }

    /// Whether events are still accepted
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Push an event into the loop.
    ///
    /// Safe from any thread and never blocks on event processing. After
    /// disposal has begun this is a silent no-op. An event that passes the
    /// state check is guaranteed to reach a live loop: disposal cannot release
    /// the loop while a dispatch holds the read side of the handle.
    pub fn dispatch(&self, event: E) {
        if !self.state.is_active() {
            tracing::trace!("Dropping event dispatched after disposal");
            return;
        }

        let event_loop = read(&self.event_loop);
        if !self.state.is_active() {
            tracing::trace!("Dropping event dispatched during disposal");
            return;
        }
        if let Some(event_loop) = event_loop.as_ref() {
            if let Err(e) = event_loop.dispatch_event(event) {
                tracing::warn!(error = %e, "Loop rejected event");
            }
        }
    }

    /// Tear down the host.
    ///
    /// Runs the before-dispose hook, flips the state to `Disposing`, releases
    /// the loop and ends in `Disposed`. Later calls do nothing.
    pub fn dispose(&self) {
        if !self.state.is_active() {
            tracing::debug!(state = %self.state.get(), "Loop host already disposed");
            return;
        }

        let hook = lock(&self.before_dispose).take();
        if let Some(hook) = hook {
            hook();
        }

        if !self.state.begin_disposal() {
            return;
        }
        tracing::debug!("Loop host disposing");

        let released = {
            let mut event_loop = write(&self.event_loop);
            let released = event_loop.take();
            if let Some(model) = released.as_ref().and_then(|l| l.most_recent_model()) {
                *lock(&self.last_model) = model;
            }
            released
        };
        if let Some(event_loop) = released {
            event_loop.dispose();
        }

        self.state.finish_disposal();
        tracing::debug!("Loop host disposed");
    }
}

impl<M, E, V> Drop for LoopHost<M, E, V> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Configures and starts a [`LoopHost`].
pub struct LoopHostBuilder<M, E, F, V, Fac> {
    provider: Box<dyn FnOnce(SignalSender<V>, ModelSource<M>) -> Fac>,
    start_model: M,
    init: Box<dyn Init<M, F>>,
    config: HostConfig,
    runner: Option<Arc<dyn WorkRunner>>,
    before_dispose: Option<DisposeHook>,
    _event: PhantomData<fn(E)>,
}

impl<M, E, F, V, Fac> LoopHostBuilder<M, E, F, V, Fac>
where
    M: Clone + Send + Sync + 'static,
    E: Send + 'static,
    V: Send + 'static,
    Fac: LoopFactory<M, E, F>,
{
    /// Signal buffer capacity while the view is detached
    pub fn max_queued(mut self, max_queued: usize) -> Self {
        self.config.max_queued = max_queued;
        self
    }

    /// Replace the whole host configuration
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// Delivery context for observer callbacks
    pub fn work_runner(mut self, runner: Arc<dyn WorkRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Cleanup run once at disposal, before events stop being accepted
    pub fn before_dispose(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.before_dispose = Some(Box::new(hook));
        self
    }

    /// Run `init`, start the loop and subscribe to its models.
    ///
    /// Errors from `init` or from starting the loop are returned as-is.
    pub fn build(self) -> Result<LoopHost<M, E, V>> {
        self.config.validate()?;
        let runner = self.runner.unwrap_or_else(|| Arc::new(ImmediateRunner));

        let state = Arc::new(StateCell::new());
        let signals = SignalQueue::new(Arc::clone(&runner), self.config.max_queued)?;
        let models = ModelBroadcast::new(runner);

        let sender = SignalSender {
            queue: signals.clone(),
            state: Arc::clone(&state),
        };
        let factory = (self.provider)(sender, models.subscribe());

        let first = self.init.init(self.start_model)?;
        let start_model = first.model.clone();
        let event_loop = factory.start_from(first.model, first.effects)?;

        let forward_models = models.clone();
        let forward_state = Arc::clone(&state);
        event_loop.observe(Arc::new(move |model: M| {
            if forward_state.is_active() {
                forward_models.set(model);
            }
        }));

        tracing::debug!(max_queued = self.config.max_queued, "Loop host started");

        Ok(LoopHost {
            state,
            event_loop: RwLock::new(Some(Box::new(event_loop))),
            last_model: Mutex::new(start_model),
            models,
            signals,
            before_dispose: Mutex::new(self.before_dispose),
        })
    }
}
