//! ViewBinding - attaches one view instance to a host while it is visible.
//!
//! Models flow while the view is started; view signals flow only while it is
//! resumed. Each transition is idempotent, and a binding only ever detaches
//! the observers it attached itself, so a recreated view binding to the same
//! host is never evicted by the teardown of the old one.

use std::fmt;
use std::sync::Arc;

use crate::delivery::{BacklogObserver, Models, ObserverToken, SignalObserver, ViewSignals};
use crate::host::LoopHost;
use crate::runtime::ModelObserver;

/// Lifecycle position of a bound view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewLifecycle {
    /// Bound but not yet visible
    Created,
    /// Visible, receiving models
    Started,
    /// In the foreground, receiving models and signals
    Resumed,
    /// No longer visible
    Stopped,
    /// Gone for good
    Destroyed,
}

impl fmt::Display for ViewLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Started => write!(f, "started"),
            Self::Resumed => write!(f, "resumed"),
            Self::Stopped => write!(f, "stopped"),
            Self::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// One view's connection to a host's models and signals.
pub struct ViewBinding<M, V>
where
    M: Clone + Send + Sync + 'static,
    V: Send + 'static,
{
    models: Models<M>,
    signals: ViewSignals<V>,
    on_model: ModelObserver<M>,
    on_signal: SignalObserver<V>,
    on_backlog: Option<BacklogObserver<V>>,
    model_token: Option<ObserverToken>,
    signal_token: Option<ObserverToken>,
    lifecycle: ViewLifecycle,
}

impl<M, V> ViewBinding<M, V>
where
    M: Clone + Send + Sync + 'static,
    V: Send + 'static,
{
    /// Bind to explicit model and signal handles
    pub fn new(
        models: Models<M>,
        signals: ViewSignals<V>,
        on_model: impl Fn(M) + Send + Sync + 'static,
        on_signal: impl Fn(V) + Send + Sync + 'static,
    ) -> Self {
        Self {
            models,
            signals,
            on_model: Arc::new(on_model),
            on_signal: Arc::new(on_signal),
            on_backlog: None,
            model_token: None,
            signal_token: None,
            lifecycle: ViewLifecycle::Created,
        }
    }

    /// Bind to a host
    pub fn for_host<E: Send + 'static>(
        host: &LoopHost<M, E, V>,
        on_model: impl Fn(M) + Send + Sync + 'static,
        on_signal: impl Fn(V) + Send + Sync + 'static,
    ) -> Self {
        Self::new(host.models(), host.signals(), on_model, on_signal)
    }

    /// Receive signals buffered while hidden as one batch on resume
    pub fn with_backlog(mut self, on_backlog: impl Fn(Vec<V>) + Send + Sync + 'static) -> Self {
        self.on_backlog = Some(Arc::new(on_backlog));
        self
    }

    pub fn lifecycle(&self) -> ViewLifecycle {
        self.lifecycle
    }

    /// View became visible: observe models, replaying the current one
    pub fn on_start(&mut self) {
        match self.lifecycle {
            ViewLifecycle::Created | ViewLifecycle::Stopped => {
                let on_model = Arc::clone(&self.on_model);
                self.model_token = Some(self.models.observe(move |model| on_model(model)));
                self.lifecycle = ViewLifecycle::Started;
            }
            _ => {}
        }
    }

    /// View reached the foreground: attach for view signals
    pub fn on_resume(&mut self) {
        self.on_start();
        if self.lifecycle != ViewLifecycle::Started {
            return;
        }

        let on_signal = Arc::clone(&self.on_signal);
        let live = move |signal| on_signal(signal);
        let token = match &self.on_backlog {
            Some(on_backlog) => {
                let on_backlog = Arc::clone(on_backlog);
                self.signals
                    .attach_with_backlog(live, move |batch| on_backlog(batch))
            }
            None => self.signals.attach(live),
        };
        self.signal_token = Some(token);
        self.lifecycle = ViewLifecycle::Resumed;
    }

    /// View left the foreground: signals are buffered again
    pub fn on_pause(&mut self) {
        if self.lifecycle != ViewLifecycle::Resumed {
            return;
        }
        if let Some(token) = self.signal_token.take() {
            self.signals.detach_if(token);
        }
        self.lifecycle = ViewLifecycle::Started;
    }

    /// View is no longer visible: stop observing models
    pub fn on_stop(&mut self) {
        self.on_pause();
        if self.lifecycle != ViewLifecycle::Started {
            return;
        }
        if let Some(token) = self.model_token.take() {
            self.models.remove_observer_if(token);
        }
        self.lifecycle = ViewLifecycle::Stopped;
    }

    /// View is gone; the binding becomes inert
    pub fn on_destroy(&mut self) {
        self.on_stop();
        self.lifecycle = ViewLifecycle::Destroyed;
    }
}

impl<M, V> Drop for ViewBinding<M, V>
where
    M: Clone + Send + Sync + 'static,
    V: Send + 'static,
{
    fn drop(&mut self) {
        if let Some(token) = self.signal_token.take() {
            self.signals.detach_if(token);
        }
        if let Some(token) = self.model_token.take() {
            self.models.remove_observer_if(token);
        }
    }
}
