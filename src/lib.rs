//! Loopview - lifecycle-bound hosting for event loops
//!
//! A [`LoopHost`] keeps a computation loop alive across any number of view
//! recreations. The latest model is always available to whichever view is
//! attached, view-only signals are buffered (bounded) while no view is in the
//! foreground, and events stop reaching the loop the moment disposal begins.

pub mod delivery;
pub mod error;
pub mod host;
pub mod runtime;
mod sync;
pub mod view;

pub use delivery::{
    DeliveryThread, ImmediateRunner, ModelBroadcast, Models, ObserverToken, QueuedRunner,
    SignalQueue, ViewSignals, WorkRunner,
};
pub use error::{LoopViewError, Result};
pub use host::{DEFAULT_MAX_QUEUED, HostConfig, HostState, LoopHost, LoopHostBuilder, SignalSender};
pub use runtime::{EventLoop, First, Init, LoopFactory};
pub use view::{ViewBinding, ViewLifecycle};
