//! Delivery module - moving models and view signals to the observer.
//!
//! Provides the ordered delivery context (WorkRunner), the last-value model
//! broadcast and the bounded view-signal queue.

pub mod broadcast;
pub mod signal_queue;
mod token;
pub mod work_runner;

pub use broadcast::{ModelBroadcast, ModelSource, Models};
pub use signal_queue::{BacklogObserver, SignalObserver, SignalQueue, ViewSignals};
pub use token::ObserverToken;
pub use work_runner::{DeliveryThread, ImmediateRunner, QueuedRunner, Work, WorkRunner};
