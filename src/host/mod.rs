//! Host module - lifetime binding between a loop and its view.
//!
//! LoopHost owns the loop, gates dispatch on its disposal state and wires the
//! loop's output into the delivery channels.

mod config;
mod loop_host;
mod state;

pub use config::{DEFAULT_MAX_QUEUED, HostConfig};
pub use loop_host::{LoopHost, LoopHostBuilder, SignalSender};
pub use state::HostState;
