//! View module - binding a view's lifecycle to a host's delivery channels.

mod binding;

pub use binding::{ViewBinding, ViewLifecycle};
