//! Loop runtime module - the computation loop a host drives.
//!
//! This module provides:
//! - The runtime boundary traits (EventLoop, LoopFactory, Init) and First
//! - ReducerLoop, a tokio-backed update/effect-handler loop
//! - MockLoop for driving hosts by hand in tests

mod mock;
mod reducer;
mod traits;

pub use mock::{MockLoop, MockLoopFactory};
pub use reducer::{
    EffectHandler, EventSender, Next, NoEffects, ReducerLoop, ReducerLoopFactory, Update,
};
pub use traits::{EventLoop, First, Init, LoopFactory, ModelObserver, identity_init};
