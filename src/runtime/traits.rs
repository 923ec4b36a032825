//! Loop runtime boundary: the contracts a computation loop must satisfy to be
//! hosted by a [`LoopHost`](crate::host::LoopHost).

use std::sync::Arc;

use crate::error::Result;

/// Callback receiving every model a loop produces.
pub type ModelObserver<M> = Arc<dyn Fn(M) + Send + Sync>;

/// Starting point of a loop: the model to start from plus startup effects.
#[derive(Debug, Clone, PartialEq)]
pub struct First<M, F> {
    /// Model the loop starts from
    pub model: M,
    /// Effects to run as soon as the loop starts
    pub effects: Vec<F>,
}

impl<M, F> First<M, F> {
    /// Start from a model with no startup effects
    pub fn first(model: M) -> Self {
        Self {
            model,
            effects: Vec::new(),
        }
    }

    /// Start from a model with the given startup effects
    pub fn with_effects(model: M, effects: impl IntoIterator<Item = F>) -> Self {
        Self {
            model,
            effects: effects.into_iter().collect(),
        }
    }
}

/// Startup computation, invoked exactly once when a host is constructed.
pub trait Init<M, F> {
    /// Turn the model to start from into the loop's starting point
    fn init(&self, model: M) -> Result<First<M, F>>;
}

impl<M, F, T> Init<M, F> for T
where
    T: Fn(M) -> Result<First<M, F>>,
{
    fn init(&self, model: M) -> Result<First<M, F>> {
        self(model)
    }
}

/// Init that starts from the given model without effects.
pub fn identity_init<M, F>(model: M) -> Result<First<M, F>> {
    Ok(First::first(model))
}

/// A running computation loop.
///
/// Implementations own the authoritative model while they are alive and must
/// tolerate `dispatch_event` from any thread without blocking on event
/// processing.
pub trait EventLoop<M, E>: Send + Sync {
    /// Register an observer for every model the loop produces
    fn observe(&self, observer: ModelObserver<M>);

    /// Push an event into the loop's input channel
    fn dispatch_event(&self, event: E) -> Result<()>;

    /// The most recent model, if the loop has produced one
    fn most_recent_model(&self) -> Option<M>;

    /// Stop the loop and release its resources
    fn dispose(&self);
}

/// Builds and starts a loop.
pub trait LoopFactory<M, E, F> {
    /// Loop type produced by this factory
    type Loop: EventLoop<M, E> + 'static;

    /// Start a loop from the given model, running the startup effects
    fn start_from(self, model: M, effects: Vec<F>) -> Result<Self::Loop>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoopViewError;

    #[test]
    fn test_first_without_effects() {
        let first: First<u32, &str> = First::first(7);
        assert_eq!(first.model, 7);
        assert!(first.effects.is_empty());
    }

    #[test]
    fn test_first_with_effects() {
        let first = First::with_effects("m0", vec!["load", "track"]);
        assert_eq!(first.model, "m0");
        assert_eq!(first.effects, vec!["load", "track"]);
    }

    #[test]
    fn test_closure_init() {
        let init = |model: u32| -> Result<First<u32, String>> {
            Ok(First::with_effects(model + 1, vec!["fetch".to_string()]))
        };
        let first = init.init(1).unwrap();
        assert_eq!(first.model, 2);
        assert_eq!(first.effects, vec!["fetch".to_string()]);
    }

    #[test]
    fn test_failing_init() {
        let init =
            |_model: u32| -> Result<First<u32, ()>> { Err(LoopViewError::Init("no session".into())) };
        let err = init.init(0).unwrap_err();
        assert!(matches!(err, LoopViewError::Init(_)));
    }

    #[test]
    fn test_identity_init() {
        let first: First<&str, ()> = identity_init("start").unwrap();
        assert_eq!(first.model, "start");
        assert!(first.effects.is_empty());
    }
}
