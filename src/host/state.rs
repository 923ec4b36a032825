//! Disposal state machine shared by a host and the handles it gives out.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

const ACTIVE: u8 = 0;
const DISPOSING: u8 = 1;
const DISPOSED: u8 = 2;

/// Lifecycle of a [`LoopHost`](super::LoopHost).
///
/// `Active -> Disposing -> Disposed`, one way, driven only by `dispose()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// Accepting events and forwarding models and signals
    Active,
    /// Flag flipped, loop being released
    Disposing,
    /// Loop released
    Disposed,
}

impl HostState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            ACTIVE => Self::Active,
            DISPOSING => Self::Disposing,
            _ => Self::Disposed,
        }
    }

    /// Whether this is the terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disposed)
    }
}

impl fmt::Display for HostState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Disposing => write!(f, "disposing"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

/// Atomic cell holding a [`HostState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ACTIVE))
    }

    pub(crate) fn get(&self) -> HostState {
        HostState::from_raw(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire) == ACTIVE
    }

    /// Flip `Active -> Disposing`; false if someone else already did.
    pub(crate) fn begin_disposal(&self) -> bool {
        self.0
            .compare_exchange(ACTIVE, DISPOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn finish_disposal(&self) {
        self.0.store(DISPOSED, Ordering::Release);
    }
}
