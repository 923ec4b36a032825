//! Observer attachment tokens.
//!
//! Each attach or observe call draws a fresh generation, letting a view undo
//! only its own attachment.

use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one attachment of an observer.
///
/// Returned by attach/observe calls so a view can later detach itself without
/// evicting an observer that replaced it in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(u64);

impl ObserverToken {
    /// Attachment generation, starting at 1
    pub const fn generation(&self) -> u64 {
        self.0
    }
}

/// Monotonic generation clock for observer attachments.
#[derive(Debug, Default)]
pub(crate) struct TokenClock {
    next: AtomicU64,
}

impl TokenClock {
    pub(crate) fn next(&self) -> ObserverToken {
        ObserverToken(self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1))
    }
}
