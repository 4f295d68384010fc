//! [`DispatchGuard`] – the single busy flag of the controller.
//!
//! The router and gate form one mechanism; commands from two overlapping
//! sequences would leave it in an undefined physical state.  The guard makes
//! "at most one sequence in flight" structural: the flag can only be set by
//! acquiring a token, and it is cleared when that token is dropped, whether
//! the sequence returned normally or unwound.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide busy flag guarding the servo mechanism.
#[derive(Debug, Default)]
pub struct DispatchGuard {
    busy: AtomicBool,
}

impl DispatchGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim the mechanism.  Returns `None` if a sequence already
    /// holds it.
    pub fn try_acquire(&self) -> Option<BusyToken<'_>> {
        self.claim().then_some(BusyToken { guard: self })
    }

    /// Like [`try_acquire`][Self::try_acquire] but the token owns a handle to
    /// the guard, so it can be moved to another thread.
    pub fn try_acquire_owned(self: &Arc<Self>) -> Option<OwnedBusyToken> {
        self.claim().then(|| OwnedBusyToken {
            guard: Arc::clone(self),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn claim(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn clear(&self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Proof that the caller holds the mechanism.  Clears the flag on drop.
#[must_use = "the guard is released as soon as the token is dropped"]
#[derive(Debug)]
pub struct BusyToken<'a> {
    guard: &'a DispatchGuard,
}

impl Drop for BusyToken<'_> {
    fn drop(&mut self) {
        self.guard.clear();
    }
}

/// `'static` variant of [`BusyToken`] for offloaded sequences.
#[must_use = "the guard is released as soon as the token is dropped"]
#[derive(Debug)]
pub struct OwnedBusyToken {
    guard: Arc<DispatchGuard>,
}

impl Drop for OwnedBusyToken {
    fn drop(&mut self) {
        self.guard.clear();
    }
}
