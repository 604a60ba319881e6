//! Non-blocking single-holder gate
//!
//! A `Gate` is a capacity-1 slot. Claiming it never waits: if somebody already
//! holds it, `try_acquire` fails straight away with [`GateError::AlreadyLocked`].
//! This is the "try, and if busy, skip" primitive used to collapse bursts of
//! reconnect requests into a single dial and to keep the management loop from
//! being started twice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Gate contention and misuse errors
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum GateError {
    /// The slot is held by someone else
    #[error("gate is already locked")]
    AlreadyLocked,
    /// The guard was released more than once
    #[error("gate guard was already released")]
    AlreadyReleased,
}

/// Shared try-lock slot. Clones refer to the same slot.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    held: Arc<AtomicBool>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot without blocking
    pub fn try_acquire(&self) -> Result<GateGuard, GateError> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| GateGuard {
                held: Arc::clone(&self.held),
                released: false,
            })
            .map_err(|_| GateError::AlreadyLocked)
    }

    /// Peek at the slot without changing its occupancy
    pub fn is_locked(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Proof of holding a [`Gate`].
///
/// The slot is freed by [`GateGuard::release`] or, failing that, when the guard
/// is dropped. Guards own a handle to the slot, so they can be moved into
/// spawned tasks.
#[derive(Debug)]
#[must_use = "dropping the guard releases the gate immediately"]
pub struct GateGuard {
    held: Arc<AtomicBool>,
    released: bool,
}

impl GateGuard {
    /// Free the slot. A second call reports [`GateError::AlreadyReleased`]
    /// and leaves the slot alone, since it may belong to a new holder by then.
    pub fn release(&mut self) -> Result<(), GateError> {
        if self.released {
            return Err(GateError::AlreadyReleased);
        }
        self.released = true;
        self.held.store(false, Ordering::Release);
        Ok(())
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        if !self.released {
            self.held.store(false, Ordering::Release);
        }
    }
}
