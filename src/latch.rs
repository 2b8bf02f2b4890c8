//! # Latch: single-slot wake primitive with timeout-based waits.
//!
//! A [`Latch`] lets many producers wake one consumer. Producers call
//! [`Latch::set`] (cheap, non-blocking, safe from any task or thread); the
//! consumer alternates [`Latch::wait`] and [`Latch::reset`]:
//!
//! ```text
//!  producers                    consumer
//!  ─────────                    ────────
//!  set() ──► flag := true ──►   wait(timeout, mask)   ok to call before wait:
//!            notify             reset()               the set is not lost
//!                               …act on flags…
//! ```
//!
//! ## Semantics
//!
//! - A set that happens while nobody waits completes the *next* wait
//!   immediately. Sets never queue: any number of sets before a wait produce
//!   one wake.
//! - [`Latch::wait`] also wakes on timeout expiry and on parent-death (the
//!   supervising process's cancellation token firing), reporting the reason
//!   as a [`Wake`] mask.
//! - [`Latch::reset`] clears the set flag and is idempotent. The consumer
//!   resets *first* and reads its request flags *after*, so a set that races
//!   with the reset is either folded into the current pass or wakes the next
//!   wait.
//!
//! The latch carries no payload. What woke you tells you to look; request
//! flags (see [`SignalBridge`](crate::SignalBridge)) tell you what to do.

use std::ops::{BitOr, BitOrAssign};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Wake conditions, used both as the wait mask and as the returned reason.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Wake(u8);

impl Wake {
    /// Empty mask / empty reason.
    pub const NONE: Wake = Wake(0);
    /// The latch was set.
    pub const LATCH_SET: Wake = Wake(0b001);
    /// The wait's timeout expired.
    pub const TIMEOUT: Wake = Wake(0b010);
    /// The supervising process is gone.
    pub const PARENT_DEATH: Wake = Wake(0b100);

    /// All conditions a worker loop normally waits on.
    pub const ALL: Wake = Wake(0b111);

    /// Whether every bit of `other` is present in `self`.
    pub const fn contains(self, other: Wake) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no condition is present.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Wake {
    type Output = Wake;

    fn bitor(self, rhs: Wake) -> Wake {
        Wake(self.0 | rhs.0)
    }
}

impl BitOrAssign for Wake {
    fn bitor_assign(&mut self, rhs: Wake) {
        self.0 |= rhs.0;
    }
}

/// Single-slot wake primitive. See the [module docs](self) for semantics.
#[derive(Debug)]
pub struct Latch {
    set: AtomicBool,
    notify: Notify,
    parent: CancellationToken,
}

impl Latch {
    /// Creates a latch whose waits also complete when `parent` is cancelled.
    pub fn new(parent: CancellationToken) -> Self {
        Self {
            set: AtomicBool::new(false),
            notify: Notify::new(),
            parent,
        }
    }

    /// Sets the latch.
    ///
    /// One atomic store and one notify edge; never blocks, never allocates,
    /// safe to call from any task or thread, including before anyone waits.
    pub fn set(&self) {
        self.set.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Clears the set flag. Idempotent; only the waiting side calls this.
    pub fn reset(&self) {
        self.set.store(false, Ordering::SeqCst);
    }

    /// Whether the latch is currently set.
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::SeqCst)
    }

    /// Waits until any condition in `mask` holds, returning the conditions
    /// observed at wake time.
    ///
    /// Conditions that already hold complete the wait immediately; in
    /// particular a set that happened before this call is honored without
    /// sleeping. When several conditions race, parent-death wins over the
    /// latch, which wins over the timeout.
    ///
    /// An empty `mask` returns [`Wake::NONE`] immediately.
    pub async fn wait(&self, timeout: Duration, mask: Wake) -> Wake {
        let mut reason = Wake::NONE;
        if mask.contains(Wake::PARENT_DEATH) && self.parent.is_cancelled() {
            reason |= Wake::PARENT_DEATH;
        }
        if mask.contains(Wake::LATCH_SET) && self.is_set() {
            reason |= Wake::LATCH_SET;
        }
        if !reason.is_empty() {
            return reason;
        }

        let sleep = tokio::time::sleep(timeout);
        tokio::pin!(sleep);

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);

            // A set may land between the pre-check above and the waiter being
            // armed; checking again after arming closes that window.
            if mask.contains(Wake::LATCH_SET) && self.is_set() {
                return Wake::LATCH_SET;
            }

            tokio::select! {
                biased;

                _ = self.parent.cancelled(), if mask.contains(Wake::PARENT_DEATH) => {
                    return Wake::PARENT_DEATH;
                }
                _ = &mut notified, if mask.contains(Wake::LATCH_SET) => {
                    if self.is_set() {
                        return Wake::LATCH_SET;
                    }
                    // A stale permit from a set that an earlier wait already
                    // observed through its pre-check. Consume it and re-arm;
                    // the timeout keeps ticking.
                }
                _ = sleep.as_mut(), if mask.contains(Wake::TIMEOUT) => {
                    return Wake::TIMEOUT;
                }
                else => {
                    return Wake::NONE;
                }
            }
        }
    }
}
