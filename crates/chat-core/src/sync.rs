//! Generic blocking synchronization primitives backing the Thread Bridge.
//!
//! §9's Design Notes describe the two-thread coordination as "a bounded
//! (capacity 1) channel for `inbox`, an atomic cell for `request`, and an
//! atomic for `talk_state`." [`OneSlot`] is that bounded-1 channel: the
//! producer blocks while full, the consumer blocks while empty, matching
//! the blocking-I/O implementation §9 calls for (no async runtime is
//! involved anywhere in this workspace). [`NonBlockingCell`] is the atomic
//! cell: `try_insert` never blocks and reports whether it won the slot.

use std::sync::{Condvar, Mutex};

/// A bounded, capacity-1 blocking slot used for producer/consumer handoff.
///
/// `put` blocks while the slot is occupied; `take` blocks while the slot is
/// empty. [`OneSlot::force_release`] unblocks every waiter by installing a
/// sentinel value and flipping an internal released flag that all further
/// operations check first.
pub struct OneSlot<T> {
    state: Mutex<SlotState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

struct SlotState<T> {
    value: Option<T>,
    released: bool,
}

impl<T: Clone> OneSlot<T> {
    /// Create an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                value: None,
                released: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Store `value`, blocking until any prior value has been consumed.
    ///
    /// Returns `false` without storing if the slot has been released.
    pub fn put(&self, value: T) -> bool {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.released {
                return false;
            }
            if state.value.is_none() {
                state.value = Some(value);
                self.not_empty.notify_one();
                return true;
            }
            state = self.not_full.wait(state).unwrap();
        }
    }

    /// Block until a value is available, then return it.
    ///
    /// Returns `None` if the slot was released while waiting (or had
    /// already been released) instead of ever holding a real value.
    pub fn take(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(value) = state.value.take() {
                self.not_full.notify_one();
                return Some(value);
            }
            if state.released {
                return None;
            }
            state = self.not_empty.wait(state).unwrap();
        }
    }

    /// Like [`Self::take`], but gives up and returns `None` if no value
    /// arrives within `timeout` (used for the 10-second control-reply and
    /// 30-second handshake deadlines, §5).
    pub fn take_timeout(&self, timeout: std::time::Duration) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(value) = state.value.take() {
                self.not_full.notify_one();
                return Some(value);
            }
            if state.released {
                return None;
            }
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return None;
            }
            let (guard, result) = self.not_empty.wait_timeout(state, remaining).unwrap();
            state = guard;
            if result.timed_out() && state.value.is_none() {
                return None;
            }
        }
    }

    /// Unblock every current and future waiter.
    ///
    /// If `sentinel` is provided it is installed so a blocked `take` returns
    /// `Some(sentinel)` exactly once before subsequent calls return `None`;
    /// passing `None` makes every subsequent `take` return `None` directly.
    /// No further `put` succeeds after this call.
    pub fn force_release(&self, sentinel: Option<T>) {
        let mut state = self.state.lock().unwrap();
        state.released = true;
        if sentinel.is_some() {
            state.value = sentinel;
        }
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

impl<T: Clone> Default for OneSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A non-blocking, capacity-1 cell: at most one pending value, insertion
/// rejected (not overwritten) while occupied.
pub struct NonBlockingCell<T> {
    value: Mutex<Option<T>>,
}

impl<T> NonBlockingCell<T> {
    /// Create an empty cell.
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }

    /// Insert `value` if the cell is empty.
    ///
    /// Returns `true` if `value` was stored, `false` if the cell already
    /// held a value (in which case `value` is dropped, matching the
    /// "duplicate = drop + reject" rule for peer-initiated talk requests).
    pub fn try_insert(&self, value: T) -> bool {
        let mut slot = self.value.lock().unwrap();
        if slot.is_some() {
            false
        } else {
            *slot = Some(value);
            true
        }
    }

    /// Return the current value without blocking, leaving it in place.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        self.value.lock().unwrap().clone()
    }

    /// Remove and return the current value, if any.
    pub fn take(&self) -> Option<T> {
        self.value.lock().unwrap().take()
    }
}

impl<T> Default for NonBlockingCell<T> {
    fn default() -> Self {
        Self::new()
    }
}
