//! Single-slot lock-free mailbox for `f64` levels
//!
//! Holds at most one value; a put overwrites whatever is pending. Levels
//! are always finite, so a reserved NaN bit pattern marks the empty slot.

use std::sync::atomic::{AtomicU64, Ordering};

const EMPTY: u64 = 0x7ff4_0000_0000_dead;

pub struct Mailbox {
    slot: AtomicU64,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            slot: AtomicU64::new(EMPTY),
        }
    }

    /// Store `value`, replacing any pending one
    ///
    /// Returns `true` if an undelivered value was overwritten. Non-finite
    /// values are dropped.
    pub fn put(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.slot.swap(value.to_bits(), Ordering::AcqRel) != EMPTY
    }

    /// Store `value` only if nothing is pending
    pub fn put_if_empty(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        self.slot
            .compare_exchange(EMPTY, value.to_bits(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Take the pending value, leaving the slot empty
    pub fn take(&self) -> Option<f64> {
        let bits = self.slot.swap(EMPTY, Ordering::AcqRel);
        (bits != EMPTY).then(|| f64::from_bits(bits))
    }

    pub fn is_empty(&self) -> bool {
        self.slot.load(Ordering::Acquire) == EMPTY
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
