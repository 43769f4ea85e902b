use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A concurrent cell holding at most one value.
///
/// Writes overwrite unconditionally (freshest wins, no queue growth);
/// reads are destructive. The lock is held only for the slot swap.
#[derive(Debug, Default)]
pub struct Mailbox<T> {
    slot: Mutex<Option<T>>,
    cond: Condvar,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            cond: Condvar::new(),
        }
    }

    /// Deposit a value, replacing any unconsumed one.
    pub fn post(&self, value: T) {
        let mut slot = self.slot.lock();
        *slot = Some(value);
        drop(slot);
        self.cond.notify_one();
    }

    /// Take the value, if any, leaving the slot empty.
    pub fn take(&self) -> Option<T> {
        self.slot.lock().take()
    }

    /// Take the value, waiting up to `timeout` for one to arrive.
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            self.cond.wait_for(&mut slot, timeout);
        }
        slot.take()
    }
}
