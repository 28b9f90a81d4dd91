//! # Fault injection
//!
//! A deliberately slow read-modify-write for the ticket and turn counters.
//! It reads the old value, sleeps while holding it, then writes back
//! `old + amount` modulo the capacity. Any window in which another thread
//! could sneak in between the read and the write is stretched to `hold`, which
//! makes broken lock implementations fail loudly in stress tests.
//!
//! Only compiled with the `fault-injection` feature.
//!
//! ```rust
//! use std::time::Duration;
//! use axiom_ticketlock::{SlowIncrement, TicketLock};
//!
//! let lock = TicketLock::with_fault_injection(3, SlowIncrement::new(1, Duration::from_millis(1)));
//! let ticket = lock.lock();
//! assert_eq!(ticket.ticket(), 0);
//! lock.unlock();
//! assert_eq!(lock.current_turn(), 1);
//! ```

use std::thread;
use std::time::Duration;

/// Hold time used when none is given.
pub const DEFAULT_HOLD: Duration = Duration::from_millis(25);

/// Parameters of the slowed increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlowIncrement {
    /// Amount added on every step.
    pub amount: u32,
    /// Delay between reading the old value and writing the new one.
    pub hold: Duration,
}

impl SlowIncrement {
    pub const fn new(amount: u32, hold: Duration) -> Self {
        Self { amount, hold }
    }

    /// Computes `(value + amount) mod capacity`, after sleeping for `hold`.
    pub fn apply(&self, value: u32, capacity: u32) -> u32 {
        if !self.hold.is_zero() {
            thread::sleep(self.hold);
        }
        ((u64::from(value) + u64::from(self.amount)) % u64::from(capacity)) as u32
    }
}

impl Default for SlowIncrement {
    fn default() -> Self {
        Self::new(1, DEFAULT_HOLD)
    }
}
