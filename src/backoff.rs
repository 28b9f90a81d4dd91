//! # BackOff
//!
//! Spin pacing for the busy-wait loops in [`SpinLock`](crate::SpinLock) and
//! [`TicketLock`](crate::TicketLock).
//!
//! Two shapes of waiting are provided:
//!
//! - **Exponential** ([`BackOff::wait`]) for the test-and-set spinlock, where a
//!   waiter has no idea how long the holder will take and every retry is a
//!   contended exchange on the same cache line.
//! - **Proportional** ([`BackOff::wait_turns`]) for the ticket lock, where a
//!   waiter knows exactly how many tickets are ahead of it and can stay off the
//!   `current_turn` cache line for roughly that many critical sections.
//!
//! Both spin on [`core::hint::spin_loop`]. With the `std` feature a long
//! exponential wait, or a ticket wait with others still queued ahead, also
//! yields the thread, so an oversubscribed machine still makes progress.
//!
//! ## Example
//! ```rust
//! use axiom_ticketlock::BackOff;
//!
//! let backoff = BackOff::new();
//! let mut tries = 0;
//! while tries < 3 {
//!     tries += 1;
//!     backoff.wait();
//! }
//! assert!(backoff.current() > 32);
//! ```

use core::{cell::Cell, hint::spin_loop};

/// Maximum spin iteration limit for a single exponential wait.
const MAX_SPIN: u32 = 1 << 16;

/// Default starting spin count.
const START_VALUE: u32 = 1 << 5;

/// Pause hints issued per ticket of distance in [`BackOff::wait_turns`].
const TURN_UNIT: u32 = 1 << 6;

/// Ceiling for a single proportional wait.
const MAX_TURN_SPIN: u32 = 1 << 14;

/// Yield threshold used only under the `std` feature.
#[cfg(feature = "std")]
const YIELD_THRESHOLD: u32 = 1 << 10;

/// Per-waiter spin pacing state.
///
/// Lives on the waiting thread's stack and is `!Sync`.
pub struct BackOff {
    spin: Cell<u32>,
}

impl BackOff {
    /// Creates a [`BackOff`] at the default starting spin count.
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            spin: Cell::new(START_VALUE),
        }
    }

    /// Spins for the current count, then doubles it (up to a ceiling).
    #[inline]
    pub fn wait(&self) {
        let end = self.spin.get();
        spin(end);
        self.spin.set((end << 1).min(MAX_SPIN));

        #[cfg(feature = "std")]
        if end > YIELD_THRESHOLD {
            std::thread::yield_now();
        }
    }

    /// Spins proportionally to `distance`, the number of tickets still ahead
    /// of the caller.
    ///
    /// A `distance` of zero or one spins a single unit, so the waiter re-reads
    /// the turn promptly when it is next in line. Under `std`, a waiter with
    /// others still ahead of it also yields.
    ///
    /// ```rust
    /// use axiom_ticketlock::BackOff;
    ///
    /// let backoff = BackOff::new();
    /// backoff.wait_turns(3);
    /// assert_eq!(backoff.current(), 3 * 64);
    /// ```
    #[inline]
    pub fn wait_turns(&self, distance: u32) {
        let end = distance
            .max(1)
            .saturating_mul(TURN_UNIT)
            .min(MAX_TURN_SPIN);
        self.spin.set(end);
        spin(end);

        #[cfg(feature = "std")]
        if distance > 1 {
            std::thread::yield_now();
        }
    }

    /// Returns the spin count used by the last wait.
    #[inline(always)]
    pub fn current(&self) -> u32 {
        self.spin.get()
    }
}

#[inline(always)]
fn spin(iterations: u32) {
    for _ in 0..iterations {
        spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_growth_is_capped() {
        let b = BackOff::new();

        let mut prev = b.current();
        for _ in 0..20 {
            b.wait();
            let curr = b.current();
            assert!(curr >= prev, "Backoff spin did not grow");
            prev = curr;
        }

        assert_eq!(b.current(), MAX_SPIN, "Backoff should settle at MAX_SPIN");
    }

    #[test]
    fn test_turn_wait_scales_with_distance() {
        let b = BackOff::new();

        b.wait_turns(0);
        assert_eq!(b.current(), TURN_UNIT);

        b.wait_turns(4);
        assert_eq!(b.current(), 4 * TURN_UNIT);

        b.wait_turns(u32::MAX);
        assert_eq!(b.current(), MAX_TURN_SPIN, "Distance wait must be capped");
    }
}
