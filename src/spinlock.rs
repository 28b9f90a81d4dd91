//! # SpinLock
//!
//! A test-and-set lock built directly on [`xchg`]. The lock word holds
//! `0` when free and `1` when held; acquiring means exchanging `1` in until
//! the exchange hands back `0`.
//!
//! Inside this crate it serializes ticket issuance in
//! [`TicketLock`](crate::TicketLock): the protected value is the next ticket
//! number. It is public because it is a perfectly usable lock for very short
//! critical sections on its own.
//!
//! ## Safety
//! - The `SpinLock` is **not fair**: a waiter can lose every race under
//!   contention. Use [`TicketLock`](crate::TicketLock) when order matters.
//! - It is **not reentrant**. Locking twice from the same thread spins forever.
//! - It should **not** be held across system calls or long-running operations.
//!
//! ## Example
//! ```rust
//! use axiom_ticketlock::SpinLock;
//!
//! static NEXT_ID: SpinLock<u32> = SpinLock::new(0);
//!
//! fn allocate() -> u32 {
//!     NEXT_ID.with_lock(|next| {
//!         let id = *next;
//!         *next += 1;
//!         id
//!     })
//! }
//!
//! assert_eq!(allocate(), 0);
//! assert_eq!(allocate(), 1);
//! ```

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::Ordering::{Acquire, Release};

use crate::xchg::{xchg, AtomicWord};
use crate::BackOff;

const FREE: u32 = 0;
const HELD: u32 = 1;

/// A spin-based mutual exclusion primitive over an exchange-driven lock word.
///
/// No queue and no owner identity are kept: the word only says whether
/// somebody holds the lock.
pub struct SpinLock<T> {
    data: UnsafeCell<T>,
    state: AtomicWord,
}

/// A guard that releases the [`SpinLock`] when dropped.
///
/// Returned from [`SpinLock::lock`]; derefs to the protected value.
pub struct SpinGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Drop for SpinGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.state.store(FREE, Release)
    }
}

impl<T> SpinLock<T> {
    /// Creates a new, unlocked [`SpinLock`] wrapping `data`.
    #[inline(always)]
    pub const fn new(data: T) -> Self {
        SpinLock {
            data: UnsafeCell::new(data),
            state: AtomicWord::new(FREE),
        }
    }

    /// Acquires the lock, spinning until the exchange returns `0`.
    ///
    /// Between failed exchanges the waiter backs off exponentially and only
    /// retries the exchange once a plain load sees the word free, which keeps
    /// the cache line shared while the holder works.
    #[inline]
    pub fn lock(&self) -> SpinGuard<'_, T> {
        let backoff = BackOff::new();
        while xchg(&self.state, HELD) == HELD {
            while self.state.load(Acquire) == HELD {
                backoff.wait();
            }
        }

        SpinGuard { lock: self }
    }

    /// Releases the lock without a guard.
    ///
    /// # Safety
    /// - Only call this if you *own* the lock, e.g. after
    ///   [`mem::forget`](core::mem::forget)ting its guard.
    /// - Misuse lets two threads into the critical section.
    #[inline]
    pub unsafe fn unlock(&self) {
        self.state.store(FREE, Release);
    }

    /// Attempts a single exchange.
    ///
    /// Returns `Some(SpinGuard)` if the lock was free, or `None` otherwise.
    #[inline]
    pub fn try_lock(&self) -> Option<SpinGuard<'_, T>> {
        if xchg(&self.state, HELD) == FREE {
            Some(SpinGuard { lock: self })
        } else {
            None
        }
    }

    /// Checks whether the lock is currently held.
    #[inline(always)]
    pub fn is_locked(&self) -> bool {
        self.state.load(Acquire) == HELD
    }

    /// Runs a closure with exclusive access to the data.
    #[inline]
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut *guard)
    }

    /// Consumes the lock and returns the protected value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T> Deref for SpinGuard<'_, T> {
    type Target = T;
    #[inline(always)]
    fn deref(&self) -> &T {
        // SAFETY: the guard exists only while the lock word is held.
        unsafe { &*(self.lock.data.get()) }
    }
}

impl<T> DerefMut for SpinGuard<'_, T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut Self::Target {
        // SAFETY: as above, and `&mut self` makes this the only live borrow.
        unsafe { &mut *self.lock.data.get() }
    }
}

// Safety: SpinLock enforces mutual exclusion via atomic operations.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}
