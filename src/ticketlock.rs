//! # TicketLock
//!
//! A fair (FIFO) spin lock. Callers take a numbered ticket and wait until the
//! lock's turn counter reaches it; releasing the lock advances the turn by
//! one, admitting exactly the next ticket holder.
//!
//! Ticket and turn both count modulo a fixed `capacity` chosen at
//! construction, so neither counter can overflow. The price is a sizing rule:
//!
//! > `capacity` must be at least the number of `lock()` calls that can be
//! > outstanding (issued but not yet released) at the same time.
//!
//! If more callers than that queue up, two of them end up holding the same
//! ticket number. Entry is still guarded by an occupancy word taken with
//! [`xchg`] once the turn matches, so aliased callers take turns instead of
//! entering together: mutual exclusion holds for any capacity, and
//! `capacity == 1` is a plain (unfair) spin mutex. What aliasing costs is
//! order. Callers sharing a number race for their turn, so a later arrival
//! can overtake an earlier one. Use [`TicketLock::for_contenders`] to reject
//! undersized configurations up front.
//!
//! Ticket issuance is serialized by an inner [`SpinLock`] around the
//! next-ticket counter. The turn counter is a plain atomic: only the current
//! holder ever writes it, and waiters only read it.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//! use axiom_ticketlock::TicketLock;
//!
//! let lock = Arc::new(TicketLock::new(4));
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let lock = lock.clone();
//!         thread::spawn(move || {
//!             let ticket = lock.lock();
//!             // critical section
//!             lock.unlock();
//!             ticket.ticket()
//!         })
//!     })
//!     .collect();
//!
//! let mut tickets: Vec<u32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
//! tickets.sort();
//! assert_eq!(tickets, [0, 1, 2, 3]);
//! ```
//!
//! ## Misuse
//! - Calling [`lock`](TicketLock::lock) twice without an intervening
//!   [`unlock`](TicketLock::unlock) deadlocks the caller against itself.
//! - Calling [`unlock`](TicketLock::unlock) without holding the lock skips a
//!   waiter's turn and can starve every later waiter. Debug builds panic when
//!   the lock is not occupied at all.

use core::sync::atomic::{
    AtomicU32,
    Ordering::{Acquire, Relaxed, Release},
};

use log::debug;

use crate::xchg::{xchg, AtomicWord};
use crate::{BackOff, CapacityError, SpinLock, Ticket};

#[cfg(feature = "fault-injection")]
use crate::fault::SlowIncrement;

const VACANT: u32 = 0;
const OCCUPIED: u32 = 1;

/// A fair mutual-exclusion lock admitting callers in ticket order.
///
/// Unlike [`SpinLock`] it protects no data of its own; pair every
/// [`lock`](Self::lock) with one [`unlock`](Self::unlock), or use
/// [`acquire`](Self::acquire) / [`with_lock`](Self::with_lock) to have that
/// done for you.
pub struct TicketLock {
    capacity: u32,
    next_ticket: SpinLock<u32>,
    current_turn: AtomicU32,
    occupied: AtomicWord,
    #[cfg(feature = "fault-injection")]
    fault: Option<SlowIncrement>,
}

/// Releases its [`TicketLock`] when dropped.
///
/// Returned from [`TicketLock::acquire`].
pub struct TicketGuard<'a> {
    lock: &'a TicketLock,
    ticket: Ticket,
}

impl TicketGuard<'_> {
    /// The ticket this guard was admitted with.
    #[inline(always)]
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }
}

impl Drop for TicketGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

impl TicketLock {
    /// Creates a lock handing out tickets in `[0, capacity)`.
    ///
    /// # Panics
    /// If `capacity` is zero.
    ///
    /// ```rust
    /// use axiom_ticketlock::TicketLock;
    ///
    /// static LOCK: TicketLock = TicketLock::new(16);
    /// assert_eq!(LOCK.capacity(), 16);
    /// ```
    #[inline]
    pub const fn new(capacity: u32) -> Self {
        assert!(capacity > 0, "ticket lock capacity must be at least 1");
        TicketLock {
            capacity,
            next_ticket: SpinLock::new(0),
            current_turn: AtomicU32::new(0),
            occupied: AtomicWord::new(VACANT),
            #[cfg(feature = "fault-injection")]
            fault: None,
        }
    }

    /// Creates a lock after checking that `capacity` covers `contenders`
    /// simultaneous callers.
    ///
    /// ```rust
    /// use axiom_ticketlock::{CapacityError, TicketLock};
    ///
    /// assert!(TicketLock::for_contenders(8, 8).is_ok());
    /// assert_eq!(
    ///     TicketLock::for_contenders(2, 3).err(),
    ///     Some(CapacityError::TooSmall { capacity: 2, contenders: 3 })
    /// );
    /// ```
    pub fn for_contenders(capacity: u32, contenders: u32) -> Result<Self, CapacityError> {
        CapacityError::check(capacity, contenders)?;

        debug!("ticket lock: capacity {capacity} for {contenders} contenders");
        Ok(Self::new(capacity))
    }

    /// Creates a lock whose ticket and turn increments go through `fault`.
    ///
    /// Test-only: every issuance and every release sleeps for `fault.hold`.
    ///
    /// # Panics
    /// If `capacity` is zero.
    #[cfg(feature = "fault-injection")]
    pub fn with_fault_injection(capacity: u32, fault: SlowIncrement) -> Self {
        log::warn!(
            "ticket lock: fault injection enabled (amount {}, hold {:?})",
            fault.amount,
            fault.hold
        );
        let mut lock = Self::new(capacity);
        lock.fault = Some(fault);
        lock
    }

    /// Takes a ticket and spins until it is served.
    ///
    /// Does not return until the caller holds the lock. The returned
    /// [`Ticket`] records the number issued and the turn seen on arrival.
    pub fn lock(&self) -> Ticket {
        let ticket = self.next_ticket.with_lock(|next| {
            let issued = *next;
            *next = self.advance(issued);
            issued
        });

        let initial_turn = self.current_turn.load(Acquire);
        let mut turn = initial_turn;
        let backoff = BackOff::new();
        while !(turn == ticket && self.try_enter(ticket)) {
            backoff.wait_turns(self.distance(turn, ticket));
            turn = self.current_turn.load(Acquire);
        }

        Ticket::new(ticket, initial_turn)
    }

    /// Passes the lock to the next ticket.
    ///
    /// Must be called exactly once per [`lock`](Self::lock), by the caller
    /// that lock returned to.
    pub fn unlock(&self) {
        debug_assert!(
            self.occupied.load(Relaxed) == OCCUPIED,
            "unlock() called on a TicketLock that is not held"
        );

        // Only the occupant writes the turn, so the read needs no ordering.
        let turn = self.current_turn.load(Relaxed);
        self.current_turn.store(self.advance(turn), Release);
        self.occupied.store(VACANT, Release);
    }

    /// Locks and returns a guard that unlocks on drop.
    #[inline]
    pub fn acquire(&self) -> TicketGuard<'_> {
        let ticket = self.lock();
        TicketGuard { lock: self, ticket }
    }

    /// Runs `f` while holding the lock.
    ///
    /// ```rust
    /// use axiom_ticketlock::TicketLock;
    ///
    /// let lock = TicketLock::new(2);
    /// let served = lock.with_lock(|ticket| ticket.ticket());
    /// assert_eq!(served, 0);
    /// assert_eq!(lock.current_turn(), 1);
    /// ```
    #[inline]
    pub fn with_lock<R>(&self, f: impl FnOnce(Ticket) -> R) -> R {
        let guard = self.acquire();
        f(guard.ticket())
    }

    /// Number of distinct tickets.
    #[inline(always)]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// The ticket currently allowed to proceed.
    #[inline]
    pub fn current_turn(&self) -> u32 {
        self.current_turn.load(Acquire)
    }

    /// The ticket the next caller of [`lock`](Self::lock) will receive.
    ///
    /// Briefly takes the issuance spinlock.
    #[inline]
    pub fn next_ticket(&self) -> u32 {
        *self.next_ticket.lock()
    }

    /// Whether some caller is between [`lock`](Self::lock) and
    /// [`unlock`](Self::unlock).
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.occupied.load(Acquire) == OCCUPIED
    }

    /// Claims the occupancy word for a caller whose ticket matched the turn.
    ///
    /// The turn is read again once the word is ours: an aliased occupant may
    /// have advanced it between our first read and its release.
    #[inline]
    fn try_enter(&self, ticket: u32) -> bool {
        if xchg(&self.occupied, OCCUPIED) == OCCUPIED {
            return false;
        }
        if self.current_turn.load(Acquire) == ticket {
            return true;
        }
        self.occupied.store(VACANT, Release);
        false
    }

    #[inline]
    fn advance(&self, value: u32) -> u32 {
        #[cfg(feature = "fault-injection")]
        if let Some(fault) = &self.fault {
            return fault.apply(value, self.capacity);
        }

        // value < capacity <= u32::MAX, so the add cannot overflow.
        (value + 1) % self.capacity
    }

    /// Tickets between `turn` and `ticket`, walking forward modulo capacity.
    #[inline]
    fn distance(&self, turn: u32, ticket: u32) -> u32 {
        if ticket >= turn {
            ticket - turn
        } else {
            self.capacity - turn + ticket
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    /// Runs `threads` workers doing `iterations` lock / read / write / unlock
    /// rounds on a shared counter. Returns the final counter and the tickets
    /// in the order they were admitted.
    fn hammer(capacity: u32, threads: u32, iterations: u32) -> (u32, Vec<u32>) {
        let lock = Arc::new(TicketLock::new(capacity));
        let counter = Arc::new(AtomicU32::new(0));
        let admitted = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let lock = lock.clone();
                let counter = counter.clone();
                let admitted = admitted.clone();
                thread::spawn(move || {
                    for _ in 0..iterations {
                        let ticket = lock.lock();
                        admitted.lock().unwrap().push(ticket.ticket());

                        // Split read and write so a second holder would lose updates.
                        let seen = counter.load(Relaxed);
                        thread::yield_now();
                        counter.store(seen + 1, Relaxed);

                        lock.unlock();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        let admitted = Arc::try_unwrap(admitted).unwrap().into_inner().unwrap();
        (counter.load(Relaxed), admitted)
    }

    fn assert_fifo(admitted: &[u32], capacity: u32) {
        assert_eq!(admitted.first(), Some(&0), "First admission must be ticket 0");
        for pair in admitted.windows(2) {
            assert_eq!(
                pair[1],
                (pair[0] + 1) % capacity,
                "Ticket {} admitted right after {}",
                pair[1],
                pair[0]
            );
        }
    }

    #[test]
    fn test_three_threads_exact_count() {
        let (counter, admitted) = hammer(3, 3, 10);

        assert_eq!(counter, 30, "Counter should match total increments");
        assert_eq!(admitted.len(), 30);
        assert_fifo(&admitted, 3);
    }

    #[test]
    fn test_capacity_one_is_plain_mutex() {
        let (counter, admitted) = hammer(1, 5, 5);

        assert_eq!(counter, 25);
        assert!(admitted.iter().all(|&t| t == 0), "Capacity 1 only issues ticket 0");
    }

    #[test]
    fn test_heavy_contention_stays_fifo() {
        let (counter, admitted) = hammer(8, 8, 250);

        assert_eq!(counter, 2_000);
        assert_fifo(&admitted, 8);
    }

    #[test]
    fn test_single_thread_cycles_tickets() {
        let lock = TicketLock::new(4);

        for i in 0..100u32 {
            let ticket = lock.lock();
            assert_eq!(ticket.ticket(), i % 4);
            assert_eq!(ticket.initial_turn(), i % 4);
            assert!(!ticket.waited());
            lock.unlock();
        }

        assert_eq!(lock.current_turn(), 0);
        assert_eq!(lock.next_ticket(), 0);
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let lock = TicketLock::new(3);

        {
            let guard = lock.acquire();
            assert_eq!(guard.ticket().ticket(), 0);
            assert_eq!(lock.next_ticket(), 1);
            assert_eq!(lock.current_turn(), 0);
            assert!(lock.is_locked());
        }

        assert_eq!(lock.current_turn(), 1, "Dropping the guard should pass the turn");
        assert_eq!(lock.with_lock(|t| t.ticket()), 1);
        assert_eq!(lock.current_turn(), 2);
    }

    #[test]
    fn test_for_contenders_validation() {
        assert_eq!(
            TicketLock::for_contenders(0, 0).err(),
            Some(CapacityError::ZeroCapacity)
        );
        assert_eq!(
            TicketLock::for_contenders(2, 3).err(),
            Some(CapacityError::TooSmall {
                capacity: 2,
                contenders: 3
            })
        );

        let lock = TicketLock::for_contenders(5, 5).unwrap();
        assert_eq!(lock.capacity(), 5);
    }

    #[test]
    #[should_panic(expected = "capacity must be at least 1")]
    fn test_zero_capacity_panics() {
        let _ = TicketLock::new(0);
    }

    /// Spawns a thread that locks, records `name` in `admitted`, then unlocks.
    fn contender(
        lock: &Arc<TicketLock>,
        admitted: &Arc<Mutex<Vec<char>>>,
        name: char,
    ) -> thread::JoinHandle<Ticket> {
        let lock = lock.clone();
        let admitted = admitted.clone();
        thread::spawn(move || {
            let ticket = lock.lock();
            admitted.lock().unwrap().push(name);
            lock.unlock();
            ticket
        })
    }

    fn wait_for_next_ticket(lock: &TicketLock, next: u32) {
        while lock.next_ticket() != next {
            thread::yield_now();
        }
    }

    #[test]
    fn test_capacity_one_excludes_second_caller() {
        let lock = Arc::new(TicketLock::new(1));
        let admitted = Arc::new(Mutex::new(Vec::new()));

        let first = lock.lock();
        assert_eq!(first.ticket(), 0);

        let second = contender(&lock, &admitted, 'b');
        thread::sleep(Duration::from_millis(50));
        assert!(!second.is_finished(), "Second caller admitted while the lock was held");
        assert!(admitted.lock().unwrap().is_empty());
        assert!(lock.is_locked());

        lock.unlock();
        let second = second.join().unwrap();
        assert_eq!(second.ticket(), 0, "Capacity 1 only issues ticket 0");
        assert_eq!(*admitted.lock().unwrap(), ['b']);
        assert!(!lock.is_locked());
    }

    /// Capacity 2 with four outstanding callers: tickets alias pairwise, the
    /// aliased callers wait instead of joining the holder, and the two callers
    /// sharing ticket 1 race for their turn regardless of arrival order.
    #[test]
    fn test_undersized_capacity_aliases_tickets() {
        let lock = Arc::new(TicketLock::new(2));
        let admitted = Arc::new(Mutex::new(Vec::new()));

        let holder = lock.lock();
        assert_eq!(holder.ticket(), 0);

        let b = contender(&lock, &admitted, 'b');
        wait_for_next_ticket(&lock, 0);
        let c = contender(&lock, &admitted, 'c');
        wait_for_next_ticket(&lock, 1);
        let d = contender(&lock, &admitted, 'd');
        wait_for_next_ticket(&lock, 0);

        thread::sleep(Duration::from_millis(50));
        assert!(admitted.lock().unwrap().is_empty(), "No one may enter beside the holder");
        assert!(!c.is_finished(), "Aliased ticket 0 admitted while ticket 0 was held");

        lock.unlock();
        let (b, c, d) = (b.join().unwrap(), c.join().unwrap(), d.join().unwrap());

        assert_eq!(c.ticket(), holder.ticket(), "Third caller should alias the holder's ticket");
        assert_eq!(b.ticket(), 1);
        assert_eq!(d.ticket(), b.ticket(), "Fourth caller should alias the second's ticket");

        let order = admitted.lock().unwrap().clone();
        assert_eq!(order.len(), 3);
        assert_eq!(order[1], 'c', "Ticket 0 comes round again between the two ticket-1 callers");
        let mut ones = [order[0], order[2]];
        ones.sort();
        assert_eq!(ones, ['b', 'd']);
        assert_eq!(lock.current_turn(), 0, "Four releases bring the turn back to 0");
        assert_eq!(lock.next_ticket(), 0);
        assert!(!lock.is_locked());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "not held")]
    fn test_unlock_without_lock_panics_in_debug() {
        let lock = TicketLock::new(2);
        lock.unlock();
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "not held")]
    fn test_double_unlock_panics_in_debug() {
        let lock = TicketLock::new(2);
        lock.lock();
        lock.unlock();
        lock.unlock();
    }

    #[cfg(feature = "fault-injection")]
    mod fault_injection {
        use super::*;
        use crate::SlowIncrement;

        #[test]
        fn test_slow_increments_keep_exact_count() {
            let lock = Arc::new(TicketLock::with_fault_injection(
                3,
                SlowIncrement::new(1, Duration::from_millis(1)),
            ));
            let counter = Arc::new(AtomicU32::new(0));

            let handles: Vec<_> = (0..3)
                .map(|_| {
                    let lock = lock.clone();
                    let counter = counter.clone();
                    thread::spawn(move || {
                        for _ in 0..4 {
                            lock.with_lock(|_| {
                                let seen = counter.load(Relaxed);
                                thread::yield_now();
                                counter.store(seen + 1, Relaxed);
                            });
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }

            assert_eq!(counter.load(Relaxed), 12);
        }

        #[test]
        fn test_increment_amount_strides_tickets() {
            let lock = TicketLock::with_fault_injection(3, SlowIncrement::new(2, Duration::ZERO));

            let tickets: Vec<u32> = (0..4).map(|_| lock.with_lock(|t| t.ticket())).collect();

            assert_eq!(tickets, [0, 2, 1, 0]);
        }
    }
}
