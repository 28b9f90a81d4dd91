//! # axiom-ticketlock 🎟️
//!
//! A lightweight, **`no_std`-compatible** crate providing a **fair ticket lock**
//! and the spin-based primitives it is built from.
//!
//! The crate includes:
//!
//! - [`TicketLock`] — a FIFO-fair mutual exclusion lock with bounded counters.
//! - [`SpinLock<T>`] — a test-and-set lock built on atomic exchange; the
//!   ticket lock uses one to serialize ticket issuance.
//! - [`xchg`] — the atomic-exchange primitive underneath both.
//! - [`BackOff`] — spin pacing for the busy-wait loops.
//!
//! Like its sibling `axiom-spinlock`, nothing here parks threads or talks to
//! the OS scheduler: every wait is a busy-wait.
//!
//! ## ✨ Features
//!
//! - ✅ `no_std` compatible (uses `core` and the `log` facade only)
//! - ⚙️ `std` (default): long waits also yield the thread
//! - 🧪 `fault-injection`: slowed counter increments for stress testing
//! - 🧰 `harness` (default): the `ticketlock-stress` binary
//!
//! ## 🚀 Quick Example
//!
//! ```rust
//! use axiom_ticketlock::TicketLock;
//!
//! let lock = TicketLock::new(8);
//!
//! let ticket = lock.lock();
//! assert_eq!(ticket.ticket(), 0);
//! lock.unlock();
//!
//! // RAII form
//! {
//!     let guard = lock.acquire();
//!     assert_eq!(guard.ticket().ticket(), 1);
//! }
//! assert_eq!(lock.current_turn(), 2);
//! ```
//!
//! ## ⚠️ Sizing
//!
//! A [`TicketLock`] counts tickets modulo its capacity. The capacity must be
//! at least the number of threads that can be inside `lock()` (waiting or
//! holding) at once, or tickets alias and both fairness and mutual exclusion
//! are lost. [`TicketLock::for_contenders`] validates this at construction.
//!
//! ## 📦 Modules
//!
//! - [`xchg`] — atomic exchange.
//! - [`backoff`] — spin pacing.
//! - [`spinlock`] — test-and-set lock.
//! - [`ticket`] — the value returned by [`TicketLock::lock`].
//! - [`ticketlock`] — the fair lock.
//! - `fault` — slowed increments (feature `fault-injection`).

#![cfg_attr(not(any(feature = "std", test)), no_std)]

pub mod backoff;
pub mod error;
#[cfg(feature = "fault-injection")]
pub mod fault;
pub mod spinlock;
pub mod ticket;
pub mod ticketlock;
pub mod xchg;

pub use backoff::BackOff;
pub use error::CapacityError;
#[cfg(feature = "fault-injection")]
pub use fault::SlowIncrement;
pub use spinlock::{SpinGuard, SpinLock};
pub use ticket::Ticket;
pub use ticketlock::{TicketGuard, TicketLock};
