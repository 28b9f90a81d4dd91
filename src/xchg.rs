//! # xchg
//!
//! The single hardware read-modify-write every lock in this crate is built on:
//! atomically store a new value into a word and hand back the one it replaced.
//!
//! On x86 this lowers to `lock xchg`; on other targets to whatever the
//! platform's atomic swap is (LL/SC loop, `amoswap`, `swp`, ...).
//!
//! ## Example
//! ```rust
//! use axiom_ticketlock::xchg::{xchg, AtomicWord};
//!
//! let word = AtomicWord::new(0);
//! assert_eq!(xchg(&word, 1), 0); // was free, now ours
//! assert_eq!(xchg(&word, 1), 1); // already taken
//! ```

use core::sync::atomic::{AtomicU32, Ordering::AcqRel};

/// Fixed-width word subject to atomic exchange.
pub type AtomicWord = AtomicU32;

/// Atomically stores `new` into `word` and returns the previous value.
///
/// The swap is `AcqRel`: a caller that reads back `0` from a lock word
/// observes every write made before the matching release, and the store of
/// `new` is published to the next exchanger.
#[inline(always)]
pub fn xchg(word: &AtomicWord, new: u32) -> u32 {
    word.swap(new, AcqRel)
}
