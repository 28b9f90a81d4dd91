//! # Ticket
//!
//! The value handed back by [`TicketLock::lock`](crate::TicketLock::lock).

use core::fmt;

/// The ticket a caller was issued and the turn it saw when it started waiting.
///
/// Purely diagnostic: dropping a `Ticket` does not release anything, and
/// holding one does not prove ownership of the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    ticket: u32,
    initial_turn: u32,
}

impl Ticket {
    #[inline(always)]
    pub(crate) const fn new(ticket: u32, initial_turn: u32) -> Self {
        Self {
            ticket,
            initial_turn,
        }
    }

    /// The ticket number issued, in `[0, capacity)`.
    #[inline(always)]
    pub const fn ticket(&self) -> u32 {
        self.ticket
    }

    /// The turn counter as observed right after the ticket was issued.
    #[inline(always)]
    pub const fn initial_turn(&self) -> u32 {
        self.initial_turn
    }

    /// Whether the caller had to wait, i.e. somebody else was being served
    /// when the ticket was issued.
    #[inline(always)]
    pub const fn waited(&self) -> bool {
        self.ticket != self.initial_turn
    }
}

/// Formats as `ticket/turn`.
impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ticket, self.initial_turn)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::Ticket;

    #[test]
    fn display_and_waited() {
        let uncontended = Ticket::new(2, 2);
        let queued = Ticket::new(4, 1);

        assert_eq!(uncontended.to_string(), "2/2");
        assert_eq!(queued.to_string(), "4/1");
        assert!(!uncontended.waited());
        assert!(queued.waited());
    }
}
