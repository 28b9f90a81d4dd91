//! Errors reported by the validating [`TicketLock`](crate::TicketLock) constructor.

use thiserror::Error;

/// A ticket lock sized so that tickets could alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CapacityError {
    /// There must be at least one ticket to hand out.
    #[error("ticket lock capacity must be at least 1")]
    ZeroCapacity,

    /// Fewer tickets than callers that may hold one at the same time.
    #[error("ticket lock capacity {capacity} is below the {contenders} concurrent contenders")]
    TooSmall { capacity: u32, contenders: u32 },
}

impl CapacityError {
    /// Checks that `capacity` tickets cover `contenders` simultaneous callers.
    pub fn check(capacity: u32, contenders: u32) -> Result<(), Self> {
        if capacity == 0 {
            return Err(Self::ZeroCapacity);
        }
        if capacity < contenders {
            return Err(Self::TooSmall {
                capacity,
                contenders,
            });
        }
        Ok(())
    }
}
