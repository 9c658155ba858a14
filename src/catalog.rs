//! The shared book catalog.

use crate::gate::{ReadTicket, WriteTicket};
use std::sync::atomic::{AtomicU32, Ordering};

/// Book inventory guarded by the access gate.
///
/// Mutation requires a [`WriteTicket`], taken by value reference as a proof of
/// exclusive admission; the gate guarantees no concurrent writer exists while
/// the ticket lives, so plain load/store pairs below are race-free.
pub struct Catalog {
    books: AtomicU32,
}

impl Catalog {
    pub fn new(initial_books: u32) -> Self {
        Catalog {
            books: AtomicU32::new(initial_books),
        }
    }

    /// Current count, without any admission requirement. Used for final
    /// statistics once all units have stopped.
    pub fn available(&self) -> u32 {
        self.books.load(Ordering::Acquire)
    }

    /// Read-side view of the count from within an admitted read section.
    pub fn browse(&self, _access: &ReadTicket<'_>) -> u32 {
        self.books.load(Ordering::Acquire)
    }

    /// Withdraw one book inside a write critical section.
    ///
    /// Returns the remaining count, or `None` when the shelf is empty (the
    /// count is never driven below zero).
    pub fn withdraw(&self, _access: &WriteTicket<'_>) -> Option<u32> {
        let current = self.books.load(Ordering::Acquire);
        if current == 0 {
            return None;
        }
        let remaining = current - 1;
        self.books.store(remaining, Ordering::Release);
        Some(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::gate::AccessGate;

    #[test]
    fn withdraw_counts_down_and_stops_at_zero() {
        let gate = AccessGate::new(EventBus::disabled());
        let catalog = Catalog::new(2);

        let ticket = gate.acquire_write().unwrap();
        assert_eq!(catalog.withdraw(&ticket), Some(1));
        assert_eq!(catalog.withdraw(&ticket), Some(0));
        assert_eq!(catalog.withdraw(&ticket), None);
        drop(ticket);

        assert_eq!(catalog.available(), 0);
    }

    #[test]
    fn browse_reflects_withdrawals() {
        let gate = AccessGate::new(EventBus::disabled());
        let catalog = Catalog::new(5);

        {
            let write = gate.acquire_write().unwrap();
            catalog.withdraw(&write);
        }
        let read = gate.acquire_read(1).unwrap();
        assert_eq!(catalog.browse(&read), 4);
    }
}
