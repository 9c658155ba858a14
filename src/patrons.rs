//! Simulated library patrons: readers and borrowers.
//!
//! These are the external caller units driving the core. Their lifecycle is
//! owned by the harness ([`crate::library`]): each runs on its own thread,
//! pauses are shutdown-interruptible, and every unit exits promptly once
//! `stop()` fires.

use crate::catalog::Catalog;
use crate::config::LibraryConfig;
use crate::error::LibraryError;
use crate::gate::AccessGate;
use crate::library::ShutdownToken;
use crate::queue::{BorrowRequest, RequestQueue};
use crate::types::{BorrowOutcome, BorrowerId, ReaderId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Shared tally of borrow outcomes across all borrower units.
#[derive(Debug, Default)]
pub struct OutcomeLedger {
    delivered: AtomicU64,
    out_of_stock: AtomicU64,
    cancelled: AtomicU64,
    rejected_full: AtomicU64,
}

impl OutcomeLedger {
    pub fn record(&self, outcome: BorrowOutcome) {
        let counter = match outcome {
            BorrowOutcome::Delivered { .. } => &self.delivered,
            BorrowOutcome::OutOfStock => &self.out_of_stock,
            BorrowOutcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// A non-blocking submission refused with `QueueFull`.
    pub fn record_rejected(&self) {
        self.rejected_full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn out_of_stock(&self) -> u64 {
        self.out_of_stock.load(Ordering::Relaxed)
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn rejected_full(&self) -> u64 {
        self.rejected_full.load(Ordering::Relaxed)
    }
}

/// One reader unit: repeatedly enters the read section and browses.
pub struct ReaderUnit {
    id: ReaderId,
    gate: Arc<AccessGate>,
    catalog: Arc<Catalog>,
    config: LibraryConfig,
    token: ShutdownToken,
}

impl ReaderUnit {
    pub fn new(
        id: ReaderId,
        gate: Arc<AccessGate>,
        catalog: Arc<Catalog>,
        config: LibraryConfig,
        token: ShutdownToken,
    ) -> Self {
        ReaderUnit {
            id,
            gate,
            catalog,
            config,
            token,
        }
    }

    pub fn spawn(self) -> Result<JoinHandle<()>, LibraryError> {
        std::thread::Builder::new()
            .name(format!("reader-{}", self.id))
            .spawn(move || self.run())
            .map_err(|source| LibraryError::Spawn {
                name: "reader",
                source,
            })
    }

    fn run(self) {
        if !self.token.pause(self.config.startup_jitter.sample()) {
            return;
        }
        loop {
            let ticket = match self.gate.acquire_read(self.id) {
                Ok(ticket) => ticket,
                Err(_) => break,
            };
            let books = self.catalog.browse(&ticket);
            tracing::debug!(reader = self.id, books, "browsing catalog");
            // Keep reading through a shutdown; the ticket drops right after.
            self.token.pause(self.config.read_time.sample());
            drop(ticket);

            if !self.token.pause(self.config.read_pause.sample()) {
                break;
            }
        }
        tracing::debug!(reader = self.id, "reader finished");
    }
}

/// One borrower unit: submits borrow requests and awaits each outcome.
pub struct BorrowerUnit {
    id: BorrowerId,
    queue: Arc<RequestQueue>,
    ledger: Arc<OutcomeLedger>,
    request_ids: Arc<AtomicU64>,
    config: LibraryConfig,
    token: ShutdownToken,
}

impl BorrowerUnit {
    pub fn new(
        id: BorrowerId,
        queue: Arc<RequestQueue>,
        ledger: Arc<OutcomeLedger>,
        request_ids: Arc<AtomicU64>,
        config: LibraryConfig,
        token: ShutdownToken,
    ) -> Self {
        BorrowerUnit {
            id,
            queue,
            ledger,
            request_ids,
            config,
            token,
        }
    }

    pub fn spawn(self) -> Result<JoinHandle<()>, LibraryError> {
        std::thread::Builder::new()
            .name(format!("borrower-{}", self.id))
            .spawn(move || self.run())
            .map_err(|source| LibraryError::Spawn {
                name: "borrower",
                source,
            })
    }

    fn run(self) {
        if !self.token.pause(self.config.startup_jitter.sample()) {
            return;
        }
        loop {
            let request_id = self.request_ids.fetch_add(1, Ordering::Relaxed);
            let (request, slot) = BorrowRequest::new(request_id, self.id);
            tracing::debug!(borrower = self.id, request = request_id, "submitting request");

            let submitted = if self.config.nonblocking_submit {
                self.queue.try_put(request)
            } else {
                self.queue.put(request)
            };
            match submitted {
                Ok(()) => {
                    // A dropped reply sender means the agent died; treat it
                    // the same as a shutdown cancellation.
                    let outcome = slot.recv().unwrap_or(BorrowOutcome::Cancelled);
                    self.ledger.record(outcome);
                    tracing::debug!(borrower = self.id, request = request_id, ?outcome, "outcome");
                    if outcome == BorrowOutcome::Cancelled {
                        break;
                    }
                }
                Err(LibraryError::QueueFull) => {
                    self.ledger.record_rejected();
                    tracing::debug!(borrower = self.id, request = request_id, "queue full");
                }
                Err(_) => {
                    self.ledger.record(BorrowOutcome::Cancelled);
                    break;
                }
            }

            if !self.token.pause(self.config.borrow_pause.sample()) {
                break;
            }
        }
        tracing::debug!(borrower = self.id, "borrower finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_counts_by_outcome() {
        let ledger = OutcomeLedger::default();
        ledger.record(BorrowOutcome::Delivered { remaining: 3 });
        ledger.record(BorrowOutcome::Delivered { remaining: 2 });
        ledger.record(BorrowOutcome::OutOfStock);
        ledger.record(BorrowOutcome::Cancelled);
        ledger.record_rejected();

        assert_eq!(ledger.delivered(), 2);
        assert_eq!(ledger.out_of_stock(), 1);
        assert_eq!(ledger.cancelled(), 1);
        assert_eq!(ledger.rejected_full(), 1);
    }
}
