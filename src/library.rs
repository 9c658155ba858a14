//! The library harness.
//!
//! Wires the catalog, access gate, request queue, librarian and patron units
//! together, owns every thread, and provides the single idempotent `stop()`
//! entry point. After `join()` no thread remains blocked: blocked callers are
//! unblocked with `Cancelled`, sleeping units are woken, and queued requests
//! are drained.

use crate::catalog::Catalog;
use crate::config::LibraryConfig;
use crate::error::LibraryError;
use crate::events::EventBus;
use crate::gate::AccessGate;
use crate::librarian::{AgentState, AgentStateCell, Librarian};
use crate::patrons::{BorrowerUnit, OutcomeLedger, ReaderUnit};
use crate::queue::RequestQueue;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Uninhabited: the shutdown channel only ever signals by disconnecting.
enum Never {}

/// Shutdown-aware pause handle given to every simulation unit.
///
/// A pause is a timed wait on a channel that never carries a message; when
/// the harness drops the paired [`ShutdownTrigger`], every pause in every
/// unit returns immediately. No unit ever sleeps through a shutdown.
#[derive(Clone)]
pub struct ShutdownToken {
    rx: Receiver<Never>,
}

impl ShutdownToken {
    /// Create a trigger/token pair.
    pub fn pair() -> (ShutdownTrigger, ShutdownToken) {
        let (tx, rx) = crossbeam_channel::bounded(0);
        (ShutdownTrigger { _tx: tx }, ShutdownToken { rx })
    }

    /// A token whose shutdown never fires; pauses always run to completion.
    pub fn inert() -> ShutdownToken {
        let (tx, rx) = crossbeam_channel::bounded(0);
        std::mem::forget(tx);
        ShutdownToken { rx }
    }

    /// Sleep for `duration` unless shutdown fires first.
    ///
    /// Returns `true` when the pause completed undisturbed, `false` when
    /// shutdown cut it short (or had already fired).
    pub fn pause(&self, duration: Duration) -> bool {
        match self.rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => true,
            Err(RecvTimeoutError::Disconnected) => false,
            Ok(never) => match never {},
        }
    }
}

/// Dropping the trigger releases every paused unit.
pub struct ShutdownTrigger {
    _tx: Sender<Never>,
}

/// Final statistics of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub delivered: u64,
    pub out_of_stock: u64,
    pub cancelled: u64,
    pub rejected_full: u64,
    pub books_remaining: u32,
    pub pending_requests: usize,
    pub active_readers: usize,
}

/// A running library simulation.
pub struct Library {
    gate: Arc<AccessGate>,
    queue: Arc<RequestQueue>,
    catalog: Arc<Catalog>,
    ledger: Arc<OutcomeLedger>,
    agent_state: Arc<AgentStateCell>,
    shutdown: Arc<AtomicBool>,
    trigger: Option<ShutdownTrigger>,
    librarian: Option<JoinHandle<()>>,
    patrons: Vec<JoinHandle<()>>,
}

impl Library {
    /// Build all components and start every thread.
    pub fn start(config: LibraryConfig, events: EventBus) -> Result<Library, LibraryError> {
        config.validate()?;

        let gate = Arc::new(AccessGate::new(events.clone()));
        let queue = Arc::new(RequestQueue::new(config.queue_capacity, events.clone())?);
        let catalog = Arc::new(Catalog::new(config.initial_books));
        let ledger = Arc::new(OutcomeLedger::default());
        let shutdown = Arc::new(AtomicBool::new(false));
        let (trigger, token) = ShutdownToken::pair();

        let librarian = Librarian::new(
            Arc::clone(&queue),
            Arc::clone(&gate),
            Arc::clone(&catalog),
            events,
            Arc::clone(&shutdown),
            config.service_time,
            token.clone(),
        );
        let agent_state = librarian.state_cell();

        let mut library = Library {
            gate,
            queue,
            catalog,
            ledger,
            agent_state,
            shutdown,
            trigger: Some(trigger),
            librarian: None,
            patrons: Vec::with_capacity((config.readers + config.borrowers) as usize),
        };

        match library.spawn_units(librarian, &config, token) {
            Ok(()) => {
                tracing::info!(
                    readers = config.readers,
                    borrowers = config.borrowers,
                    books = config.initial_books,
                    capacity = config.queue_capacity,
                    "library open"
                );
                Ok(library)
            }
            Err(e) => {
                // Unwind whatever was already running before reporting.
                library.shutdown_and_join();
                Err(e)
            }
        }
    }

    fn spawn_units(
        &mut self,
        librarian: Librarian,
        config: &LibraryConfig,
        token: ShutdownToken,
    ) -> Result<(), LibraryError> {
        self.librarian = Some(librarian.spawn()?);

        let request_ids = Arc::new(AtomicU64::new(1));
        for id in 1..=config.readers {
            let unit = ReaderUnit::new(
                id,
                Arc::clone(&self.gate),
                Arc::clone(&self.catalog),
                config.clone(),
                token.clone(),
            );
            self.patrons.push(unit.spawn()?);
        }
        for id in 1..=config.borrowers {
            let unit = BorrowerUnit::new(
                id,
                Arc::clone(&self.queue),
                Arc::clone(&self.ledger),
                Arc::clone(&request_ids),
                config.clone(),
                token.clone(),
            );
            self.patrons.push(unit.spawn()?);
        }
        Ok(())
    }

    /// Trigger the cancellation sequence. Idempotent; safe to call while
    /// units are mid-operation.
    pub fn stop(&mut self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!("library closing");
        self.gate.close();
        self.queue.close();
        // Dropping the trigger releases every paused unit.
        self.trigger.take();
    }

    /// Stop (if not already stopped) and wait for all threads, then return
    /// the final statistics.
    pub fn join(mut self) -> SimulationReport {
        self.shutdown_and_join();
        self.report()
    }

    fn shutdown_and_join(&mut self) {
        self.stop();
        if let Some(handle) = self.librarian.take() {
            let _ = handle.join();
        }
        for handle in self.patrons.drain(..) {
            let _ = handle.join();
        }
    }

    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            delivered: self.ledger.delivered(),
            out_of_stock: self.ledger.out_of_stock(),
            cancelled: self.ledger.cancelled(),
            rejected_full: self.ledger.rejected_full(),
            books_remaining: self.catalog.available(),
            pending_requests: self.queue.len(),
            active_readers: self.gate.snapshot().active_readers,
        }
    }

    pub fn agent_state(&self) -> AgentState {
        self.agent_state.load()
    }

    pub fn gate(&self) -> &Arc<AccessGate> {
        &self.gate
    }

    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LatencyRange;

    fn quick_config() -> LibraryConfig {
        LibraryConfig {
            readers: 2,
            borrowers: 2,
            initial_books: 4,
            queue_capacity: 2,
            startup_jitter: LatencyRange::zero(),
            read_time: LatencyRange::from_millis(1, 2),
            read_pause: LatencyRange::from_millis(5, 10),
            service_time: LatencyRange::zero(),
            borrow_pause: LatencyRange::from_millis(5, 10),
            ..LibraryConfig::default()
        }
    }

    #[test]
    fn run_and_join_leaves_consistent_statistics() {
        let library = Library::start(quick_config(), EventBus::disabled()).unwrap();
        std::thread::sleep(Duration::from_millis(120));
        let report = library.join();

        assert_eq!(
            report.books_remaining as u64,
            4u64.saturating_sub(report.delivered)
        );
        assert_eq!(report.active_readers, 0);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut library = Library::start(quick_config(), EventBus::disabled()).unwrap();
        library.stop();
        library.stop();
        let report = library.join();
        assert_eq!(report.active_readers, 0);
    }
}
