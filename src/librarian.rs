//! The librarian: single consumer of the borrow-request queue.
//!
//! Runs on its own thread, asleep whenever the queue is empty and woken
//! exactly when work arrives. Catalog mutation happens only inside the write
//! critical section of the access gate, where concurrent readers are held
//! off.

use crate::catalog::Catalog;
use crate::config::LatencyRange;
use crate::error::LibraryError;
use crate::events::{Event, EventBus};
use crate::gate::AccessGate;
use crate::library::ShutdownToken;
use crate::queue::{RequestQueue, WaitHooks};
use crate::types::BorrowOutcome;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Scheduling state of the librarian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Sleeping,
    Awake,
    Processing,
}

impl AgentState {
    fn from_u8(value: u8) -> AgentState {
        match value {
            0 => AgentState::Sleeping,
            1 => AgentState::Awake,
            _ => AgentState::Processing,
        }
    }
}

/// Shared, lock-free view of the librarian's state.
///
/// Written only by the librarian itself; everyone else observes.
pub struct AgentStateCell(AtomicU8);

impl AgentStateCell {
    pub fn new() -> Self {
        AgentStateCell(AtomicU8::new(AgentState::Sleeping as u8))
    }

    pub fn load(&self) -> AgentState {
        AgentState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn store(&self, state: AgentState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

impl Default for AgentStateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Bridges the queue's sleep/wake transitions to agent state and events.
///
/// `on_sleep` fires under the queue mutex, so the sleep transition is atomic
/// with the emptiness check it follows.
struct SchedulerHooks<'a> {
    state: &'a AgentStateCell,
    events: &'a EventBus,
}

impl WaitHooks for SchedulerHooks<'_> {
    fn on_sleep(&mut self) {
        self.state.store(AgentState::Sleeping);
        self.events.emit(Event::AgentSleeping);
        tracing::debug!("librarian sleeping");
    }

    fn on_wake(&mut self) {
        self.state.store(AgentState::Awake);
        self.events.emit(Event::AgentWoke);
        tracing::debug!("librarian woke");
    }
}

/// The single processing agent.
pub struct Librarian {
    queue: Arc<RequestQueue>,
    gate: Arc<AccessGate>,
    catalog: Arc<Catalog>,
    events: EventBus,
    shutdown: Arc<AtomicBool>,
    state: Arc<AgentStateCell>,
    service_time: LatencyRange,
    token: ShutdownToken,
}

impl Librarian {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<RequestQueue>,
        gate: Arc<AccessGate>,
        catalog: Arc<Catalog>,
        events: EventBus,
        shutdown: Arc<AtomicBool>,
        service_time: LatencyRange,
        token: ShutdownToken,
    ) -> Self {
        Librarian {
            queue,
            gate,
            catalog,
            events,
            shutdown,
            state: Arc::new(AgentStateCell::new()),
            service_time,
            token,
        }
    }

    /// Observable state handle; clone before [`Librarian::spawn`] consumes
    /// the agent.
    pub fn state_cell(&self) -> Arc<AgentStateCell> {
        Arc::clone(&self.state)
    }

    /// Start the librarian on its own named thread.
    pub fn spawn(self) -> Result<JoinHandle<()>, LibraryError> {
        std::thread::Builder::new()
            .name("librarian".to_string())
            .spawn(move || self.run())
            .map_err(|source| LibraryError::Spawn {
                name: "librarian",
                source,
            })
    }

    fn run(self) {
        tracing::info!("librarian on duty");
        let mut hooks = SchedulerHooks {
            state: &self.state,
            events: &self.events,
        };
        loop {
            // Drains queued requests even after close; Err means closed and
            // empty, the shutdown-terminal state.
            let request = match self.queue.take_with(&mut hooks) {
                Ok(request) => request,
                Err(_) => break,
            };
            if self.state.load() == AgentState::Sleeping {
                // Work was already queued when the loop first looked.
                self.state.store(AgentState::Awake);
                self.events.emit(Event::AgentWoke);
            }
            if self.shutdown.load(Ordering::Acquire) {
                request.resolve(BorrowOutcome::Cancelled);
                continue;
            }

            self.state.store(AgentState::Processing);
            self.events.emit(Event::RequestProcessing {
                request: request.id,
                borrower: request.borrower,
            });
            tracing::debug!(
                request = request.id,
                borrower = request.borrower,
                "processing borrow request"
            );

            // Simulated service latency, cut short by shutdown.
            if !self.token.pause(self.service_time.sample()) {
                request.resolve(BorrowOutcome::Cancelled);
                continue;
            }

            match self.gate.acquire_write() {
                Ok(access) => match self.catalog.withdraw(&access) {
                    Some(remaining) => {
                        self.events.emit(Event::BookDelivered {
                            request: request.id,
                            borrower: request.borrower,
                            remaining,
                        });
                        tracing::info!(
                            request = request.id,
                            borrower = request.borrower,
                            remaining,
                            "book delivered"
                        );
                        request.resolve(BorrowOutcome::Delivered { remaining });
                    }
                    None => {
                        self.events.emit(Event::BookUnavailable {
                            request: request.id,
                            borrower: request.borrower,
                        });
                        tracing::info!(
                            request = request.id,
                            borrower = request.borrower,
                            "out of stock"
                        );
                        request.resolve(BorrowOutcome::OutOfStock);
                    }
                },
                Err(_) => request.resolve(BorrowOutcome::Cancelled),
            }
        }
        tracing::info!("librarian off duty");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::BorrowRequest;

    fn setup() -> (
        Arc<RequestQueue>,
        Arc<AccessGate>,
        Arc<Catalog>,
        Arc<AtomicBool>,
    ) {
        (
            Arc::new(RequestQueue::new(4, EventBus::disabled()).unwrap()),
            Arc::new(AccessGate::new(EventBus::disabled())),
            Arc::new(Catalog::new(1)),
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn serves_requests_until_out_of_stock() {
        let (queue, gate, catalog, shutdown) = setup();
        let librarian = Librarian::new(
            Arc::clone(&queue),
            gate,
            catalog,
            EventBus::disabled(),
            Arc::clone(&shutdown),
            LatencyRange::zero(),
            ShutdownToken::inert(),
        );
        let handle = librarian.spawn().unwrap();

        let (first, first_slot) = BorrowRequest::new(1, 1);
        let (second, second_slot) = BorrowRequest::new(2, 2);
        queue.put(first).unwrap();
        queue.put(second).unwrap();

        assert_eq!(
            first_slot.recv().unwrap(),
            BorrowOutcome::Delivered { remaining: 0 }
        );
        assert_eq!(second_slot.recv().unwrap(), BorrowOutcome::OutOfStock);

        queue.close();
        handle.join().unwrap();
    }

    #[test]
    fn queued_requests_are_cancelled_on_shutdown() {
        let (queue, gate, catalog, shutdown) = setup();
        let librarian = Librarian::new(
            Arc::clone(&queue),
            Arc::clone(&gate),
            catalog,
            EventBus::disabled(),
            Arc::clone(&shutdown),
            LatencyRange::zero(),
            ShutdownToken::inert(),
        );

        // Stop before the agent ever runs: everything queued must still
        // resolve, as Cancelled.
        let (request, slot) = BorrowRequest::new(1, 1);
        queue.put(request).unwrap();
        shutdown.store(true, Ordering::Release);
        gate.close();
        queue.close();

        let handle = librarian.spawn().unwrap();
        assert_eq!(slot.recv().unwrap(), BorrowOutcome::Cancelled);
        handle.join().unwrap();
    }
}
