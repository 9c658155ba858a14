//! Bounded borrow-request queue.
//!
//! Fixed-capacity FIFO handoff between borrower units and the single
//! librarian. `put` blocks while the queue is full, `take` blocks while it is
//! empty; both park on condition variables under the queue's one internal
//! mutex, so a `put` signal can never slip between the consumer's emptiness
//! check and its transition to sleep.

use crate::error::LibraryError;
use crate::events::{Event, EventBus};
use crate::types::{BorrowOutcome, BorrowerId, RequestId};
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// A borrow request travelling from a borrower to the librarian.
///
/// Owned by the queue until taken, then by the librarian until resolved.
/// [`BorrowRequest::resolve`] consumes the request, so exactly one outcome is
/// delivered per request.
#[derive(Debug)]
pub struct BorrowRequest {
    pub id: RequestId,
    pub borrower: BorrowerId,
    pub submitted_at: DateTime<Utc>,
    reply: Sender<BorrowOutcome>,
}

/// Borrower-side handle on which the outcome of one request arrives.
pub type OutcomeSlot = Receiver<BorrowOutcome>;

impl BorrowRequest {
    /// Create a request and the slot its outcome will be delivered to.
    pub fn new(id: RequestId, borrower: BorrowerId) -> (BorrowRequest, OutcomeSlot) {
        let (reply, slot) = crossbeam_channel::bounded(1);
        (
            BorrowRequest {
                id,
                borrower,
                submitted_at: Utc::now(),
                reply,
            },
            slot,
        )
    }

    /// Deliver the final outcome to the originating borrower.
    ///
    /// A borrower that has already given up (dropped its slot) is ignored.
    pub fn resolve(self, outcome: BorrowOutcome) {
        let _ = self.reply.try_send(outcome);
    }
}

/// Observer for the consumer's sleep/wake transitions inside [`RequestQueue::take_with`].
///
/// `on_sleep` runs under the queue mutex immediately before the consumer
/// parks, making the emptiness check and the sleep transition one atomic step
/// relative to `put`'s signal. `on_wake` runs when the consumer resumes.
pub trait WaitHooks {
    fn on_sleep(&mut self) {}
    fn on_wake(&mut self) {}
}

/// No-op hooks for callers that do not track consumer state.
impl WaitHooks for () {}

struct QueueState {
    items: VecDeque<BorrowRequest>,
    closed: bool,
}

/// Fixed-capacity FIFO request queue with blocking handoff.
pub struct RequestQueue {
    state: Mutex<QueueState>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
    events: EventBus,
}

impl RequestQueue {
    /// Create a queue with the given fixed capacity.
    ///
    /// Capacity must be at least 1; it never changes afterwards.
    pub fn new(capacity: usize, events: EventBus) -> Result<Self, LibraryError> {
        if capacity == 0 {
            return Err(LibraryError::Config(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        Ok(RequestQueue {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
            events,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Append a request, blocking while the queue is at capacity.
    ///
    /// Signals the consumer on success. Returns [`LibraryError::Cancelled`]
    /// once the queue has been closed.
    pub fn put(&self, request: BorrowRequest) -> Result<(), LibraryError> {
        let mut state = self.state.lock();
        while !state.closed && state.items.len() == self.capacity {
            self.not_full.wait(&mut state);
        }
        if state.closed {
            return Err(LibraryError::Cancelled);
        }
        self.append(&mut state, request);
        Ok(())
    }

    /// Non-blocking variant of [`RequestQueue::put`].
    ///
    /// Reports [`LibraryError::QueueFull`] immediately instead of blocking.
    pub fn try_put(&self, request: BorrowRequest) -> Result<(), LibraryError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(LibraryError::Cancelled);
        }
        if state.items.len() == self.capacity {
            return Err(LibraryError::QueueFull);
        }
        self.append(&mut state, request);
        Ok(())
    }

    fn append(&self, state: &mut QueueState, request: BorrowRequest) {
        debug_assert!(state.items.len() < self.capacity, "queue over capacity");
        self.events.emit(Event::RequestQueued {
            request: request.id,
            borrower: request.borrower,
            depth: state.items.len() + 1,
        });
        tracing::debug!(
            request = request.id,
            borrower = request.borrower,
            depth = state.items.len() + 1,
            "request queued"
        );
        state.items.push_back(request);
        self.not_empty.notify_one();
    }

    /// Remove and return the head request, blocking while the queue is empty.
    pub fn take(&self) -> Result<BorrowRequest, LibraryError> {
        self.take_with(&mut ())
    }

    /// Like [`RequestQueue::take`], reporting sleep/wake transitions through
    /// `hooks`.
    ///
    /// After `close`, queued requests are still drained in order;
    /// [`LibraryError::Cancelled`] is returned only once the queue is closed
    /// and empty, so no accepted request is silently lost.
    pub fn take_with(&self, hooks: &mut impl WaitHooks) -> Result<BorrowRequest, LibraryError> {
        let mut state = self.state.lock();
        loop {
            if let Some(request) = state.items.pop_front() {
                self.not_full.notify_one();
                return Ok(request);
            }
            if state.closed {
                return Err(LibraryError::Cancelled);
            }
            hooks.on_sleep();
            self.not_empty.wait(&mut state);
            hooks.on_wake();
        }
    }

    /// Close the queue: producers and an idle consumer unblock. Idempotent.
    ///
    /// Requests already accepted stay queued for the consumer to drain.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);
        self.not_full.notify_all();
        self.not_empty.notify_all();
        tracing::debug!("request queue closed");
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}
