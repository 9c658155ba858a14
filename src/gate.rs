//! Readers-writers admission control over the shared catalog.
//!
//! Any number of readers may hold access concurrently; the librarian's write
//! access is exclusive. A waiting writer blocks newly arriving readers, so the
//! writer is admitted within one reader generation and cannot starve behind an
//! unbounded reader stream.
//!
//! The reader-count mutation and the writer-admission decision are both
//! evaluated under one internal mutex. Admission is represented by RAII
//! tickets whose `Drop` performs the release, so a ticket can never leak an
//! admission.

use crate::error::LibraryError;
use crate::events::{Event, EventBus};
use crate::types::ReaderId;
use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct GateState {
    active_readers: usize,
    writer_active: bool,
    waiting_writers: usize,
    closed: bool,
}

impl GateState {
    fn admits_reader(&self) -> bool {
        !self.writer_active && self.waiting_writers == 0
    }

    fn admits_writer(&self) -> bool {
        !self.writer_active && self.active_readers == 0
    }
}

/// Point-in-time view of the gate, for tests and status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateSnapshot {
    pub active_readers: usize,
    pub writer_active: bool,
    pub writer_waiting: bool,
}

/// The readers-writers gate guarding the catalog.
pub struct AccessGate {
    state: Mutex<GateState>,
    readers: Condvar,
    writers: Condvar,
    events: EventBus,
}

impl AccessGate {
    pub fn new(events: EventBus) -> Self {
        AccessGate {
            state: Mutex::new(GateState::default()),
            readers: Condvar::new(),
            writers: Condvar::new(),
            events,
        }
    }

    /// Block until read access is admitted.
    ///
    /// Readers queue behind any waiting writer. Returns
    /// [`LibraryError::Cancelled`] once the gate has been closed.
    pub fn acquire_read(&self, reader: ReaderId) -> Result<ReadTicket<'_>, LibraryError> {
        let mut state = self.state.lock();
        while !state.closed && !state.admits_reader() {
            self.readers.wait(&mut state);
        }
        if state.closed {
            return Err(LibraryError::Cancelled);
        }
        state.active_readers += 1;
        self.events.emit(Event::ReaderEntered {
            reader,
            active_readers: state.active_readers,
        });
        tracing::debug!(reader, active_readers = state.active_readers, "read access granted");
        Ok(ReadTicket { gate: self, reader })
    }

    /// Block until exclusive write access is admitted.
    ///
    /// Marks a writer as waiting for the duration of the wait, which holds
    /// back newly arriving readers. Returns [`LibraryError::Cancelled`] once
    /// the gate has been closed.
    pub fn acquire_write(&self) -> Result<WriteTicket<'_>, LibraryError> {
        let mut state = self.state.lock();
        state.waiting_writers += 1;
        while !state.closed && !state.admits_writer() {
            self.writers.wait(&mut state);
        }
        state.waiting_writers -= 1;
        if state.closed {
            // Admission may now be possible for parked readers.
            if state.waiting_writers == 0 {
                self.readers.notify_all();
            }
            return Err(LibraryError::Cancelled);
        }
        state.writer_active = true;
        tracing::debug!("write access granted");
        Ok(WriteTicket { gate: self })
    }

    /// Unblock every parked caller with `Cancelled`. Idempotent.
    ///
    /// Access already granted is unaffected; holders release their tickets
    /// normally.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        drop(state);
        self.readers.notify_all();
        self.writers.notify_all();
        tracing::debug!("access gate closed");
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn snapshot(&self) -> GateSnapshot {
        let state = self.state.lock();
        GateSnapshot {
            active_readers: state.active_readers,
            writer_active: state.writer_active,
            writer_waiting: state.waiting_writers > 0,
        }
    }

    fn release_read(&self, reader: ReaderId) {
        let mut state = self.state.lock();
        debug_assert!(state.active_readers > 0, "reader count underflow");
        state.active_readers -= 1;
        self.events.emit(Event::ReaderExited {
            reader,
            active_readers: state.active_readers,
        });
        if state.active_readers == 0 && state.waiting_writers > 0 {
            self.writers.notify_one();
        }
    }

    fn release_write(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.writer_active, "write release without admission");
        state.writer_active = false;
        if state.waiting_writers > 0 {
            self.writers.notify_one();
        } else {
            self.readers.notify_all();
        }
    }
}

/// Proof of admitted read access. Dropping it releases the admission.
#[must_use = "read access is released when the ticket drops"]
pub struct ReadTicket<'a> {
    gate: &'a AccessGate,
    reader: ReaderId,
}

impl Drop for ReadTicket<'_> {
    fn drop(&mut self) {
        self.gate.release_read(self.reader);
    }
}

/// Proof of exclusive write access. Dropping it releases the admission.
#[must_use = "write access is released when the ticket drops"]
pub struct WriteTicket<'a> {
    gate: &'a AccessGate,
}

impl Drop for WriteTicket<'_> {
    fn drop(&mut self) {
        self.gate.release_write();
    }
}
