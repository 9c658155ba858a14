//! Libris: Concurrent Library Coordination
//!
//! An in-memory coordination core for a simulated library: readers share the
//! catalog under a writer-priority readers-writers gate, borrowers hand
//! requests to a single librarian through a bounded FIFO queue, and the
//! librarian sleeps whenever no work exists.

pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod gate;
pub mod librarian;
pub mod library;
pub mod logging;
pub mod patrons;
pub mod queue;
pub mod types;
