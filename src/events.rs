//! Event emission for external observability.
//!
//! The core reports its progress as a one-way stream of discrete events. The
//! bus never blocks the emitting component: records go into an unbounded
//! channel and a consumer that has hung up is simply ignored. Output
//! formatting lives entirely with the consumer (see the `libris` binary).

use crate::types::{BorrowerId, ReaderId, RequestId};
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use serde::Serialize;

/// Discrete events emitted by the coordination core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A reader was admitted; `active_readers` is the count after entry.
    ReaderEntered {
        reader: ReaderId,
        active_readers: usize,
    },
    /// A reader released its access; `active_readers` is the count after exit.
    ReaderExited {
        reader: ReaderId,
        active_readers: usize,
    },
    /// A borrow request was appended to the queue; `depth` is the queue length
    /// including the new request.
    RequestQueued {
        request: RequestId,
        borrower: BorrowerId,
        depth: usize,
    },
    /// The librarian left its sleeping state.
    AgentWoke,
    /// The librarian began servicing a request.
    RequestProcessing {
        request: RequestId,
        borrower: BorrowerId,
    },
    /// A book was withdrawn for the request; `remaining` is the catalog count
    /// after the withdrawal.
    BookDelivered {
        request: RequestId,
        borrower: BorrowerId,
        remaining: u32,
    },
    /// The catalog was empty when the request was serviced.
    BookUnavailable {
        request: RequestId,
        borrower: BorrowerId,
    },
    /// The librarian found the queue empty and went to sleep.
    AgentSleeping,
}

/// A timestamped event record as delivered to the sink.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

/// Cloneable handle used by core components to emit events.
#[derive(Clone)]
pub struct EventBus {
    sink: Option<Sender<EventRecord>>,
}

impl EventBus {
    /// Create a bus together with the receiving end for the sink.
    pub fn channel() -> (EventBus, Receiver<EventRecord>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (EventBus { sink: Some(tx) }, rx)
    }

    /// A bus with no sink attached. Emission is a no-op.
    pub fn disabled() -> EventBus {
        EventBus { sink: None }
    }

    /// Emit one event. Never blocks; a disconnected sink is ignored.
    pub fn emit(&self, event: Event) {
        tracing::trace!(?event, "emit");
        if let Some(sink) = &self.sink {
            let _ = sink.try_send(EventRecord {
                at: Utc::now(),
                event,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitted_events_reach_the_sink_in_order() {
        let (bus, rx) = EventBus::channel();
        bus.emit(Event::AgentWoke);
        bus.emit(Event::AgentSleeping);

        assert_eq!(rx.recv().unwrap().event, Event::AgentWoke);
        assert_eq!(rx.recv().unwrap().event, Event::AgentSleeping);
    }

    #[test]
    fn disabled_bus_and_hung_up_sink_are_silent() {
        EventBus::disabled().emit(Event::AgentWoke);

        let (bus, rx) = EventBus::channel();
        drop(rx);
        bus.emit(Event::AgentSleeping); // must not panic or block
    }

    #[test]
    fn records_serialize_with_flattened_event_tag() {
        let record = EventRecord {
            at: Utc::now(),
            event: Event::BookDelivered {
                request: 7,
                borrower: 2,
                remaining: 4,
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["event"], "book_delivered");
        assert_eq!(json["remaining"], 4);
    }
}
