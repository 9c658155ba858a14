//! Core types for the library coordination system.

use serde::{Deserialize, Serialize};

/// ReaderId: identifies one concurrent reader unit
pub type ReaderId = u32;

/// BorrowerId: identifies one borrower unit submitting requests
pub type BorrowerId = u32;

/// RequestId: monotonically assigned per borrow request
pub type RequestId = u64;

/// Final outcome of a single borrow request.
///
/// Every request submitted to the queue yields exactly one of these, delivered
/// back to the originating borrower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BorrowOutcome {
    /// A book was withdrawn; `remaining` is the catalog count afterwards.
    Delivered { remaining: u32 },
    /// The catalog was empty. A normal outcome, not a fault.
    OutOfStock,
    /// Shutdown unblocked the request before it could be served.
    Cancelled,
}
