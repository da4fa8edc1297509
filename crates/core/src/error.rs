//! Error types for the replication core
//!
//! One taxonomy for the whole workspace, split the way failures are
//! handled rather than where they occur:
//!
//! - [`Error::MalformedEntry`] - shared-log node text that cannot be
//!   turned into a valid entry. Surfaced to the caller of `parse`, which
//!   decides whether to skip the log position, alert, or halt.
//! - [`Error::Logical`] - an invariant violated by calling code itself
//!   (double-tagging a reserved part, recording success without an
//!   attempt). Always a programming defect; propagated, never recovered.
//! - [`Error::ActionFailed`] - the external merge/fetch/attach/drop body
//!   failed. Routine: recorded on the entry and retried by the scheduler.
//!
//! The type is `Clone` so a failed attempt's error can be retained as
//! bookkeeping on the entry that produced it.

use thiserror::Error;

/// Result type alias for replication-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the replication core
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Shared-log node text could not be parsed into a valid entry
    #[error("malformed log entry: {0}")]
    MalformedEntry(String),

    /// Invariant violated by the calling code; always a programming defect
    #[error("logical error: {0}")]
    Logical(String),

    /// The external action (fetch, merge, attach, drop) failed
    #[error("action failed: {0}")]
    ActionFailed(String),
}
