//! Replicated log entries and their execution bookkeeping
//!
//! The unit of work behind a replicated merge-tree table's background
//! replication: every replica reads entries from a shared, append-only
//! coordination log and applies them locally. This crate provides the
//! entry representation and the synchronization envelope around one
//! execution attempt:
//!
//! - [`LogEntry`] / [`EntryAction`] - the action descriptor
//! - [`LogEntry::serialize`] / [`LogEntry::parse`] - the node text codec
//! - [`PartRegistry`] / [`PartSets`] - shared future/virtual part sets
//! - [`FuturePartTagger`] - scoped reservation of an output part name
//! - [`QueueEntry`] - attempt, postponement, and completion tracking
//!
//! Scheduling (which entry to attempt next, dependency ordering between
//! entries) and the action bodies themselves belong to the surrounding
//! engine.

pub mod codec;
pub mod entry;
pub mod parts;
pub mod queue_entry;
pub mod tagger;

pub use codec::{NodeStat, FORMAT_VERSION};
pub use entry::{EntryAction, EntryKind, LogEntry};
pub use parts::{PartRegistry, PartSets};
pub use queue_entry::{EntryStatus, QueueEntry};
pub use tagger::FuturePartTagger;
