//! TesseraDB - replication queue core for a replicated merge-tree table
//! engine
//!
//! Replicas of a table coordinate through a shared, append-only log of
//! entries; each entry describes an action every replica must eventually
//! apply (fetch a part from a peer, merge parts, drop a block range,
//! attach a detached part). This crate is the entry core: the record and
//! its invariants, the node text codec, the future-part reservation
//! guard, and the attempt/postpone/completion bookkeeping.
//!
//! # Quick start
//!
//! ```
//! use tesseradb::{LogEntry, NodeStat, PartSets, QueueEntry};
//! use std::sync::Arc;
//!
//! // Text fetched from a coordination-service node, plus its identity
//! let text = "GET_PART\n\
//!             source_replica=r1\n\
//!             new_part_name=20230101_1_1_0\n\
//!             create_time=100\n\
//!             quorum=0";
//! let entry = LogEntry::parse(text, &NodeStat::new("log-0000000001", 0))?;
//!
//! // Track an execution attempt against the engine's shared part sets
//! let parts = Arc::new(PartSets::new());
//! let entry = QueueEntry::new(entry);
//! entry.begin_attempt(parts.clone())?;
//! // ... fetch the part, with no lock held ...
//! entry.record_success(parts.as_ref())?;
//! # Ok::<(), tesseradb::Error>(())
//! ```
//!
//! Scheduling between entries and the action bodies themselves are the
//! surrounding engine's concern; see `tessera-replication` for the seam
//! it implements against.

pub use tessera_core::{Error, PartName, PartNameError, Result, Timestamp};
pub use tessera_replication::{
    EntryAction, EntryKind, EntryStatus, FuturePartTagger, LogEntry, NodeStat, PartRegistry,
    PartSets, QueueEntry, FORMAT_VERSION,
};
