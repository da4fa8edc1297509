//! Replicated log entry record
//!
//! A log entry describes one action every replica must eventually apply:
//! fetch a part from a peer, merge parts, drop a block range, or attach a
//! part from the detached/unreplicated area. Entries are pure data - the
//! execution bookkeeping around an attempt lives in
//! [`QueueEntry`](crate::QueueEntry).
//!
//! The action kind is a sum type: each variant carries exactly the fields
//! that kind needs, so invalid combinations (a merge with no inputs being
//! the classic one) are either unrepresentable or rejected by
//! [`LogEntry::validate`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tessera_core::{Error, Result, Timestamp};

/// Kind label for a log entry action
///
/// The `as_str` form is what the node text format and user-facing
/// introspection use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    /// Fetch a part from a peer replica
    GetPart,
    /// Merge parts into one
    MergeParts,
    /// Drop (or detach) all parts covered by a block range
    DropRange,
    /// Attach a part from the detached or unreplicated area
    AttachPart,
}

impl EntryKind {
    /// The wire/user-facing token for this kind
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntryKind::GetPart => "GET_PART",
            EntryKind::MergeParts => "MERGE_PARTS",
            EntryKind::DropRange => "DROP_RANGE",
            EntryKind::AttachPart => "ATTACH_PART",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GET_PART" => Ok(EntryKind::GetPart),
            "MERGE_PARTS" => Ok(EntryKind::MergeParts),
            "DROP_RANGE" => Ok(EntryKind::DropRange),
            "ATTACH_PART" => Ok(EntryKind::AttachPart),
            other => Err(Error::MalformedEntry(format!(
                "unknown log entry type '{}'",
                other
            ))),
        }
    }
}

/// The action a log entry describes, with per-kind fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryAction {
    /// Fetch `part_name` from a peer replica
    GetPart {
        /// Name of the part to fetch; also the name this entry produces
        part_name: String,
    },
    /// Merge `source_parts` into `merged_part`
    MergeParts {
        /// Input parts, in merge order; must be non-empty
        source_parts: Vec<String>,
        /// Name of the part the merge produces
        merged_part: String,
    },
    /// Drop all parts covered by `range_name`
    DropRange {
        /// Synthetic range identifier covering the parts to drop;
        /// not a producible part
        range_name: String,
        /// Move covered parts to the detached area instead of deleting
        detach: bool,
    },
    /// Attach an existing part from the detached or unreplicated area
    AttachPart {
        /// Name of the part in the detached/unreplicated area
        source_part_name: String,
        /// Name the part is exposed under once attached
        attached_part: String,
        /// Source lives in the unreplicated area rather than detached
        from_unreplicated: bool,
    },
}

impl EntryAction {
    /// Kind label for this action
    pub const fn kind(&self) -> EntryKind {
        match self {
            EntryAction::GetPart { .. } => EntryKind::GetPart,
            EntryAction::MergeParts { .. } => EntryKind::MergeParts,
            EntryAction::DropRange { .. } => EntryKind::DropRange,
            EntryAction::AttachPart { .. } => EntryKind::AttachPart,
        }
    }

    /// Name of the part this action produces
    ///
    /// For a drop range this is the synthetic range identifier - it is
    /// still the name reserved while the entry executes, so no concurrent
    /// entry can claim it.
    pub fn new_part_name(&self) -> &str {
        match self {
            EntryAction::GetPart { part_name } => part_name,
            EntryAction::MergeParts { merged_part, .. } => merged_part,
            EntryAction::DropRange { range_name, .. } => range_name,
            EntryAction::AttachPart { attached_part, .. } => attached_part,
        }
    }
}

/// One record of the shared replication log
///
/// Action and identity fields are immutable after construction; the
/// mutable attempt bookkeeping lives in [`QueueEntry`](crate::QueueEntry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Node name assigned by the coordination service; empty when the
    /// entry was synthesized locally and never copied from the shared log
    pub znode_name: String,
    /// Replica that authored the entry; empty means locally originated
    pub source_replica: String,
    /// The action to apply
    pub action: EntryAction,
    /// Creation time, or copy-into-queue time for shared-log entries
    pub create_time: Timestamp,
    /// Quorum size; non-zero only for GetPart entries created under
    /// quorum-write
    pub quorum: u64,
}

impl LogEntry {
    /// Create a locally originated entry for `action`
    ///
    /// The entry has no shared-log position and no source replica;
    /// `create_time` is stamped with the current time.
    pub fn local(action: EntryAction) -> Self {
        LogEntry {
            znode_name: String::new(),
            source_replica: String::new(),
            action,
            create_time: Timestamp::now(),
            quorum: 0,
        }
    }

    /// Kind label of the entry's action
    pub const fn kind(&self) -> EntryKind {
        self.action.kind()
    }

    /// Name of the part the entry produces
    pub fn new_part_name(&self) -> &str {
        self.action.new_part_name()
    }

    /// Whether the entry was originated on this replica rather than
    /// copied from the shared log
    pub fn is_local(&self) -> bool {
        self.source_replica.is_empty()
    }

    /// Check the structural invariants of the record
    ///
    /// Rejects with [`Error::MalformedEntry`]:
    /// - an empty produced-part name (any kind)
    /// - a merge with no input parts, or an empty input part name
    /// - an attach with an empty source part name
    /// - a non-zero quorum on anything but a GetPart
    pub fn validate(&self) -> Result<()> {
        if self.new_part_name().is_empty() {
            return Err(Error::MalformedEntry(format!(
                "{} entry is missing new_part_name",
                self.kind()
            )));
        }
        match &self.action {
            EntryAction::MergeParts { source_parts, .. } => {
                if source_parts.is_empty() {
                    return Err(Error::MalformedEntry(
                        "MERGE_PARTS entry has no parts to merge".to_string(),
                    ));
                }
                if source_parts.iter().any(|p| p.is_empty()) {
                    return Err(Error::MalformedEntry(
                        "MERGE_PARTS entry has an empty source part name".to_string(),
                    ));
                }
            }
            EntryAction::AttachPart {
                source_part_name, ..
            } => {
                if source_part_name.is_empty() {
                    return Err(Error::MalformedEntry(
                        "ATTACH_PART entry is missing source_part_name".to_string(),
                    ));
                }
            }
            EntryAction::GetPart { .. } | EntryAction::DropRange { .. } => {}
        }
        if self.quorum != 0 && self.kind() != EntryKind::GetPart {
            return Err(Error::MalformedEntry(format!(
                "{} entry carries a quorum value",
                self.kind()
            )));
        }
        Ok(())
    }
}
