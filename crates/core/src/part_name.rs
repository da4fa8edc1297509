//! Part name contract type
//!
//! Parts are the immutable units of stored data the engine manages.
//! A part name encodes where the part sits in the table:
//!
//! ```text
//! <partition>_<min_block>_<max_block>_<level>
//! ```
//!
//! - **partition**: the partition the part belongs to (e.g. `20230101`)
//! - **min_block / max_block**: the contiguous block-number range the
//!   part holds
//! - **level**: how many merge generations produced it (0 = freshly
//!   inserted)
//!
//! Replication entries carry part names as plain strings on the wire -
//! a drop-range entry's "name" is a synthetic range identifier and a
//! producible part name is only required to be non-empty. `PartName` is
//! the parsed form the engine side uses to answer range-coverage
//! questions: whether one part's block range encloses another's.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Parsed part name: partition, block range, and merge level
///
/// ## Invariants
///
/// - The partition identifier is non-empty and contains no `_`
/// - `min_block <= max_block`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartName {
    partition_id: String,
    min_block: u64,
    max_block: u64,
    level: u32,
}

/// Error when validating a part name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartNameError {
    /// Name is empty
    Empty,
    /// Name does not have the four `_`-separated segments
    WrongSegmentCount {
        /// Number of segments found
        count: usize,
    },
    /// Partition segment is empty
    EmptyPartition,
    /// A numeric segment did not parse
    BadNumber {
        /// Which segment failed
        segment: &'static str,
        /// The offending token
        token: String,
    },
    /// Block range has min > max
    InvertedRange {
        /// Minimum block number
        min: u64,
        /// Maximum block number
        max: u64,
    },
}

impl fmt::Display for PartNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartNameError::Empty => write!(f, "part name cannot be empty"),
            PartNameError::WrongSegmentCount { count } => {
                write!(
                    f,
                    "part name must have 4 segments (partition_min_max_level), found {}",
                    count
                )
            }
            PartNameError::EmptyPartition => write!(f, "partition segment cannot be empty"),
            PartNameError::BadNumber { segment, token } => {
                write!(f, "invalid {} segment '{}'", segment, token)
            }
            PartNameError::InvertedRange { min, max } => {
                write!(f, "block range inverted: min {} > max {}", min, max)
            }
        }
    }
}

impl std::error::Error for PartNameError {}

impl From<PartNameError> for Error {
    fn from(e: PartNameError) -> Self {
        Error::MalformedEntry(e.to_string())
    }
}

impl PartName {
    /// Create a part name from its components, validating the input
    pub fn new(
        partition_id: impl Into<String>,
        min_block: u64,
        max_block: u64,
        level: u32,
    ) -> std::result::Result<Self, PartNameError> {
        let partition_id = partition_id.into();
        if partition_id.is_empty() {
            return Err(PartNameError::EmptyPartition);
        }
        if partition_id.contains('_') {
            // An underscore in the partition would make the name ambiguous
            return Err(PartNameError::BadNumber {
                segment: "partition",
                token: partition_id,
            });
        }
        if min_block > max_block {
            return Err(PartNameError::InvertedRange {
                min: min_block,
                max: max_block,
            });
        }
        Ok(PartName {
            partition_id,
            min_block,
            max_block,
            level,
        })
    }

    /// Parse a `partition_min_max_level` part name
    pub fn parse(s: &str) -> std::result::Result<Self, PartNameError> {
        if s.is_empty() {
            return Err(PartNameError::Empty);
        }
        let segments: Vec<&str> = s.split('_').collect();
        if segments.len() != 4 {
            return Err(PartNameError::WrongSegmentCount {
                count: segments.len(),
            });
        }
        let min_block: u64 = segments[1].parse().map_err(|_| PartNameError::BadNumber {
            segment: "min_block",
            token: segments[1].to_string(),
        })?;
        let max_block: u64 = segments[2].parse().map_err(|_| PartNameError::BadNumber {
            segment: "max_block",
            token: segments[2].to_string(),
        })?;
        let level: u32 = segments[3].parse().map_err(|_| PartNameError::BadNumber {
            segment: "level",
            token: segments[3].to_string(),
        })?;
        PartName::new(segments[0], min_block, max_block, level)
    }

    /// Partition this part belongs to
    #[inline]
    pub fn partition_id(&self) -> &str {
        &self.partition_id
    }

    /// First block number held by this part
    #[inline]
    pub const fn min_block(&self) -> u64 {
        self.min_block
    }

    /// Last block number held by this part
    #[inline]
    pub const fn max_block(&self) -> u64 {
        self.max_block
    }

    /// Merge generation (0 = freshly inserted)
    #[inline]
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Whether this part's block range encloses `other`'s
    ///
    /// A part covers another when they share a partition, the other's
    /// block range fits inside this one's, and this part's level is at
    /// least the other's. A part covers itself. Used to decide whether a
    /// drop range supersedes a part (or an in-flight merge output).
    pub fn covers(&self, other: &PartName) -> bool {
        self.partition_id == other.partition_id
            && self.min_block <= other.min_block
            && other.max_block <= self.max_block
            && self.level >= other.level
    }
}

impl fmt::Display for PartName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.partition_id, self.min_block, self.max_block, self.level
        )
    }
}

impl FromStr for PartName {
    type Err = PartNameError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        PartName::parse(s)
    }
}
