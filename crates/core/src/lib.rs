//! Core contract types for the Tessera replication engine
//!
//! This crate defines the foundational types shared across the workspace:
//! - Error: the workspace error taxonomy
//! - PartName: parsed part name with block-range coverage semantics
//! - Timestamp: seconds-precision timestamp carried by log entries

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod part_name;
pub mod timestamp;

pub use error::{Error, Result};
pub use part_name::{PartName, PartNameError};
pub use timestamp::Timestamp;
