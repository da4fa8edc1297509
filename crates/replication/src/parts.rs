//! Shared future-part and virtual-part bookkeeping
//!
//! Two sets, owned by the storage engine and shared by every queue entry
//! in the process:
//!
//! - **future parts** - names reserved because some in-flight entry will
//!   produce them. Prevents two independently scheduled actions from
//!   producing the same part concurrently.
//! - **virtual parts** - names the replica currently exposes as logically
//!   present, whether or not background work has physically finished.
//!   Answers "does this replica have part X" without blocking on
//!   in-flight execution.
//!
//! [`PartRegistry`] is the seam: exactly the operations this core
//! consumes from the surrounding storage engine. [`PartSets`] is the
//! in-process implementation, both sets behind one coarse lock - each
//! entry holds its slot only while queued or executing, never while its
//! external action body runs, so contention stays low.

use parking_lot::Mutex;
use std::collections::HashSet;
use tessera_core::{Error, PartName, Result};
use tracing::warn;

/// Part bookkeeping operations the replication core consumes from the
/// storage engine
pub trait PartRegistry: Send + Sync {
    /// Reserve `name` as the output of an in-flight entry
    ///
    /// Fails with [`Error::Logical`] if the name is already reserved -
    /// the caller must have verified non-conflict under its own lock
    /// before reserving, so a duplicate is a caller bug, not a race to
    /// resolve silently.
    fn register_future_part(&self, name: &str) -> Result<()>;

    /// Release a reservation made by [`register_future_part`]
    ///
    /// [`register_future_part`]: PartRegistry::register_future_part
    fn unregister_future_part(&self, name: &str);

    /// Whether `name` is currently reserved by an in-flight entry
    fn has_future_part(&self, name: &str) -> bool;

    /// Expose `name` as logically present on this replica
    fn add_virtual_part(&self, name: &str);
}

#[derive(Debug, Default)]
struct PartSetsInner {
    future_parts: HashSet<String>,
    virtual_parts: HashSet<String>,
}

/// In-process implementation of [`PartRegistry`]
#[derive(Debug, Default)]
pub struct PartSets {
    inner: Mutex<PartSetsInner>,
}

impl PartSets {
    /// Create empty part sets
    pub fn new() -> Self {
        PartSets::default()
    }

    /// Whether `name` is exposed as logically present
    pub fn has_virtual_part(&self, name: &str) -> bool {
        self.inner.lock().virtual_parts.contains(name)
    }

    /// Sorted snapshot of the virtual-parts index
    pub fn virtual_parts(&self) -> Vec<String> {
        let mut parts: Vec<String> = self.inner.lock().virtual_parts.iter().cloned().collect();
        parts.sort();
        parts
    }

    /// Sorted snapshot of the currently reserved future parts
    pub fn future_parts(&self) -> Vec<String> {
        let mut parts: Vec<String> = self.inner.lock().future_parts.iter().cloned().collect();
        parts.sort();
        parts
    }

    /// Find an in-flight output covered by `range`
    ///
    /// Returns the first (lexicographically) reserved future part whose
    /// name parses as a part name and falls inside `range`. A drop range
    /// uses this to wait out merges it will supersede before executing.
    /// Reserved names that are not structured part names (synthetic range
    /// identifiers) never match.
    pub fn covered_future_part(&self, range: &PartName) -> Option<String> {
        self.future_parts().into_iter().find(|name| {
            PartName::parse(name)
                .map(|part| range.covers(&part))
                .unwrap_or(false)
        })
    }
}

impl PartRegistry for PartSets {
    fn register_future_part(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.future_parts.insert(name.to_string()) {
            return Err(Error::Logical(format!(
                "part {} is already tagged as future",
                name
            )));
        }
        Ok(())
    }

    fn unregister_future_part(&self, name: &str) {
        let mut inner = self.inner.lock();
        if !inner.future_parts.remove(name) {
            // Unbalanced release; the tagger guarantees exactly-once, so
            // reaching here means someone bypassed it.
            warn!("released future part {} that was not reserved", name);
        }
    }

    fn has_future_part(&self, name: &str) -> bool {
        self.inner.lock().future_parts.contains(name)
    }

    fn add_virtual_part(&self, name: &str) {
        self.inner.lock().virtual_parts.insert(name.to_string());
    }
}
