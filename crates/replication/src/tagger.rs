//! Scoped future-part reservation
//!
//! A [`FuturePartTagger`] marks a part name as the output of an in-flight
//! entry for exactly as long as the guard lives. Releasing on drop is the
//! point: whether the attempt succeeds, fails, or the owning entry is
//! torn down mid-flight, the reservation comes back out of the shared set
//! exactly once. A reservation that outlives its attempt blocks every
//! future entry producing the same name; one released early lets two
//! workers race into the same part directory.

use crate::parts::PartRegistry;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// RAII reservation of a part name in the shared future-parts set
///
/// Construction registers the name; drop unregisters it unconditionally.
/// Holds a reference to the storage engine's registry, never ownership of
/// its contents.
pub struct FuturePartTagger {
    part_name: String,
    registry: Arc<dyn PartRegistry>,
}

impl FuturePartTagger {
    /// Reserve `part_name` in `registry`
    ///
    /// Fails with a logical error if the name is already reserved. The
    /// caller is expected to have checked for conflicts under its own
    /// lock before committing to the attempt; construction does not make
    /// that check race-free for it.
    pub fn new(
        part_name: impl Into<String>,
        registry: Arc<dyn PartRegistry>,
    ) -> tessera_core::Result<Self> {
        let part_name = part_name.into();
        registry.register_future_part(&part_name)?;
        debug!("tagged part {} as future", part_name);
        Ok(FuturePartTagger {
            part_name,
            registry,
        })
    }

    /// The reserved part name
    pub fn part_name(&self) -> &str {
        &self.part_name
    }
}

impl Drop for FuturePartTagger {
    fn drop(&mut self) {
        self.registry.unregister_future_part(&self.part_name);
        debug!("released future part {}", self.part_name);
    }
}

impl fmt::Debug for FuturePartTagger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuturePartTagger")
            .field("part_name", &self.part_name)
            .finish()
    }
}
