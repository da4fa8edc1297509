//! Tracked queue entry: the attempt/postpone/completion state machine
//!
//! A [`QueueEntry`] wraps an immutable [`LogEntry`] with the mutable
//! bookkeeping of its execution attempts. Worker threads run entries in
//! parallel; every bookkeeping mutation happens under the entry's own
//! lock, and the external action body (merge, fetch, attach, drop) runs
//! with no lock held so it can block on I/O without stalling unrelated
//! entries.
//!
//! The attempt protocol:
//!
//! 1. The queue checks [`execution_conflict`] under its scheduling pass;
//!    a conflict turns into [`record_postponed`] instead of an attempt.
//! 2. [`begin_attempt`] reserves the output name (via
//!    [`FuturePartTagger`]), flips `currently_executing`, and bumps
//!    `num_tries`.
//! 3. The worker runs the external action, lock-free.
//! 4. [`record_success`] or [`record_failure`] releases the reservation,
//!    clears `currently_executing`, and wakes everyone blocked in
//!    [`wait_for_completion`] - waiters unblock on failure too.
//!
//! There is no cancellation: an attempt runs to completion, and shutdown
//! paths wait entries out before tearing down the shared part sets.
//!
//! [`execution_conflict`]: QueueEntry::execution_conflict
//! [`begin_attempt`]: QueueEntry::begin_attempt
//! [`record_success`]: QueueEntry::record_success
//! [`record_failure`]: QueueEntry::record_failure
//! [`record_postponed`]: QueueEntry::record_postponed
//! [`wait_for_completion`]: QueueEntry::wait_for_completion

use crate::entry::{EntryAction, EntryKind, LogEntry};
use crate::parts::PartRegistry;
use crate::tagger::FuturePartTagger;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tessera_core::{Error, Result, Timestamp};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct ExecState {
    currently_executing: bool,
    num_tries: u64,
    last_exception: Option<Error>,
    last_attempt_time: Option<Timestamp>,
    num_postponed: u64,
    postpone_reason: Option<String>,
    last_postpone_time: Option<Timestamp>,
    /// Live reservation of the output name; present exactly while
    /// `currently_executing` is true
    tagger: Option<FuturePartTagger>,
}

/// Snapshot of an entry's identity and execution bookkeeping
///
/// What a system-table view of the queue would show. Serializable so
/// introspection surfaces can expose it directly.
#[derive(Debug, Clone, Serialize)]
pub struct EntryStatus {
    /// Shared-log node name; empty for locally originated entries
    pub znode_name: String,
    /// Action kind label
    pub kind: EntryKind,
    /// Authoring replica; empty means locally originated
    pub source_replica: String,
    /// Name of the part the entry produces
    pub new_part_name: String,
    /// Entry creation time
    pub create_time: Timestamp,
    /// Quorum size (GetPart under quorum-write only)
    pub quorum: u64,
    /// Whether an attempt is running right now
    pub currently_executing: bool,
    /// Attempts started since this process created the entry
    pub num_tries: u64,
    /// Message of the last failed attempt, if any
    pub last_exception: Option<String>,
    /// Start time of the last attempt
    pub last_attempt_time: Option<Timestamp>,
    /// Times a scheduling pass deferred the entry without attempting it
    pub num_postponed: u64,
    /// Reason for the most recent postponement
    pub postpone_reason: Option<String>,
    /// Time of the most recent postponement
    pub last_postpone_time: Option<Timestamp>,
}

/// A log entry tracked through its execution attempts
pub struct QueueEntry {
    record: LogEntry,
    state: Mutex<ExecState>,
    /// Woken whenever `currently_executing` becomes false
    execution_complete: Condvar,
}

impl QueueEntry {
    /// Wrap a record for tracking
    ///
    /// Bookkeeping starts at fresh-instance defaults regardless of how
    /// many attempts other processes (or a previous incarnation of this
    /// one) made.
    pub fn new(record: LogEntry) -> Self {
        QueueEntry {
            record,
            state: Mutex::new(ExecState::default()),
            execution_complete: Condvar::new(),
        }
    }

    /// The wrapped record
    pub fn record(&self) -> &LogEntry {
        &self.record
    }

    /// Whether an attempt is running right now
    pub fn is_currently_executing(&self) -> bool {
        self.state.lock().currently_executing
    }

    /// Attempts started so far (including a running one)
    pub fn num_tries(&self) -> u64 {
        self.state.lock().num_tries
    }

    /// Times the entry was deferred without an attempt
    pub fn num_postponed(&self) -> u64 {
        self.state.lock().num_postponed
    }

    /// Error recorded by the last failed attempt, if any
    pub fn last_exception(&self) -> Option<Error> {
        self.state.lock().last_exception.clone()
    }

    /// Why execution cannot start right now, if it cannot
    ///
    /// The pre-check a scheduling pass runs before committing to an
    /// attempt: the produced name must not be reserved by another
    /// in-flight entry, and a merge must not consume a part that is
    /// itself an in-flight output. The returned reason is suitable for
    /// [`record_postponed`](QueueEntry::record_postponed).
    ///
    /// The caller must hold its scheduling decision and the subsequent
    /// [`begin_attempt`](QueueEntry::begin_attempt) under one lock for
    /// the answer to stay true.
    pub fn execution_conflict(&self, registry: &dyn PartRegistry) -> Option<String> {
        let new_part = self.record.new_part_name();
        if registry.has_future_part(new_part) {
            return Some(format!(
                "part {} is already being produced by another entry",
                new_part
            ));
        }
        if let EntryAction::MergeParts { source_parts, .. } = &self.record.action {
            for part in source_parts {
                if registry.has_future_part(part) {
                    return Some(format!(
                        "source part {} is an in-flight output of another entry",
                        part
                    ));
                }
            }
        }
        None
    }

    /// Start an execution attempt
    ///
    /// Reserves the output name, flips `currently_executing`, bumps
    /// `num_tries`, and stamps `last_attempt_time`. Fails with
    /// [`Error::Logical`] if an attempt is already running or the output
    /// name is reserved by another entry - both are caller bugs, since
    /// the queue is expected to have checked
    /// [`execution_conflict`](QueueEntry::execution_conflict) first.
    pub fn begin_attempt(&self, registry: Arc<dyn PartRegistry>) -> Result<()> {
        let mut state = self.state.lock();
        if state.currently_executing {
            return Err(Error::Logical(format!(
                "entry producing {} is already executing",
                self.record.new_part_name()
            )));
        }
        let tagger = FuturePartTagger::new(self.record.new_part_name(), registry)?;
        state.currently_executing = true;
        state.num_tries += 1;
        state.last_attempt_time = Some(Timestamp::now());
        state.tagger = Some(tagger);
        debug!(
            "attempt {} started for {} entry producing {}",
            state.num_tries,
            self.record.kind(),
            self.record.new_part_name()
        );
        Ok(())
    }

    /// Record a successful attempt
    ///
    /// Exposes the produced name in the virtual-parts index, releases the
    /// reservation, and wakes completion waiters. The virtual part
    /// outlives the reservation: the replica keeps answering "I have this
    /// part" after the attempt's bookkeeping is gone.
    pub fn record_success(&self, registry: &dyn PartRegistry) -> Result<()> {
        let mut state = self.state.lock();
        if !state.currently_executing {
            return Err(Error::Logical(format!(
                "success recorded for entry producing {} with no attempt running",
                self.record.new_part_name()
            )));
        }
        registry.add_virtual_part(self.record.new_part_name());
        state.tagger = None;
        state.currently_executing = false;
        debug!(
            "attempt {} succeeded for entry producing {}",
            state.num_tries,
            self.record.new_part_name()
        );
        self.execution_complete.notify_all();
        Ok(())
    }

    /// Record a failed attempt
    ///
    /// Keeps the entry pending for retry, releases the reservation, and
    /// wakes completion waiters - a waiter blocked on "this attempt
    /// finished" unblocks on failure too.
    pub fn record_failure(&self, error: Error) -> Result<()> {
        let mut state = self.state.lock();
        if !state.currently_executing {
            return Err(Error::Logical(format!(
                "failure recorded for entry producing {} with no attempt running",
                self.record.new_part_name()
            )));
        }
        warn!(
            "attempt {} failed for entry producing {}: {}",
            state.num_tries,
            self.record.new_part_name(),
            error
        );
        state.last_exception = Some(error);
        state.tagger = None;
        state.currently_executing = false;
        self.execution_complete.notify_all();
        Ok(())
    }

    /// Record that a scheduling pass deferred the entry without an
    /// attempt
    ///
    /// Never touches `num_tries` or `currently_executing`. Fails with
    /// [`Error::Logical`] if an attempt is running - the scheduler only
    /// considers pending entries.
    pub fn record_postponed(&self, reason: impl Into<String>) -> Result<()> {
        let mut state = self.state.lock();
        if state.currently_executing {
            return Err(Error::Logical(format!(
                "cannot postpone entry producing {} while it is executing",
                self.record.new_part_name()
            )));
        }
        let reason = reason.into();
        state.num_postponed += 1;
        state.last_postpone_time = Some(Timestamp::now());
        debug!(
            "postponed entry producing {}: {}",
            self.record.new_part_name(),
            reason
        );
        state.postpone_reason = Some(reason);
        Ok(())
    }

    /// Block until no attempt is running
    ///
    /// Covers both outcomes: returns when the current attempt (if any)
    /// has recorded success or failure. Returns immediately if the entry
    /// is not executing.
    pub fn wait_for_completion(&self) {
        let mut state = self.state.lock();
        while state.currently_executing {
            self.execution_complete.wait(&mut state);
        }
    }

    /// Bounded [`wait_for_completion`](QueueEntry::wait_for_completion)
    ///
    /// Returns `true` if the entry is not executing when the wait ends,
    /// `false` if the timeout elapsed with an attempt still running.
    pub fn wait_for_completion_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.currently_executing {
            if self
                .execution_complete
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return !state.currently_executing;
            }
        }
        true
    }

    /// Snapshot identity and bookkeeping for introspection
    pub fn status(&self) -> EntryStatus {
        let state = self.state.lock();
        EntryStatus {
            znode_name: self.record.znode_name.clone(),
            kind: self.record.kind(),
            source_replica: self.record.source_replica.clone(),
            new_part_name: self.record.new_part_name().to_string(),
            create_time: self.record.create_time,
            quorum: self.record.quorum,
            currently_executing: state.currently_executing,
            num_tries: state.num_tries,
            last_exception: state.last_exception.as_ref().map(|e| e.to_string()),
            last_attempt_time: state.last_attempt_time,
            num_postponed: state.num_postponed,
            postpone_reason: state.postpone_reason.clone(),
            last_postpone_time: state.last_postpone_time,
        }
    }
}

impl std::fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEntry")
            .field("record", &self.record)
            .field("state", &*self.state.lock())
            .finish()
    }
}
