//! Activity state machine.
//!
//! Validates one worker action against the worker's derived state and, if
//! legal, appends the resulting event — as a single atomic unit per
//! `(order, worker)` key. Two requests for the same key serialize on a
//! keyed mutex; requests for distinct keys never block each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;
use uuid::Uuid;

use super::log::{ActivityLog, LogError, MemoryLog};
use super::state::{ActivityPhase, WorkerActivityState};
use super::{ActivityEvent, ActivityKey, ActivityKind};
use crate::clock::{Clock, SystemClock};
use crate::error::ErrorCode;

/// Prune dead lock entries once the table grows past this.
const KEY_LOCK_PRUNE_THRESHOLD: usize = 128;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced when applying a worker action.
#[derive(Debug, thiserror::Error)]
pub enum ActivityError {
    /// The requested action is not legal in the worker's current phase.
    #[error("cannot {requested} while {phase}")]
    InvalidTransition {
        /// The action that was asked for.
        requested: ActivityKind,
        /// The phase the worker was in when it was asked.
        phase: ActivityPhase,
    },

    /// A stop was requested without a break reason code.
    #[error("stop requires a break reason code")]
    MissingBreakCode,

    /// The underlying log failed.
    #[error(transparent)]
    Log(#[from] LogError),
}

impl ActivityError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            Self::MissingBreakCode => ErrorCode::MissingBreakCode,
            Self::Log(inner) => inner.code(),
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// One worker action as received from a terminal.
///
/// Timestamps and event ids are assigned by the machine at accept time,
/// never by the caller.
#[derive(Debug, Clone, Copy)]
pub struct ActionRequest<'a> {
    /// Work order the action applies to.
    pub order_id: u32,
    /// Worker performing the action.
    pub worker_id: u32,
    /// Machine or station code the terminal is bound to.
    pub machine_code: &'a str,
    /// Which lifecycle action.
    pub kind: ActivityKind,
    /// Break reason code; required when `kind` is stop.
    pub break_code: Option<&'a str>,
    /// Optional operator note.
    pub notes: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// Applies worker actions against the activity log.
///
/// The machine owns no state of its own beyond a table of per-key locks;
/// all truth lives in the log. Cheap to share behind an `Arc` across
/// request-handling threads.
pub struct ActivityMachine<L: ActivityLog> {
    log: Arc<L>,
    clock: Arc<dyn Clock>,
    key_locks: Mutex<HashMap<ActivityKey, Weak<Mutex<()>>>>,
}

impl ActivityMachine<MemoryLog> {
    /// Machine over a fresh in-memory log and the system clock.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryLog::new()), Arc::new(SystemClock))
    }
}

impl<L: ActivityLog> ActivityMachine<L> {
    /// Build a machine over the given log and clock.
    #[must_use]
    pub fn new(log: Arc<L>, clock: Arc<dyn Clock>) -> Self {
        Self {
            log,
            clock,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The log this machine appends to.
    #[must_use]
    pub fn log(&self) -> &Arc<L> {
        &self.log
    }

    /// Validate and apply one worker action.
    ///
    /// Check-then-append runs under the key's lock, so a concurrent
    /// request for the same worker and order sees the appended event
    /// rather than the state both started from.
    ///
    /// # Errors
    ///
    /// - [`ActivityError::InvalidTransition`] if the action is not legal
    ///   in the worker's current phase.
    /// - [`ActivityError::MissingBreakCode`] if a stop carries no break
    ///   reason code (blank counts as missing).
    /// - [`ActivityError::Log`] if the log backend failed.
    pub fn apply(&self, req: &ActionRequest<'_>) -> Result<ActivityEvent, ActivityError> {
        let key = ActivityKey::new(req.order_id, req.worker_id);
        let key_lock = self.acquire_key_lock(key)?;
        let _guard = key_lock
            .lock()
            .map_err(|_| poisoned("activity key lock"))?;

        let state = WorkerActivityState::from_latest(self.log.latest_for(&key)?);
        if !state.permits(req.kind) {
            debug!(
                key = %key,
                requested = %req.kind,
                phase = %state.phase,
                "reject activity action"
            );
            return Err(ActivityError::InvalidTransition {
                requested: req.kind,
                phase: state.phase,
            });
        }

        let break_code = normalize_break_code(req)?;
        let event = ActivityEvent {
            id: Uuid::new_v4(),
            order_id: req.order_id,
            machine_code: req.machine_code.to_string(),
            worker_id: req.worker_id,
            kind: req.kind,
            occurred_at: self.clock.now(),
            break_code,
            notes: req.notes.map(ToOwned::to_owned),
        };
        self.log.append(event.clone())?;
        debug!(key = %key, kind = %req.kind, event_id = %event.id, "applied activity action");
        Ok(event)
    }

    /// Resolve a worker's current state without changing anything.
    ///
    /// # Errors
    ///
    /// Returns [`ActivityError::Log`] if the log backend failed.
    pub fn state_of(
        &self,
        order_id: u32,
        worker_id: u32,
    ) -> Result<WorkerActivityState, ActivityError> {
        let key = ActivityKey::new(order_id, worker_id);
        Ok(WorkerActivityState::from_latest(self.log.latest_for(&key)?))
    }

    /// Get or create the serialization lock for a key.
    ///
    /// Locks are held by weak reference so idle keys cost nothing; dead
    /// entries are pruned opportunistically when the table grows.
    fn acquire_key_lock(&self, key: ActivityKey) -> Result<Arc<Mutex<()>>, ActivityError> {
        let mut locks = self
            .key_locks
            .lock()
            .map_err(|_| poisoned("activity key lock table"))?;

        if locks.len() > KEY_LOCK_PRUNE_THRESHOLD {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        if let Some(existing) = locks.get(&key).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let lock = Arc::new(Mutex::new(()));
        let _ = locks.insert(key, Arc::downgrade(&lock));
        Ok(lock)
    }
}

impl<L: ActivityLog> std::fmt::Debug for ActivityMachine<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityMachine").finish_non_exhaustive()
    }
}

/// Require a non-blank break code for stops; drop it for everything else.
fn normalize_break_code(req: &ActionRequest<'_>) -> Result<Option<String>, ActivityError> {
    if req.kind != ActivityKind::Stop {
        return Ok(None);
    }
    req.break_code
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map_or(Err(ActivityError::MissingBreakCode), |code| {
            Ok(Some(code.to_string()))
        })
}

fn poisoned(what: &str) -> ActivityError {
    ActivityError::Log(LogError::Backend {
        message: format!("{what} poisoned"),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
