//! Activity data model for the takt event log.
//!
//! This module defines the core `ActivityEvent` struct, the `ActivityKind`
//! enum covering the four lifecycle verbs, the per-worker `ActivityKey`,
//! and the submodules that store, resolve, and apply activity events.
//!
//! Activity state is never stored directly: the append-only event log is
//! the single source of truth, and a worker's current state is always
//! derived by projecting over their latest logged event.

pub mod crew;
pub mod kind;
pub mod log;
pub mod machine;
pub mod state;

pub use crew::{CrewOutcome, CrewReport, CrewRequest};
pub use kind::{ActivityKind, UnknownKind};
pub use log::{ActivityLog, LogError, MemoryLog};
pub use machine::{ActionRequest, ActivityError, ActivityMachine};
pub use state::{ActivityPhase, WorkerActivityState};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one worker's run on one work order.
///
/// Events are grouped, resolved, and serialized per key: two workers on
/// the same order are independent streams, as are one worker's runs on
/// two different orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityKey {
    /// Work order number.
    pub order_id: u32,
    /// Worker badge number.
    pub worker_id: u32,
}

impl ActivityKey {
    /// Build a key from its two parts.
    #[must_use]
    pub const fn new(order_id: u32, worker_id: u32) -> Self {
        Self {
            order_id,
            worker_id,
        }
    }
}

impl std::fmt::Display for ActivityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.order_id, self.worker_id)
    }
}

/// A single activity event in the takt log.
///
/// Each event records one worker lifecycle action (start, stop, resume,
/// finish) against a work order at a machine. Events are immutable once
/// appended; corrections are made by appending further events, never by
/// editing history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Unique event id, assigned at append time.
    pub id: Uuid,

    /// Work order number this event belongs to.
    pub order_id: u32,

    /// Machine or station code where the action happened.
    pub machine_code: String,

    /// Badge number of the worker performing the action.
    pub worker_id: u32,

    /// Which lifecycle action this event records.
    pub kind: ActivityKind,

    /// Wall-clock time the action was accepted.
    pub occurred_at: DateTime<Utc>,

    /// Reason code for a pause.
    ///
    /// Present exactly when `kind` is `Stop`; every pause must say why.
    pub break_code: Option<String>,

    /// Free-form operator note, if any.
    pub notes: Option<String>,
}

impl ActivityEvent {
    /// Return the key grouping this event with the rest of its stream.
    #[must_use]
    pub const fn key(&self) -> ActivityKey {
        ActivityKey {
            order_id: self.order_id,
            worker_id: self.worker_id,
        }
    }
}

impl std::fmt::Display for ActivityEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} worker={} order={} machine={}",
            self.occurred_at.format("%Y-%m-%dT%H:%M:%SZ"),
            self.kind,
            self.worker_id,
            self.order_id,
            self.machine_code,
        )?;
        if let Some(code) = &self.break_code {
            write!(f, " break={code}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
