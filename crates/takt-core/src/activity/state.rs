//! Derived worker activity state.
//!
//! State is a pure projection over the event log: only the latest event
//! of a `(order, worker)` stream matters, and resolving it has no side
//! effects. Nothing here is ever stored; callers re-resolve after every
//! append.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ActivityEvent, ActivityKind};

/// The three phases a worker can be in on a work order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityPhase {
    /// Not working: never started, or the last run was finished.
    Idle,
    /// Actively working after a start or resume.
    Running,
    /// Work paused by a stop; the run is still open.
    Paused,
}

impl ActivityPhase {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
        }
    }

    /// The phase a worker is in after an event of the given kind.
    #[must_use]
    pub const fn after(kind: ActivityKind) -> Self {
        match kind {
            ActivityKind::Start | ActivityKind::Resume => Self::Running,
            ActivityKind::Stop => Self::Paused,
            ActivityKind::Finish => Self::Idle,
        }
    }

    /// Whether an action of the given kind is legal in this phase.
    ///
    /// The full lifecycle table:
    /// - `idle -> start`
    /// - `running -> stop`
    /// - `running -> finish`
    /// - `paused -> resume`
    /// - `paused -> finish`
    ///
    /// Everything else (double start, resume while running, stop while
    /// idle, ...) is rejected.
    #[must_use]
    pub const fn allows(self, kind: ActivityKind) -> bool {
        matches!(
            (self, kind),
            (Self::Idle, ActivityKind::Start)
                | (Self::Running, ActivityKind::Stop | ActivityKind::Finish)
                | (Self::Paused, ActivityKind::Resume | ActivityKind::Finish)
        )
    }
}

impl fmt::Display for ActivityPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved activity state for one worker on one work order.
///
/// Carries the event the state was derived from plus capability flags the
/// terminal uses to enable or grey out its action buttons.
#[allow(clippy::struct_excessive_bools)] // the four flags are the point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerActivityState {
    /// The event this state was derived from, if any.
    pub last_event: Option<ActivityEvent>,
    /// Current lifecycle phase.
    pub phase: ActivityPhase,
    /// Worker may start a fresh run.
    pub can_start: bool,
    /// Worker may pause the running work.
    pub can_stop: bool,
    /// Worker may resume paused work.
    pub can_resume: bool,
    /// Worker may close out the open run.
    pub can_finish: bool,
}

impl WorkerActivityState {
    /// Resolve state from the latest logged event of a stream.
    ///
    /// `None` means the worker has never logged on the order and resolves
    /// the same as a finished run: idle, start only.
    #[must_use]
    pub fn from_latest(latest: Option<ActivityEvent>) -> Self {
        let phase = latest
            .as_ref()
            .map_or(ActivityPhase::Idle, |event| ActivityPhase::after(event.kind));
        Self {
            last_event: latest,
            phase,
            can_start: phase.allows(ActivityKind::Start),
            can_stop: phase.allows(ActivityKind::Stop),
            can_resume: phase.allows(ActivityKind::Resume),
            can_finish: phase.allows(ActivityKind::Finish),
        }
    }

    /// Whether the given action is permitted in this state.
    #[must_use]
    pub const fn permits(&self, kind: ActivityKind) -> bool {
        match kind {
            ActivityKind::Start => self.can_start,
            ActivityKind::Stop => self.can_stop,
            ActivityKind::Resume => self.can_resume,
            ActivityKind::Finish => self.can_finish,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
