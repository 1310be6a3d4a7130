//! Multi-worker action coordination.
//!
//! A crew action fans one request out over a list of workers on the same
//! order. Each member is validated and applied independently: one
//! worker's rejection never rolls back or blocks the others, and the
//! report always carries one outcome per requested worker, in input
//! order. This is explicitly not a transaction.

use tracing::debug;

use super::log::ActivityLog;
use super::machine::{ActionRequest, ActivityError, ActivityMachine};
use super::{ActivityEvent, ActivityKind};

/// One action requested for a whole crew.
#[derive(Debug, Clone, Copy)]
pub struct CrewRequest<'a> {
    /// Work order the action applies to.
    pub order_id: u32,
    /// Workers the action fans out over, in reporting order.
    pub worker_ids: &'a [u32],
    /// Machine or station code the terminal is bound to.
    pub machine_code: &'a str,
    /// Which lifecycle action, applied to every member.
    pub kind: ActivityKind,
    /// Break reason code, shared by every member when stopping.
    pub break_code: Option<&'a str>,
    /// Optional operator note, shared by every member.
    pub notes: Option<&'a str>,
}

/// Result for one crew member.
#[derive(Debug)]
pub struct CrewOutcome {
    /// The worker this outcome belongs to.
    pub worker_id: u32,
    /// The member's own applied event or rejection.
    pub outcome: Result<ActivityEvent, ActivityError>,
}

/// Report for a whole crew action.
#[derive(Debug)]
pub struct CrewReport {
    /// True only when every member succeeded.
    pub success: bool,
    /// One outcome per requested worker, in input order.
    pub outcomes: Vec<CrewOutcome>,
}

impl CrewReport {
    /// Events that were actually logged.
    pub fn events(&self) -> impl Iterator<Item = &ActivityEvent> {
        self.outcomes
            .iter()
            .filter_map(|member| member.outcome.as_ref().ok())
    }

    /// Rejected members with their errors.
    pub fn rejections(&self) -> impl Iterator<Item = (u32, &ActivityError)> {
        self.outcomes.iter().filter_map(|member| {
            member
                .outcome
                .as_ref()
                .err()
                .map(|err| (member.worker_id, err))
        })
    }
}

impl<L: ActivityLog> ActivityMachine<L> {
    /// Apply one action to every worker in the crew.
    ///
    /// Members are applied in input order. No lock is held across the
    /// whole batch; each member takes its own key lock exactly as a
    /// single-worker action would.
    pub fn apply_all(&self, req: &CrewRequest<'_>) -> CrewReport {
        let outcomes: Vec<CrewOutcome> = req
            .worker_ids
            .iter()
            .map(|&worker_id| {
                let action = ActionRequest {
                    order_id: req.order_id,
                    worker_id,
                    machine_code: req.machine_code,
                    kind: req.kind,
                    break_code: req.break_code,
                    notes: req.notes,
                };
                CrewOutcome {
                    worker_id,
                    outcome: self.apply(&action),
                }
            })
            .collect();

        let success = outcomes.iter().all(|member| member.outcome.is_ok());
        if !success {
            let rejected = outcomes
                .iter()
                .filter(|member| member.outcome.is_err())
                .count();
            debug!(
                order_id = req.order_id,
                kind = %req.kind,
                crew = req.worker_ids.len(),
                rejected,
                "crew action partially rejected"
            );
        }
        CrewReport { success, outcomes }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
