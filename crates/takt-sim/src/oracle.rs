use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use takt_core::{ActivityKey, ActivityKind, ActivityPhase};

use crate::workload::{KeyStream, WorkloadSnapshot};

// ── Core result types ─────────────────────────────────────────────────────────

/// Oracle result for an invariant check.
///
/// Returned by each checker and by [`WorkloadOracle::check_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleResult {
    /// `true` iff no violations were found.
    pub passed: bool,
    /// Every invariant that was violated, in check order.
    pub violations: Vec<InvariantViolation>,
}

impl OracleResult {
    /// Construct a passing result.
    #[must_use]
    fn pass() -> Self {
        Self {
            passed: true,
            violations: Vec::new(),
        }
    }

    /// Construct a result from collected violations; empty means passed.
    #[must_use]
    fn from_violations(violations: Vec<InvariantViolation>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }

    /// Merge another result into this one (failures accumulate).
    #[must_use]
    fn merge(mut self, other: Self) -> Self {
        if !other.passed {
            self.passed = false;
            self.violations.extend(other.violations);
        }
        self
    }
}

// ── Invariant violation diagnostics ──────────────────────────────────────────

/// Diagnostic information for a single failed invariant check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A stored stream contains a transition its phase never allowed.
    ///
    /// Emitted by `check_stream_legality`; one report per stream.
    IllegalChain {
        /// The stream's key.
        key: ActivityKey,
        /// Zero-based position of the offending event.
        position: usize,
        /// Phase the worker was in when the event was stored.
        phase: ActivityPhase,
        /// The stored action kind.
        kind: ActivityKind,
    },

    /// A stored stop carries no break reason code.
    ///
    /// Emitted by `check_break_codes`.
    MissingBreakCode {
        /// The stream's key.
        key: ActivityKey,
        /// Zero-based position of the stop.
        position: usize,
    },

    /// A stored non-stop event carries a break reason code.
    ///
    /// Emitted by `check_break_codes`.
    UnexpectedBreakCode {
        /// The stream's key.
        key: ActivityKey,
        /// Zero-based position of the event.
        position: usize,
        /// The stored action kind.
        kind: ActivityKind,
    },

    /// A stream's timestamps go backwards.
    ///
    /// Emitted by `check_stream_order`.
    OutOfOrderStream {
        /// The stream's key.
        key: ActivityKey,
        /// Zero-based position of the event that is earlier than its
        /// predecessor.
        position: usize,
    },

    /// The core's derived phase disagrees with an independent replay.
    ///
    /// Emitted by `check_state_agreement`.
    StateDisagreement {
        /// The stream's key.
        key: ActivityKey,
        /// Phase an independent replay of the stream produces.
        replayed: ActivityPhase,
        /// Phase the core derived.
        derived: ActivityPhase,
    },

    /// The derived state does not carry the stream's last event.
    ///
    /// Emitted by `check_state_agreement`.
    StaleDerivedState {
        /// The stream's key.
        key: ActivityKey,
    },

    /// A capability flag disagrees with the phase transition table.
    ///
    /// Emitted by `check_state_agreement`.
    InconsistentFlags {
        /// The stream's key.
        key: ActivityKey,
        /// The action kind the flag and the table disagree on.
        kind: ActivityKind,
    },

    /// Stored events across all streams don't add up to accepted actions.
    ///
    /// Emitted by `check_event_count`.
    EventCountMismatch {
        /// Events found in the log.
        stored: u64,
        /// Actions the workload counted as accepted.
        accepted: u64,
    },

    /// A date's batch sequence is not dense from one.
    ///
    /// Emitted by `check_batches`; one report per date.
    SequenceGap {
        /// The date whose sequence has the gap.
        date_key: NaiveDate,
        /// Sequence number that should appear at this position.
        expected: u32,
        /// Sequence number actually found.
        found: u32,
    },

    /// The same batch number was minted twice.
    ///
    /// Emitted by `check_batches`.
    DuplicateBatch {
        /// The repeated rendered value.
        value: String,
    },

    /// Per-worker session counts don't add up to the store total.
    ///
    /// Emitted by `check_sessions`.
    SessionCountMismatch {
        /// Sessions counted across per-worker groups.
        counted: usize,
        /// Sessions the store reports in total.
        stored: usize,
    },

    /// A session is filed under a worker it does not belong to.
    ///
    /// Emitted by `check_sessions`.
    SessionOwnerMismatch {
        /// The session's token.
        token: String,
        /// Worker the group claims.
        expected_worker: u32,
        /// Worker the session carries.
        actual_worker: u32,
    },

    /// The same token shows up on more than one session.
    ///
    /// Emitted by `check_sessions`.
    DuplicateToken {
        /// The repeated token.
        token: String,
    },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalChain {
                key,
                position,
                phase,
                kind,
            } => write!(
                f,
                "illegal chain: {kind} at position {position} of {key} while {phase}"
            ),
            Self::MissingBreakCode { key, position } => write!(
                f,
                "missing break code: stop at position {position} of {key}"
            ),
            Self::UnexpectedBreakCode {
                key,
                position,
                kind,
            } => write!(
                f,
                "unexpected break code: {kind} at position {position} of {key}"
            ),
            Self::OutOfOrderStream { key, position } => write!(
                f,
                "out-of-order stream: event at position {position} of {key} predates its predecessor"
            ),
            Self::StateDisagreement {
                key,
                replayed,
                derived,
            } => write!(
                f,
                "state disagreement: {key} replays to {replayed} but the core derived {derived}"
            ),
            Self::StaleDerivedState { key } => write!(
                f,
                "stale derived state: {key} does not carry the stream's last event"
            ),
            Self::InconsistentFlags { key, kind } => write!(
                f,
                "inconsistent capability flags: {key} diverges from the transition table on {kind}"
            ),
            Self::EventCountMismatch { stored, accepted } => write!(
                f,
                "event count mismatch: {stored} events stored vs {accepted} actions accepted"
            ),
            Self::SequenceGap {
                date_key,
                expected,
                found,
            } => write!(
                f,
                "sequence gap: {date_key} expected {expected} but found {found}"
            ),
            Self::DuplicateBatch { value } => write!(f, "duplicate batch: {value}"),
            Self::SessionCountMismatch { counted, stored } => write!(
                f,
                "session count mismatch: {counted} per-worker vs {stored} in the store"
            ),
            Self::SessionOwnerMismatch {
                token,
                expected_worker,
                actual_worker,
            } => write!(
                f,
                "session owner mismatch: {token} filed under worker {expected_worker} but belongs to {actual_worker}"
            ),
            Self::DuplicateToken { token } => write!(f, "duplicate session token: {token}"),
        }
    }
}

// ── Oracle ────────────────────────────────────────────────────────────────────

/// Oracle verifying core invariants after a workload run.
///
/// Every check is interleaving-independent: the invariants must hold no
/// matter how the workload's threads raced. All methods are `#[must_use]`.
///
/// # Invariants checked
///
/// 1. **Stream legality** (`check_stream_legality`) — every stored stream
///    replays as a legal phase chain from idle.
/// 2. **Break code rule** (`check_break_codes`) — stops carry a break
///    code, nothing else does.
/// 3. **Stream order** (`check_stream_order`) — per-key timestamps never
///    go backwards.
/// 4. **State agreement** (`check_state_agreement`) — the derived state
///    matches an independent replay of the stored stream.
/// 5. **Event accounting** (`check_event_count`) — accepted actions and
///    stored events add up exactly.
/// 6. **Batch density** (`check_batches`) — each date's sequences are
///    dense from one with no duplicates.
/// 7. **Session consistency** (`check_sessions`) — per-worker views,
///    ownership, and the store total agree.
pub struct WorkloadOracle;

impl WorkloadOracle {
    // ── Invariant 1: Stream legality ─────────────────────────────────────────

    /// Check that every stored stream is a legal transition chain.
    ///
    /// Reports the first illegal step per stream and moves on to the
    /// next stream so all broken keys surface in one run.
    #[must_use]
    pub fn check_stream_legality(snapshot: &WorkloadSnapshot) -> OracleResult {
        let mut violations = Vec::new();

        for stream in &snapshot.streams {
            if let Some((position, phase, kind)) = first_illegal_step(stream) {
                violations.push(InvariantViolation::IllegalChain {
                    key: stream.key,
                    position,
                    phase,
                    kind,
                });
            }
        }

        OracleResult::from_violations(violations)
    }

    // ── Invariant 2: Break code rule ─────────────────────────────────────────

    /// Check that break codes appear on stops and only on stops.
    #[must_use]
    pub fn check_break_codes(snapshot: &WorkloadSnapshot) -> OracleResult {
        let mut violations = Vec::new();

        for stream in &snapshot.streams {
            for (position, event) in stream.events.iter().enumerate() {
                let is_stop = event.kind == ActivityKind::Stop;
                match (&event.break_code, is_stop) {
                    (None, true) => violations.push(InvariantViolation::MissingBreakCode {
                        key: stream.key,
                        position,
                    }),
                    (Some(_), false) => {
                        violations.push(InvariantViolation::UnexpectedBreakCode {
                            key: stream.key,
                            position,
                            kind: event.kind,
                        });
                    }
                    _ => {}
                }
            }
        }

        OracleResult::from_violations(violations)
    }

    // ── Invariant 3: Stream order ────────────────────────────────────────────

    /// Check that per-key timestamps are non-decreasing in stored order.
    #[must_use]
    pub fn check_stream_order(snapshot: &WorkloadSnapshot) -> OracleResult {
        let mut violations = Vec::new();

        for stream in &snapshot.streams {
            for (index, pair) in stream.events.windows(2).enumerate() {
                if pair[1].occurred_at < pair[0].occurred_at {
                    violations.push(InvariantViolation::OutOfOrderStream {
                        key: stream.key,
                        position: index + 1,
                    });
                }
            }
        }

        OracleResult::from_violations(violations)
    }

    // ── Invariant 4: State agreement ─────────────────────────────────────────

    /// Check that the core's derived state matches an independent replay.
    ///
    /// Compares the phase, the carried last event, and every capability
    /// flag against the transition table.
    #[must_use]
    pub fn check_state_agreement(snapshot: &WorkloadSnapshot) -> OracleResult {
        let mut violations = Vec::new();

        for stream in &snapshot.streams {
            let replayed = stream
                .events
                .last()
                .map_or(ActivityPhase::Idle, |event| ActivityPhase::after(event.kind));
            if stream.derived.phase != replayed {
                violations.push(InvariantViolation::StateDisagreement {
                    key: stream.key,
                    replayed,
                    derived: stream.derived.phase,
                });
            }

            let stream_last = stream.events.last().map(|event| event.id);
            let derived_last = stream.derived.last_event.as_ref().map(|event| event.id);
            if stream_last != derived_last {
                violations.push(InvariantViolation::StaleDerivedState { key: stream.key });
            }

            for kind in ActivityKind::ALL {
                if stream.derived.permits(kind) != stream.derived.phase.allows(kind) {
                    violations.push(InvariantViolation::InconsistentFlags {
                        key: stream.key,
                        kind,
                    });
                }
            }
        }

        OracleResult::from_violations(violations)
    }

    // ── Invariant 5: Event accounting ────────────────────────────────────────

    /// Check that stored events add up to accepted actions exactly.
    ///
    /// Every accepted action appends one event; a mismatch means a lost
    /// or phantom write.
    #[must_use]
    pub fn check_event_count(snapshot: &WorkloadSnapshot) -> OracleResult {
        let stored: usize = snapshot.streams.iter().map(|s| s.events.len()).sum();
        let stored = u64::try_from(stored).unwrap_or(u64::MAX);

        if stored == snapshot.accepted {
            OracleResult::pass()
        } else {
            OracleResult::from_violations(vec![InvariantViolation::EventCountMismatch {
                stored,
                accepted: snapshot.accepted,
            }])
        }
    }

    // ── Invariant 6: Batch density ───────────────────────────────────────────

    /// Check that each date's batch sequences are dense from one.
    ///
    /// Reports the first gap per date plus every duplicated rendered
    /// value.
    #[must_use]
    pub fn check_batches(snapshot: &WorkloadSnapshot) -> OracleResult {
        let mut violations = Vec::new();

        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut per_date: BTreeMap<NaiveDate, Vec<u32>> = BTreeMap::new();
        for batch in &snapshot.batches {
            if !seen.insert(batch.as_str()) {
                violations.push(InvariantViolation::DuplicateBatch {
                    value: batch.as_str().to_owned(),
                });
            }
            per_date.entry(batch.date_key).or_default().push(batch.sequence);
        }

        for (date_key, mut sequences) in per_date {
            sequences.sort_unstable();
            for (index, &found) in sequences.iter().enumerate() {
                let expected = u32::try_from(index + 1).unwrap_or(u32::MAX);
                if found != expected {
                    violations.push(InvariantViolation::SequenceGap {
                        date_key,
                        expected,
                        found,
                    });
                    break;
                }
            }
        }

        OracleResult::from_violations(violations)
    }

    // ── Invariant 7: Session consistency ─────────────────────────────────────

    /// Check per-worker session views against the store total.
    #[must_use]
    pub fn check_sessions(snapshot: &WorkloadSnapshot) -> OracleResult {
        let mut violations = Vec::new();

        let mut counted = 0_usize;
        let mut tokens: BTreeSet<&str> = BTreeSet::new();
        for group in &snapshot.sessions {
            counted += group.sessions.len();
            for session in &group.sessions {
                if session.worker_id != group.worker_id {
                    violations.push(InvariantViolation::SessionOwnerMismatch {
                        token: session.token.clone(),
                        expected_worker: group.worker_id,
                        actual_worker: session.worker_id,
                    });
                }
                if !tokens.insert(session.token.as_str()) {
                    violations.push(InvariantViolation::DuplicateToken {
                        token: session.token.clone(),
                    });
                }
            }
        }

        if counted != snapshot.session_total {
            violations.push(InvariantViolation::SessionCountMismatch {
                counted,
                stored: snapshot.session_total,
            });
        }

        OracleResult::from_violations(violations)
    }

    // ── Composite runner ─────────────────────────────────────────────────────

    /// Run all seven invariant checks and return a merged result.
    #[must_use]
    pub fn check_all(snapshot: &WorkloadSnapshot) -> OracleResult {
        Self::check_stream_legality(snapshot)
            .merge(Self::check_break_codes(snapshot))
            .merge(Self::check_stream_order(snapshot))
            .merge(Self::check_state_agreement(snapshot))
            .merge(Self::check_event_count(snapshot))
            .merge(Self::check_batches(snapshot))
            .merge(Self::check_sessions(snapshot))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Walk a stream from idle and return the first step its phase forbids.
fn first_illegal_step(stream: &KeyStream) -> Option<(usize, ActivityPhase, ActivityKind)> {
    let mut phase = ActivityPhase::Idle;
    for (position, event) in stream.events.iter().enumerate() {
        if !phase.allows(event.kind) {
            return Some((position, phase, event.kind));
        }
        phase = ActivityPhase::after(event.kind);
    }
    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────
