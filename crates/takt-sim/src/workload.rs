//! Randomized multi-threaded workload over a shared activity core.
//!
//! One seed expands into per-thread decision streams of worker actions,
//! production entries, and session churn, all hammering the same
//! machine, desk, and store. Decisions are deterministic per thread:
//! with a single thread the whole run replays bit for bit (apart from
//! minted tokens and event ids); with more threads the interleaving
//! varies while every oracle invariant must still hold.

use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use takt_core::{
    ActionRequest, ActivityError, ActivityEvent, ActivityKey, ActivityKind, ActivityLog,
    ActivityMachine, BatchNumber, Clock, CoreConfig, CrewRequest, EntryDesk, EntryError,
    FixedClock, MemoryLog, NewSession, QuantitySnapshot, Session, SessionStore,
    WorkerActivityState,
};
use tracing::debug;

use crate::rng::DeterministicRng;

/// Break reason codes stops rotate through.
const BREAK_CODES: [&str; 4] = ["BRK-LUNCH", "BRK-SETUP", "BRK-MATERIAL", "BRK-SHIFT"];

/// Machine codes actions are booked against.
const MACHINES: [&str; 3] = ["CNC-07", "CNC-12", "WELD-03"];

/// Stations used for simulated logins.
const STATIONS: [(&str, &str); 3] = [
    ("ST-01", "Milling"),
    ("ST-02", "Turning"),
    ("ST-03", "Final Assembly"),
];

/// First order number in the simulated order pool.
const BASE_ORDER: u32 = 4701;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Workload parameters for one seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Seed all decision streams derive from.
    pub seed: u64,
    /// Distinct workers, ids `1..=workers`.
    pub workers: u32,
    /// Distinct orders, numbered upward from a fixed base.
    pub orders: u32,
    /// OS threads driving the shared core.
    pub threads: usize,
    /// Random steps each thread performs.
    pub actions_per_thread: u32,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            workers: 4,
            orders: 3,
            threads: 4,
            actions_per_thread: 200,
        }
    }
}

impl WorkloadConfig {
    /// Validate parameters before running.
    ///
    /// # Errors
    ///
    /// Returns an error if any count is zero.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("workers must be > 0");
        }
        if self.orders == 0 {
            bail!("orders must be > 0");
        }
        if self.threads == 0 {
            bail!("threads must be > 0");
        }
        if self.actions_per_thread == 0 {
            bail!("actions_per_thread must be > 0");
        }
        Ok(())
    }

    /// Every `(order, worker)` key this workload can touch.
    #[must_use]
    pub fn keys(&self) -> Vec<ActivityKey> {
        let mut keys = Vec::new();
        for order in 0..self.orders {
            for worker in 1..=self.workers {
                keys.push(ActivityKey::new(BASE_ORDER + order, worker));
            }
        }
        keys
    }
}

// ---------------------------------------------------------------------------
// Outcome and snapshot
// ---------------------------------------------------------------------------

/// Everything a finished run leaves behind.
#[derive(Debug)]
pub struct WorkloadOutcome {
    /// The parameters the run used.
    pub config: WorkloadConfig,
    /// The machine every thread drove.
    pub machine: Arc<ActivityMachine<MemoryLog>>,
    /// The session store every thread churned.
    pub sessions: Arc<SessionStore>,
    /// Actions the machine accepted.
    pub accepted: u64,
    /// Actions the machine rejected.
    pub rejected: u64,
    /// Production entries the desk declined.
    pub entries_declined: u64,
    /// Batch numbers minted by committed entries.
    pub batches: Vec<BatchNumber>,
}

impl WorkloadOutcome {
    /// Freeze the run into plain data for the oracle.
    ///
    /// # Errors
    ///
    /// Returns an error if the activity log cannot be read.
    pub fn snapshot(&self) -> Result<WorkloadSnapshot> {
        let log = self.machine.log();

        let mut streams = Vec::new();
        for key in self.config.keys() {
            let events = log.events_for(&key).context("read activity stream")?;
            let derived = self
                .machine
                .state_of(key.order_id, key.worker_id)
                .context("derive worker state")?;
            streams.push(KeyStream {
                key,
                events,
                derived,
            });
        }

        let mut sessions = Vec::new();
        for worker_id in 1..=self.config.workers {
            sessions.push(WorkerSessions {
                worker_id,
                sessions: self.sessions.sessions_for_worker(worker_id),
            });
        }

        Ok(WorkloadSnapshot {
            accepted: self.accepted,
            streams,
            batches: self.batches.clone(),
            sessions,
            session_total: self.sessions.len(),
        })
    }
}

/// Plain-data view of a finished run, consumed by the oracle.
#[derive(Debug, Clone)]
pub struct WorkloadSnapshot {
    /// Actions the machine accepted, summed over threads.
    pub accepted: u64,
    /// Per-key event streams in stored order, with the derived state.
    pub streams: Vec<KeyStream>,
    /// Every batch number minted during the run.
    pub batches: Vec<BatchNumber>,
    /// Open sessions grouped per worker.
    pub sessions: Vec<WorkerSessions>,
    /// Total sessions still open in the store.
    pub session_total: usize,
}

/// One key's stored stream next to the state the core derives from it.
#[derive(Debug, Clone)]
pub struct KeyStream {
    /// The `(order, worker)` pair.
    pub key: ActivityKey,
    /// Stored events in log order.
    pub events: Vec<ActivityEvent>,
    /// State the core reports for this key.
    pub derived: WorkerActivityState,
}

/// Open sessions of one worker.
#[derive(Debug, Clone)]
pub struct WorkerSessions {
    /// The worker these sessions belong to.
    pub worker_id: u32,
    /// Sessions the store reports for the worker.
    pub sessions: Vec<Session>,
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

/// Run one seeded workload to completion.
///
/// # Errors
///
/// Returns an error on invalid parameters, a panicked worker thread, or
/// a failed log backend.
pub fn run_workload(config: &WorkloadConfig) -> Result<WorkloadOutcome> {
    config.validate()?;

    let clock = Arc::new(FixedClock::new(shift_start()));
    let machine = Arc::new(ActivityMachine::new(
        Arc::new(MemoryLog::new()),
        Arc::clone(&clock) as Arc<dyn Clock>,
    ));
    let sessions = Arc::new(SessionStore::new());
    let desk = Arc::new(EntryDesk::from_config(&CoreConfig::default()));

    let mut handles = Vec::with_capacity(config.threads);
    for lane in 0..config.threads {
        let machine = Arc::clone(&machine);
        let sessions = Arc::clone(&sessions);
        let desk = Arc::clone(&desk);
        let clock = Arc::clone(&clock);
        let config = *config;
        handles.push(thread::spawn(move || {
            run_lane(
                u64::try_from(lane).unwrap_or(u64::MAX),
                &config,
                &machine,
                &sessions,
                &desk,
                &clock,
            )
        }));
    }

    let mut outcome = WorkloadOutcome {
        config: *config,
        machine,
        sessions,
        accepted: 0,
        rejected: 0,
        entries_declined: 0,
        batches: Vec::new(),
    };

    for handle in handles {
        let tally = handle
            .join()
            .map_err(|_| anyhow!("workload thread panicked"))??;
        outcome.accepted += tally.accepted;
        outcome.rejected += tally.rejected;
        outcome.entries_declined += tally.entries_declined;
        outcome.batches.extend(tally.batches);
    }

    debug!(
        seed = config.seed,
        accepted = outcome.accepted,
        rejected = outcome.rejected,
        batches = outcome.batches.len(),
        "workload finished"
    );
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// Per-thread result counts.
#[derive(Debug, Default)]
struct LaneTally {
    accepted: u64,
    rejected: u64,
    entries_declined: u64,
    batches: Vec<BatchNumber>,
}

fn run_lane(
    lane: u64,
    config: &WorkloadConfig,
    machine: &ActivityMachine<MemoryLog>,
    sessions: &SessionStore,
    desk: &EntryDesk,
    clock: &FixedClock,
) -> Result<LaneTally> {
    let mut rng = DeterministicRng::new(lane_seed(config.seed, lane));
    let mut tally = LaneTally::default();
    let mut tokens: Vec<String> = Vec::new();

    for _ in 0..config.actions_per_thread {
        clock.advance(Duration::milliseconds(1 + rng.next_i64_below(250)));
        match rng.next_bounded(100) {
            0..=69 => step_activity(&mut rng, config, machine, &mut tally)?,
            70..=89 => step_entry(&mut rng, desk, &mut tally)?,
            _ => step_session(&mut rng, config, sessions, &mut tokens),
        }
    }
    Ok(tally)
}

/// One worker action, or a crew action for a small fraction of steps.
fn step_activity(
    rng: &mut DeterministicRng,
    config: &WorkloadConfig,
    machine: &ActivityMachine<MemoryLog>,
    tally: &mut LaneTally,
) -> Result<()> {
    let order_id = BASE_ORDER + rng.next_u32_below(config.orders);
    let machine_code = rng.pick(&MACHINES).copied().unwrap_or(MACHINES[0]);
    let kind = rng
        .pick(&ActivityKind::ALL)
        .copied()
        .unwrap_or(ActivityKind::Start);
    // Stops mostly carry a break code; the rest exercise the rejection.
    let break_code = if kind == ActivityKind::Stop && rng.chance_percent(85) {
        rng.pick(&BREAK_CODES).copied()
    } else {
        None
    };

    if rng.chance_percent(20) {
        let size = 2 + rng.next_bounded(2);
        let crew: Vec<u32> = (0..size)
            .map(|_| 1 + rng.next_u32_below(config.workers))
            .collect();
        let report = machine.apply_all(&CrewRequest {
            order_id,
            worker_ids: &crew,
            machine_code,
            kind,
            break_code,
            notes: None,
        });
        for member in report.outcomes {
            match member.outcome {
                Ok(_) => tally.accepted += 1,
                Err(ActivityError::Log(err)) => {
                    return Err(err).context("activity log failed during crew action");
                }
                Err(_) => tally.rejected += 1,
            }
        }
        return Ok(());
    }

    let request = ActionRequest {
        order_id,
        worker_id: 1 + rng.next_u32_below(config.workers),
        machine_code,
        kind,
        break_code,
        notes: None,
    };
    match machine.apply(&request) {
        Ok(_) => tally.accepted += 1,
        Err(ActivityError::Log(err)) => return Err(err).context("activity log failed"),
        Err(_) => tally.rejected += 1,
    }
    Ok(())
}

/// One production entry, mostly lawful, occasionally negative or oversized.
fn step_entry(rng: &mut DeterministicRng, desk: &EntryDesk, tally: &mut LaneTally) -> Result<()> {
    let planned = 50 + rng.next_i64_below(450);
    let snapshot = QuantitySnapshot {
        order_id: BASE_ORDER,
        planned,
        completed: rng.next_i64_below(planned),
        rejected: rng.next_i64_below(20),
    };

    let accepted = if rng.chance_percent(8) {
        -(1 + rng.next_i64_below(5))
    } else {
        rng.next_i64_below(snapshot.remaining().max(1) + 40)
    };
    let rejected = rng.next_i64_below(6);
    let confirmed = rng.chance_percent(50);
    let date_key = shift_date(rng.next_i64_below(3));

    match desk.commit(&snapshot, accepted, rejected, confirmed, date_key) {
        Ok(entry) => tally.batches.push(entry.batch),
        Err(EntryError::Sequence(err)) => return Err(err).context("batch sequencing failed"),
        Err(_) => tally.entries_declined += 1,
    }
    Ok(())
}

/// Login, logout, or station handover on the shared store.
fn step_session(
    rng: &mut DeterministicRng,
    config: &WorkloadConfig,
    sessions: &SessionStore,
    tokens: &mut Vec<String>,
) {
    let roll = rng.next_bounded(100);

    if roll < 35 && !tokens.is_empty() {
        let bound = u64::try_from(tokens.len()).unwrap_or(0);
        let idx = usize::try_from(rng.next_bounded(bound)).unwrap_or(0);
        let token = tokens.swap_remove(idx);
        let _ = sessions.remove(&token);
        return;
    }

    if roll < 50 && !tokens.is_empty() {
        // Handover: the token survives, the station context is swapped.
        let next = new_session(rng, config);
        if let Some(token) = rng.pick(tokens) {
            let _ = sessions.replace(token, next);
        }
        return;
    }

    let session = sessions.create(new_session(rng, config));
    tokens.push(session.token);
}

fn new_session(rng: &mut DeterministicRng, config: &WorkloadConfig) -> NewSession {
    let (code, name) = rng.pick(&STATIONS).copied().unwrap_or(STATIONS[0]);
    NewSession {
        worker_id: 1 + rng.next_u32_below(config.workers),
        station_code: code.to_owned(),
        station_name: name.to_owned(),
        default_worker: rng.chance_percent(30),
    }
}

/// Fixed simulated shift start: 2026-08-25 06:00 UTC.
fn shift_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 25, 6, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Booking date for production entries, `offset` days into the run.
fn shift_date(offset: i64) -> NaiveDate {
    shift_start().date_naive() + Duration::days(offset)
}

/// Per-thread decision stream seed; the odd multiplier keeps lanes distinct.
const fn lane_seed(seed: u64, lane: u64) -> u64 {
    seed.wrapping_add(lane).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64, threads: usize) -> WorkloadConfig {
        WorkloadConfig {
            seed,
            workers: 3,
            orders: 2,
            threads,
            actions_per_thread: 80,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(WorkloadConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_counts_are_rejected() {
        for broken in [
            WorkloadConfig {
                workers: 0,
                ..WorkloadConfig::default()
            },
            WorkloadConfig {
                orders: 0,
                ..WorkloadConfig::default()
            },
            WorkloadConfig {
                threads: 0,
                ..WorkloadConfig::default()
            },
            WorkloadConfig {
                actions_per_thread: 0,
                ..WorkloadConfig::default()
            },
        ] {
            assert!(broken.validate().is_err(), "{broken:?} must be rejected");
        }
    }

    #[test]
    fn keys_cover_the_order_worker_grid() {
        let config = small_config(0, 1);
        let keys = config.keys();
        assert_eq!(keys.len(), 6);
        assert!(keys.contains(&ActivityKey::new(BASE_ORDER, 1)));
        assert!(keys.contains(&ActivityKey::new(BASE_ORDER + 1, 3)));
    }

    #[test]
    fn lane_seeds_are_distinct() {
        let seeds: Vec<u64> = (0..8).map(|lane| lane_seed(42, lane)).collect();
        for (i, a) in seeds.iter().enumerate() {
            for b in &seeds[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn single_thread_run_is_reproducible() {
        let config = small_config(7, 1);
        let first = run_workload(&config).expect("first run");
        let second = run_workload(&config).expect("second run");

        assert_eq!(first.accepted, second.accepted);
        assert_eq!(first.rejected, second.rejected);
        assert_eq!(first.entries_declined, second.entries_declined);

        let values = |outcome: &WorkloadOutcome| -> Vec<String> {
            outcome
                .batches
                .iter()
                .map(|batch| batch.as_str().to_owned())
                .collect()
        };
        assert_eq!(values(&first), values(&second));

        // Event ids are minted fresh, so compare the shape of each stream.
        let shape = |outcome: &WorkloadOutcome| -> Vec<Vec<(ActivityKind, DateTime<Utc>)>> {
            let snapshot = outcome.snapshot().expect("snapshot");
            snapshot
                .streams
                .iter()
                .map(|stream| {
                    stream
                        .events
                        .iter()
                        .map(|event| (event.kind, event.occurred_at))
                        .collect()
                })
                .collect()
        };
        assert_eq!(shape(&first), shape(&second));
    }

    #[test]
    fn snapshot_event_total_matches_accepted_count() {
        let config = small_config(11, 1);
        let outcome = run_workload(&config).expect("workload");
        let snapshot = outcome.snapshot().expect("snapshot");

        let stored: usize = snapshot.streams.iter().map(|s| s.events.len()).sum();
        assert_eq!(u64::try_from(stored).expect("fits"), outcome.accepted);
    }

    #[test]
    fn snapshot_groups_sessions_by_owner() {
        let config = small_config(13, 2);
        let outcome = run_workload(&config).expect("workload");
        let snapshot = outcome.snapshot().expect("snapshot");

        for group in &snapshot.sessions {
            for session in &group.sessions {
                assert_eq!(session.worker_id, group.worker_id);
            }
        }
        let counted: usize = snapshot.sessions.iter().map(|g| g.sessions.len()).sum();
        assert_eq!(counted, snapshot.session_total);
    }
}
