//! Integration tests: full terminal day (login → activity → booking).
//!
//! Covers the critical path end to end:
//!   - Login session creation and lookup around activity actions
//!   - Single-worker lifecycle with state resolution after every action
//!   - Crew actions with partial failure leaving the log consistent
//!   - Order-wide event queries across workers
//!   - Entry review, confirmation, and committed batch numbers
//!   - Config-driven wiring of policy and batch format

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use takt_core::{
    ActionRequest, ActivityError, ActivityKind, ActivityLog, ActivityMachine, ActivityPhase,
    CoreConfig, CrewRequest, EntryDesk, FixedClock, MemoryLog, NewSession, QuantitySnapshot,
    SessionStore, UuidTokens,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

const ORDER: u32 = 4711;
const MACHINE: &str = "CNC-07";

fn shift_start() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 25, 6, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn shift_date() -> NaiveDate {
    shift_start().date_naive()
}

fn rig() -> (ActivityMachine<MemoryLog>, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(shift_start()));
    let machine = ActivityMachine::new(Arc::new(MemoryLog::new()), clock.clone());
    (machine, clock)
}

fn action(worker_id: u32, kind: ActivityKind) -> ActionRequest<'static> {
    ActionRequest {
        order_id: ORDER,
        worker_id,
        machine_code: MACHINE,
        kind,
        break_code: matches!(kind, ActivityKind::Stop).then_some("BRK-LUNCH"),
        notes: None,
    }
}

fn login(store: &SessionStore<UuidTokens>, worker_id: u32) -> String {
    store
        .create(NewSession {
            worker_id,
            station_code: MACHINE.into(),
            station_name: "Milling 07".into(),
            default_worker: worker_id == 42,
        })
        .token
}

// ---------------------------------------------------------------------------
// Single worker
// ---------------------------------------------------------------------------

#[test]
fn one_worker_full_shift() {
    let sessions = SessionStore::new();
    let (machine, clock) = rig();
    let desk = EntryDesk::from_config(&CoreConfig::default());

    // Login.
    let token = login(&sessions, 42);
    assert!(sessions.is_valid(&token));

    // Morning: start work.
    machine.apply(&action(42, ActivityKind::Start)).expect("start");
    let state = machine.state_of(ORDER, 42).expect("state");
    assert_eq!(state.phase, ActivityPhase::Running);
    assert!(state.can_stop && state.can_finish);

    // Lunch: pause with a reason.
    clock.advance(Duration::hours(5));
    machine.apply(&action(42, ActivityKind::Stop)).expect("stop");
    let state = machine.state_of(ORDER, 42).expect("state");
    assert_eq!(state.phase, ActivityPhase::Paused);
    assert_eq!(
        state
            .last_event
            .as_ref()
            .and_then(|e| e.break_code.as_deref()),
        Some("BRK-LUNCH")
    );

    // Afternoon: resume, then close out the run.
    clock.advance(Duration::minutes(30));
    machine.apply(&action(42, ActivityKind::Resume)).expect("resume");
    clock.advance(Duration::hours(3));
    machine.apply(&action(42, ActivityKind::Finish)).expect("finish");
    let state = machine.state_of(ORDER, 42).expect("state");
    assert_eq!(state.phase, ActivityPhase::Idle);
    assert!(state.can_start, "a finished run may be reopened");

    // Book the day's output: 10 good pieces close the order.
    let snapshot = QuantitySnapshot {
        order_id: ORDER,
        planned: 100,
        completed: 90,
        rejected: 0,
    };
    let committed = desk
        .commit(&snapshot, 10, 0, false, shift_date())
        .expect("commit");
    assert_eq!(committed.batch.value, "LOT-20260825-0001");
    assert_eq!(committed.new_remaining, 0);

    // Logout.
    assert!(sessions.remove(&token));
    assert!(!sessions.is_valid(&token));

    // The log kept the whole story in order.
    let history = machine.log().all_for_order(ORDER).expect("history");
    let kinds: Vec<ActivityKind> = history.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ActivityKind::Start,
            ActivityKind::Stop,
            ActivityKind::Resume,
            ActivityKind::Finish,
        ]
    );
}

#[test]
fn rejected_actions_leave_no_trace() {
    let (machine, _clock) = rig();

    machine
        .apply(&action(42, ActivityKind::Resume))
        .expect_err("resume before start");
    machine
        .apply(&action(42, ActivityKind::Finish))
        .expect_err("finish before start");

    machine.apply(&action(42, ActivityKind::Start)).expect("start");
    let mut stop = action(42, ActivityKind::Stop);
    stop.break_code = None;
    machine.apply(&stop).expect_err("stop without break code");

    let history = machine.log().all_for_order(ORDER).expect("history");
    assert_eq!(history.len(), 1, "only the accepted start was logged");
}

// ---------------------------------------------------------------------------
// Crew
// ---------------------------------------------------------------------------

#[test]
fn crew_shift_with_one_latecomer() {
    let (machine, clock) = rig();

    // Workers 1 and 3 start on time; 2 never clocks in on this order.
    let report = machine.apply_all(&CrewRequest {
        order_id: ORDER,
        worker_ids: &[1, 3],
        machine_code: MACHINE,
        kind: ActivityKind::Start,
        break_code: None,
        notes: None,
    });
    assert!(report.success);

    // The whole crew is told to stop for a material shortage; worker 2's
    // stop is illegal but must not hold up the others.
    clock.advance(Duration::hours(2));
    let report = machine.apply_all(&CrewRequest {
        order_id: ORDER,
        worker_ids: &[1, 2, 3],
        machine_code: MACHINE,
        kind: ActivityKind::Stop,
        break_code: Some("BRK-MATERIAL"),
        notes: None,
    });

    assert!(!report.success);
    assert_eq!(report.events().count(), 2);
    let rejected: Vec<u32> = report.rejections().map(|(worker, _)| worker).collect();
    assert_eq!(rejected, vec![2]);
    for (_, err) in report.rejections() {
        assert!(matches!(err, ActivityError::InvalidTransition { .. }));
    }

    // Both legal stops landed with the shared break code.
    for worker_id in [1, 3] {
        let state = machine.state_of(ORDER, worker_id).expect("state");
        assert_eq!(state.phase, ActivityPhase::Paused);
    }
    let history = machine.log().all_for_order(ORDER).expect("history");
    assert_eq!(history.len(), 4, "two starts and two stops");
    assert!(
        history
            .iter()
            .filter(|e| e.kind == ActivityKind::Stop)
            .all(|e| e.break_code.as_deref() == Some("BRK-MATERIAL"))
    );
}

#[test]
fn workers_on_the_same_order_stay_independent() {
    let (machine, clock) = rig();

    machine.apply(&action(1, ActivityKind::Start)).expect("start 1");
    clock.advance(Duration::minutes(1));
    machine.apply(&action(2, ActivityKind::Start)).expect("start 2");
    clock.advance(Duration::minutes(1));
    machine.apply(&action(1, ActivityKind::Stop)).expect("stop 1");

    assert_eq!(
        machine.state_of(ORDER, 1).expect("state").phase,
        ActivityPhase::Paused
    );
    assert_eq!(
        machine.state_of(ORDER, 2).expect("state").phase,
        ActivityPhase::Running
    );

    // And the same worker on another order is its own stream too.
    let other = ActionRequest {
        order_id: ORDER + 1,
        ..action(1, ActivityKind::Start)
    };
    machine.apply(&other).expect("start on other order");
    assert_eq!(
        machine.state_of(ORDER, 1).expect("state").phase,
        ActivityPhase::Paused,
        "order 4711 unaffected"
    );
}

// ---------------------------------------------------------------------------
// Sessions around the day
// ---------------------------------------------------------------------------

#[test]
fn station_handover_replaces_session_context() {
    let sessions = SessionStore::new();
    let token = login(&sessions, 42);

    // Same terminal, next worker takes over under the same token.
    assert!(sessions.replace(
        &token,
        NewSession {
            worker_id: 77,
            station_code: MACHINE.into(),
            station_name: "Milling 07".into(),
            default_worker: false,
        },
    ));
    let session = sessions.get(&token).expect("live");
    assert_eq!(session.worker_id, 77);

    assert_eq!(sessions.sessions_for_worker(42).len(), 0);
    assert_eq!(sessions.sessions_for_worker(77).len(), 1);
}

#[test]
fn end_of_shift_clears_every_station_of_a_worker() {
    let sessions = SessionStore::new();
    let _cnc = login(&sessions, 42);
    let t2 = sessions
        .create(NewSession {
            worker_id: 42,
            station_code: "QA-01".into(),
            station_name: "Final Inspection".into(),
            default_worker: false,
        })
        .token;
    let other = login(&sessions, 77);

    assert_eq!(sessions.clear_worker(42), 2);
    assert!(!sessions.is_valid(&t2));
    assert!(sessions.is_valid(&other));
}

// ---------------------------------------------------------------------------
// Booking
// ---------------------------------------------------------------------------

#[test]
fn oversized_entry_needs_a_second_look() {
    let desk = EntryDesk::from_config(&CoreConfig::default());
    let snapshot = QuantitySnapshot {
        order_id: ORDER,
        planned: 100,
        completed: 0,
        rejected: 0,
    };

    // 60 of 100 remaining: valid, but flagged.
    let review = desk.review(&snapshot, 60, 0);
    assert!(review.is_valid);
    assert!(review.requires_confirmation);

    // 40 of 100: passes silently.
    let review = desk.review(&snapshot, 40, 0);
    assert!(review.is_valid);
    assert!(!review.requires_confirmation);

    // Committing the flagged entry needs the confirmed flag.
    desk.commit(&snapshot, 60, 0, false, shift_date())
        .expect_err("unconfirmed");
    let committed = desk
        .commit(&snapshot, 60, 0, true, shift_date())
        .expect("confirmed");
    assert_eq!(committed.batch.sequence, 1);
}

#[test]
fn custom_config_shapes_the_whole_desk() {
    let mut config = CoreConfig::default();
    config.batch.prefix = "CHG".into();
    config.batch.pad_width = 6;
    config.confirmation.ratio = 0.25;
    config.validate().expect("config is usable");

    let desk = EntryDesk::from_config(&config);
    let snapshot = QuantitySnapshot {
        order_id: ORDER,
        planned: 100,
        completed: 0,
        rejected: 0,
    };

    let review = desk.review(&snapshot, 30, 0);
    assert!(review.requires_confirmation, "30 > 25% of 100");

    let committed = desk
        .commit(&snapshot, 30, 0, true, shift_date())
        .expect("commit");
    assert_eq!(committed.batch.value, "CHG-20260825-000001");
}
