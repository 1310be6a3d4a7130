//! Integration tests: behavior under real thread interleaving.
//!
//! Covers the concurrency contract:
//!   - Same-key races admit exactly one winner per legal slot
//!   - Distinct keys proceed without blocking each other
//!   - Accepted events always form a legal per-key lifecycle chain
//!   - Batch sequences stay dense (1..=n) under concurrent commits
//!   - Session store stays consistent through create/clear churn

use std::sync::Arc;
use std::sync::mpsc;

use chrono::{NaiveDate, TimeZone, Utc};
use takt_core::{
    ActionRequest, ActivityEvent, ActivityKey, ActivityKind, ActivityLog, ActivityMachine,
    ActivityPhase, CoreConfig, EntryDesk, FixedClock, MemoryLog, NewSession, QuantitySnapshot,
    SessionStore,
};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

const ORDER: u32 = 4711;
const STORM_STEPS: u32 = 200;

fn rig() -> Arc<ActivityMachine<MemoryLog>> {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 8, 25, 6, 0, 0)
            .single()
            .expect("valid timestamp"),
    ));
    Arc::new(ActivityMachine::new(Arc::new(MemoryLog::new()), clock))
}

fn action(worker_id: u32, kind: ActivityKind) -> ActionRequest<'static> {
    ActionRequest {
        order_id: ORDER,
        worker_id,
        machine_code: "CNC-07",
        kind,
        break_code: matches!(kind, ActivityKind::Stop).then_some("BRK-SETUP"),
        notes: None,
    }
}

/// Every accepted stream must replay as a legal lifecycle chain.
fn assert_legal_chain(events: &[ActivityEvent]) {
    let mut phase = ActivityPhase::Idle;
    for event in events {
        assert!(
            phase.allows(event.kind),
            "illegal {} after phase {phase}",
            event.kind
        );
        phase = ActivityPhase::after(event.kind);
    }
}

// ---------------------------------------------------------------------------
// Same-key serialization
// ---------------------------------------------------------------------------

#[test]
fn racing_starts_admit_exactly_one() {
    let machine = rig();
    let handles: Vec<_> = (0..32)
        .map(|_| {
            let machine = Arc::clone(&machine);
            std::thread::spawn(move || machine.apply(&action(42, ActivityKind::Start)).is_ok())
        })
        .collect();

    let wins = handles
        .into_iter()
        .map(|h| h.join().expect("thread join"))
        .filter(|ok| *ok)
        .count();
    assert_eq!(wins, 1);

    let events = machine
        .log()
        .events_for(&ActivityKey::new(ORDER, 42))
        .expect("events");
    assert_eq!(events.len(), 1, "losers appended nothing");
}

#[test]
fn action_storm_never_corrupts_a_stream() {
    let machine = rig();
    let workers: Vec<u32> = (0..4).collect();

    let handles: Vec<_> = (0..8_u32)
        .map(|thread_id| {
            let machine = Arc::clone(&machine);
            let workers = workers.clone();
            std::thread::spawn(move || {
                // Deterministic per-thread walk over all kinds and
                // workers; rejections are expected and ignored.
                for step in 0..STORM_STEPS {
                    let worker = workers[((thread_id + step) % 4) as usize];
                    let kind = ActivityKind::ALL[((thread_id.wrapping_mul(7) + step) % 4) as usize];
                    let _ = machine.apply(&action(worker, kind));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread join");
    }

    for worker in workers {
        let events = machine
            .log()
            .events_for(&ActivityKey::new(ORDER, worker))
            .expect("events");
        assert_legal_chain(&events);
        assert!(
            events
                .iter()
                .filter(|e| e.kind == ActivityKind::Stop)
                .all(|e| e.break_code.is_some()),
            "every accepted stop carries its break code"
        );
    }
}

#[test]
fn distinct_keys_run_a_full_lifecycle_in_parallel() {
    let machine = rig();
    let handles: Vec<_> = (0..16_u32)
        .map(|worker_id| {
            let machine = Arc::clone(&machine);
            std::thread::spawn(move || {
                for kind in [
                    ActivityKind::Start,
                    ActivityKind::Stop,
                    ActivityKind::Resume,
                    ActivityKind::Finish,
                ] {
                    machine.apply(&action(worker_id, kind)).expect("lifecycle");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread join");
    }

    for worker_id in 0..16 {
        let events = machine
            .log()
            .events_for(&ActivityKey::new(ORDER, worker_id))
            .expect("events");
        let kinds: Vec<ActivityKind> = events.iter().map(|e| e.kind).collect();
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
}

// ---------------------------------------------------------------------------
// Batch density
// ---------------------------------------------------------------------------

#[test]
fn hundred_concurrent_commits_issue_dense_sequences() {
    let desk = Arc::new(EntryDesk::from_config(&CoreConfig::default()));
    let date_key = NaiveDate::from_ymd_opt(2026, 8, 25).expect("valid date");
    let snapshot = QuantitySnapshot {
        order_id: ORDER,
        planned: 1_000_000,
        completed: 0,
        rejected: 0,
    };
    let (tx, rx) = mpsc::channel();

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let desk = Arc::clone(&desk);
            let tx = tx.clone();
            std::thread::spawn(move || {
                let committed = desk
                    .commit(&snapshot, 1, 0, false, date_key)
                    .expect("commit");
                tx.send(committed.batch.sequence).expect("send");
            })
        })
        .collect();
    drop(tx);
    for handle in handles {
        handle.join().expect("thread join");
    }

    let mut sequences: Vec<u32> = rx.iter().collect();
    sequences.sort_unstable();
    assert_eq!(sequences, (1..=100).collect::<Vec<u32>>());
}

// ---------------------------------------------------------------------------
// Session churn
// ---------------------------------------------------------------------------

#[test]
fn session_churn_keeps_the_store_consistent() {
    let store = Arc::new(SessionStore::new());

    let handles: Vec<_> = (0..8_u32)
        .map(|worker_id| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for round in 0..20 {
                    let session = store.create(NewSession {
                        worker_id,
                        station_code: format!("ST-{round}"),
                        station_name: format!("Station {round}"),
                        default_worker: false,
                    });
                    assert!(store.is_valid(&session.token));
                    if round % 2 == 0 {
                        assert!(store.remove(&session.token));
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread join");
    }

    // Each worker kept the 10 odd-round sessions.
    assert_eq!(store.len(), 8 * 10);
    for worker_id in 0..8 {
        assert_eq!(store.sessions_for_worker(worker_id).len(), 10);
    }

    // Bulk invalidation races nothing now; counts must add up.
    let cleared: usize = (0..8).map(|worker_id| store.clear_worker(worker_id)).sum();
    assert_eq!(cleared, 80);
    assert!(store.is_empty());
}
