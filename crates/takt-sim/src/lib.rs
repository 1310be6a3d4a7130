//! Deterministic workload harness for the takt activity core.
//!
//! Drives one shared [`takt_core::ActivityMachine`], session store, and
//! production-entry desk from seeded decision streams, then judges the
//! finished run against invariants that must hold under any thread
//! interleaving: legal streams, exact event accounting, dense batch
//! sequences, and a consistent session store.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` at the harness surface.
//! - **Logging**: `tracing` macros (`info!`, `debug!`).

#![forbid(unsafe_code)]

pub mod campaign;
pub mod oracle;
pub mod rng;
pub mod workload;

pub use campaign::{
    CampaignConfig, CampaignReport, SeedFailure, SeedReplay, replay_seed, run_campaign,
};
pub use oracle::{InvariantViolation, OracleResult, WorkloadOracle};
pub use rng::DeterministicRng;
pub use workload::{
    KeyStream, WorkerSessions, WorkloadConfig, WorkloadOutcome, WorkloadSnapshot, run_workload,
};
