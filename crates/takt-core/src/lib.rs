#![forbid(unsafe_code)]
//! takt-core library.
//!
//! Event-sourced worker activity tracking for shop-floor terminals: an
//! append-only activity log, per-worker state derived from it on every
//! read, multi-worker crew actions with partial-failure reporting,
//! terminal login sessions, and production entry booking with per-day
//! batch numbers.
//!
//! # Conventions
//!
//! - **Errors**: per-module `thiserror` enums, each mapping to a stable
//!   [`error::ErrorCode`]; `anyhow::Result` only at aggregation points
//!   such as config loading.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`); no
//!   subscriber is installed by the library.

pub mod activity;
pub mod clock;
pub mod config;
pub mod error;
pub mod production;
pub mod session;
pub mod token;

pub use activity::{
    ActionRequest, ActivityError, ActivityEvent, ActivityKey, ActivityKind, ActivityLog,
    ActivityMachine, ActivityPhase, CrewOutcome, CrewReport, CrewRequest, LogError, MemoryLog,
    UnknownKind, WorkerActivityState,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{BatchFormat, ConfirmationPolicy, CoreConfig, load_config};
pub use error::ErrorCode;
pub use production::{
    BatchNumber, BatchSequencer, CommittedEntry, EntryDesk, EntryError, EntryReview,
    EntryValidator, QuantitySnapshot, SequenceError,
};
pub use session::{NewSession, Session, SessionStore};
pub use token::{TokenSource, UuidTokens};
