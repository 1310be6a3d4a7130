//! Append-only activity event store.
//!
//! The log is the single source of truth for worker activity: state is
//! derived by projecting over logged events and is never written back.
//! Guarantees:
//!
//! - Append-only: events are immutable once stored.
//! - Per-key ordering: each `(order, worker)` stream is kept ordered by
//!   `(occurred_at, insertion seq)`, so a backdated correction lands at
//!   its timestamp while equal timestamps preserve insertion order.
//! - `latest_for` always returns the stream's newest event under that
//!   ordering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use super::{ActivityEvent, ActivityKey};
use crate::error::ErrorCode;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur when reading or writing the activity log.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The store backing the log failed.
    ///
    /// For [`MemoryLog`] this only happens when a lock was poisoned by a
    /// panicking writer; durable implementations report I/O failures here.
    #[error("activity log backend failed: {message}")]
    Backend {
        /// Backend-specific failure description.
        message: String,
    },
}

impl LogError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Backend { .. } => ErrorCode::LogBackendFailed,
        }
    }

    fn poisoned(what: &str) -> Self {
        Self::Backend {
            message: format!("{what} lock poisoned"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Persistence and query seam for activity events.
///
/// Implementations must be safe to share across request-handling threads.
/// The in-process default is [`MemoryLog`]; a durable implementation would
/// satisfy the same contract against its own backend.
pub trait ActivityLog: Send + Sync {
    /// Append one event to its `(order, worker)` stream.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Backend`] if the backing store failed.
    fn append(&self, event: ActivityEvent) -> Result<(), LogError>;

    /// Return the newest event for the given key, or `None` for a worker
    /// who has never logged on the order.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Backend`] if the backing store failed.
    fn latest_for(&self, key: &ActivityKey) -> Result<Option<ActivityEvent>, LogError>;

    /// Return the full event history for the given key, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Backend`] if the backing store failed.
    fn events_for(&self, key: &ActivityKey) -> Result<Vec<ActivityEvent>, LogError>;

    /// Return every event logged against a work order across all workers,
    /// oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Backend`] if the backing store failed.
    fn all_for_order(&self, order_id: u32) -> Result<Vec<ActivityEvent>, LogError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// One stored event plus the insertion sequence used for tie-breaking.
#[derive(Debug, Clone)]
struct Stored {
    seq: u64,
    event: ActivityEvent,
}

/// Thread-safe in-memory [`ActivityLog`].
///
/// Streams live in a `RwLock`-guarded map keyed by `(order, worker)`.
/// Reads share the lock; appends take it exclusively, so readers never
/// observe a half-inserted event.
#[derive(Debug, Default)]
pub struct MemoryLog {
    streams: RwLock<HashMap<ActivityKey, Vec<Stored>>>,
    seq: AtomicU64,
}

impl MemoryLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored events across all streams.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Backend`] if the stream map lock was poisoned.
    pub fn len(&self) -> Result<usize, LogError> {
        Ok(self.read_streams()?.values().map(Vec::len).sum())
    }

    /// True if no events have been appended.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::Backend`] if the stream map lock was poisoned.
    pub fn is_empty(&self) -> Result<bool, LogError> {
        Ok(self.len()? == 0)
    }

    fn read_streams(
        &self,
    ) -> Result<RwLockReadGuard<'_, HashMap<ActivityKey, Vec<Stored>>>, LogError> {
        self.streams
            .read()
            .map_err(|_| LogError::poisoned("event stream map"))
    }

    fn write_streams(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<ActivityKey, Vec<Stored>>>, LogError> {
        self.streams
            .write()
            .map_err(|_| LogError::poisoned("event stream map"))
    }
}

impl ActivityLog for MemoryLog {
    fn append(&self, event: ActivityEvent) -> Result<(), LogError> {
        let key = event.key();
        let mut streams = self.write_streams()?;
        // Sequence numbers are handed out under the write lock, so within
        // a stream they follow insertion order.
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let stream = streams.entry(key).or_default();

        // Stable position: after every entry at or before this timestamp.
        // The common in-order append hits the end and degenerates to push.
        let at = stream.partition_point(|stored| stored.event.occurred_at <= event.occurred_at);
        debug!(
            key = %key,
            kind = %event.kind,
            occurred_at = %event.occurred_at,
            position = at,
            "append activity event"
        );
        stream.insert(at, Stored { seq, event });
        Ok(())
    }

    fn latest_for(&self, key: &ActivityKey) -> Result<Option<ActivityEvent>, LogError> {
        let streams = self.read_streams()?;
        Ok(streams
            .get(key)
            .and_then(|stream| stream.last())
            .map(|stored| stored.event.clone()))
    }

    fn events_for(&self, key: &ActivityKey) -> Result<Vec<ActivityEvent>, LogError> {
        let streams = self.read_streams()?;
        Ok(streams.get(key).map_or_else(Vec::new, |stream| {
            stream.iter().map(|stored| stored.event.clone()).collect()
        }))
    }

    fn all_for_order(&self, order_id: u32) -> Result<Vec<ActivityEvent>, LogError> {
        let streams = self.read_streams()?;
        let mut merged: Vec<Stored> = streams
            .iter()
            .filter(|(key, _)| key.order_id == order_id)
            .flat_map(|(_, stream)| stream.iter().cloned())
            .collect();
        drop(streams);

        merged.sort_by_key(|stored| (stored.event.occurred_at, stored.seq));
        Ok(merged.into_iter().map(|stored| stored.event).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
