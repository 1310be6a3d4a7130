//! Batch number issuance.
//!
//! Every committed production entry gets a batch (lot) number of the form
//! `{prefix}-{YYYYMMDD}-{zero-padded sequence}`. Sequences count per
//! calendar date and are dense: under any interleaving, n issues for one
//! date yield exactly 1..=n with no duplicates and no gaps.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::BatchFormat;
use crate::error::ErrorCode;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from batch number issuance.
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    /// The padded sequence space for a date is spent.
    ///
    /// Widening the pad would change number shape mid-day, so issuance
    /// refuses instead. Every later issue for the same date fails too.
    #[error("batch sequence space for {date_key} is exhausted (max {max})")]
    Exhausted {
        /// The date whose space is spent.
        date_key: NaiveDate,
        /// Highest sequence the configured pad width can render.
        max: u32,
    },
}

impl SequenceError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Exhausted { .. } => ErrorCode::SequenceExhausted,
        }
    }
}

// ---------------------------------------------------------------------------
// Batch numbers
// ---------------------------------------------------------------------------

/// One issued batch number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchNumber {
    /// Rendered form, e.g. `LOT-20260825-0001`.
    pub value: String,
    /// Calendar date the sequence counts under.
    pub date_key: NaiveDate,
    /// Position within the date, starting at 1.
    pub sequence: u32,
}

impl BatchNumber {
    /// The rendered batch number.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for BatchNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// Issues per-day dense batch sequences.
///
/// The read-max-then-increment step runs under one mutex, so concurrent
/// issuers can never observe the same counter value.
#[derive(Debug)]
pub struct BatchSequencer {
    format: BatchFormat,
    counters: Mutex<HashMap<NaiveDate, u32>>,
}

impl BatchSequencer {
    /// Sequencer rendering numbers in the given format.
    #[must_use]
    pub fn new(format: BatchFormat) -> Self {
        Self {
            format,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Issue the next batch number for a date.
    ///
    /// # Errors
    ///
    /// Returns [`SequenceError::Exhausted`] once the date's padded
    /// sequence space is spent.
    pub fn issue(&self, date_key: NaiveDate) -> Result<BatchNumber, SequenceError> {
        let max = self.format.max_sequence();
        let mut counters = self.lock_counters();
        let counter = counters.entry(date_key).or_insert(0);
        if *counter >= max {
            return Err(SequenceError::Exhausted { date_key, max });
        }
        *counter += 1;
        let sequence = *counter;
        drop(counters);

        let value = format!(
            "{}-{}-{:0width$}",
            self.format.prefix,
            date_key.format("%Y%m%d"),
            sequence,
            width = self.format.pad_width,
        );
        debug!(%date_key, sequence, %value, "issued batch number");
        Ok(BatchNumber {
            value,
            date_key,
            sequence,
        })
    }

    fn lock_counters(&self) -> MutexGuard<'_, HashMap<NaiveDate, u32>> {
        self.counters.lock().expect("batch counter lock poisoned")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
