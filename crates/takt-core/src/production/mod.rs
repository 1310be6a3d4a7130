//! Production entry booking.
//!
//! This module covers the quantity side of the shop floor: reviewing a
//! proposed entry against what an order has left, prompting for operator
//! confirmation on outsized entries, and stamping committed entries with
//! a per-day batch number.
//!
//! The caller owns order master data; everything here works off a
//! [`QuantitySnapshot`] the caller captured for the review.

pub mod batch;
pub mod entry;

pub use batch::{BatchNumber, BatchSequencer, SequenceError};
pub use entry::{EntryError, EntryReview, EntryValidator};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::CoreConfig;

/// Quantity position of one work order at review time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantitySnapshot {
    /// Work order number.
    pub order_id: u32,
    /// Total pieces the order is planned for.
    pub planned: i64,
    /// Pieces already booked as good.
    pub completed: i64,
    /// Pieces already booked as scrap.
    pub rejected: i64,
}

impl QuantitySnapshot {
    /// Pieces the order still has open.
    ///
    /// Can go negative if history was over-booked; any further non-zero
    /// entry is then invalid.
    #[must_use]
    pub const fn remaining(&self) -> i64 {
        self.planned - self.completed - self.rejected
    }
}

/// A committed production entry with its issued batch number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedEntry {
    /// The batch number stamped onto the entry.
    pub batch: BatchNumber,
    /// Pieces booked as good.
    pub accepted: i64,
    /// Pieces booked as scrap.
    pub rejected: i64,
    /// What the order has left after this entry.
    pub new_remaining: i64,
}

/// Validate-and-commit surface for production entries.
///
/// Couples the [`EntryValidator`] with the [`BatchSequencer`] so a batch
/// number is only ever spent on an entry that passed review.
#[derive(Debug)]
pub struct EntryDesk {
    validator: EntryValidator,
    sequencer: BatchSequencer,
}

impl EntryDesk {
    /// Desk over an explicit validator and sequencer.
    #[must_use]
    pub const fn new(validator: EntryValidator, sequencer: BatchSequencer) -> Self {
        Self {
            validator,
            sequencer,
        }
    }

    /// Desk wired from loaded configuration.
    #[must_use]
    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(
            EntryValidator::new(config.confirmation.clone()),
            BatchSequencer::new(config.batch.clone()),
        )
    }

    /// Review a proposed entry without committing anything.
    #[must_use]
    pub fn review(&self, snapshot: &QuantitySnapshot, accepted: i64, rejected: i64) -> EntryReview {
        self.validator.review(snapshot, accepted, rejected)
    }

    /// Commit an entry: re-review, enforce confirmation, mint the batch.
    ///
    /// The batch number is issued only after the entry passed every
    /// check, so rejected commits never burn a sequence.
    ///
    /// # Errors
    ///
    /// - The first review violation ([`EntryError::NegativeQuantity`] or
    ///   [`EntryError::QuantityExceeded`]) if the entry is invalid.
    /// - [`EntryError::ConfirmationRequired`] if the review asked for
    ///   confirmation and `confirmed` is false.
    /// - [`EntryError::Sequence`] if the date's batch space is spent.
    pub fn commit(
        &self,
        snapshot: &QuantitySnapshot,
        accepted: i64,
        rejected: i64,
        confirmed: bool,
        date_key: NaiveDate,
    ) -> Result<CommittedEntry, EntryError> {
        let mut review = self.validator.review(snapshot, accepted, rejected);
        if let Some(violation) = review.errors.into_iter().next() {
            return Err(violation);
        }
        if review.requires_confirmation && !confirmed {
            let message = review
                .confirmation_message
                .take()
                .unwrap_or_else(|| "confirm to proceed".to_string());
            return Err(EntryError::ConfirmationRequired { message });
        }

        let batch = self.sequencer.issue(date_key)?;
        info!(
            order_id = snapshot.order_id,
            accepted,
            rejected,
            batch = %batch,
            "production entry committed"
        );
        Ok(CommittedEntry {
            batch,
            accepted,
            rejected,
            new_remaining: snapshot.remaining() - (accepted + rejected),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
