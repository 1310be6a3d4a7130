//! Production entry validation.
//!
//! A proposed entry (accepted + rejected piece counts against a work
//! order) is reviewed against the order's quantity snapshot. Review is a
//! pure report: it never mutates the snapshot and always returns the full
//! picture — validity, every rule violation found, the remaining quantity
//! after the entry, and whether the entry is large enough to need an
//! explicit operator confirmation.

use tracing::debug;

use super::QuantitySnapshot;
use super::batch::SequenceError;
use crate::config::ConfirmationPolicy;
use crate::error::ErrorCode;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Rule violations and rejections for production entries.
#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    /// Accepted or rejected count was negative.
    #[error("quantities must be non-negative (accepted {accepted}, rejected {rejected})")]
    NegativeQuantity {
        /// The proposed accepted count.
        accepted: i64,
        /// The proposed rejected count.
        rejected: i64,
    },

    /// The entry books more pieces than the order has left.
    #[error("entry of {total} exceeds the remaining quantity of {remaining}")]
    QuantityExceeded {
        /// Accepted plus rejected.
        total: i64,
        /// What the order had left before the entry.
        remaining: i64,
    },

    /// A large entry was committed without the required confirmation.
    #[error("confirmation required: {message}")]
    ConfirmationRequired {
        /// Operator-facing text describing what to confirm.
        message: String,
    },

    /// Batch number issuance failed during commit.
    #[error(transparent)]
    Sequence(#[from] SequenceError),
}

impl EntryError {
    /// Machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NegativeQuantity { .. } => ErrorCode::NegativeQuantity,
            Self::QuantityExceeded { .. } => ErrorCode::QuantityExceeded,
            Self::ConfirmationRequired { .. } => ErrorCode::ConfirmationRequired,
            Self::Sequence(inner) => inner.code(),
        }
    }
}

// ---------------------------------------------------------------------------
// Review report
// ---------------------------------------------------------------------------

/// Outcome of reviewing one proposed entry.
#[derive(Debug)]
pub struct EntryReview {
    /// True when no rule was violated.
    pub is_valid: bool,
    /// Every violation found, in check order.
    pub errors: Vec<EntryError>,
    /// Remaining quantity after the entry; `None` when invalid.
    pub new_remaining: Option<i64>,
    /// True when the entry needs an explicit operator confirmation.
    ///
    /// Only ever set on valid entries; it is a prompt, not a violation.
    pub requires_confirmation: bool,
    /// Operator-facing prompt text when confirmation is required.
    pub confirmation_message: Option<String>,
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Reviews proposed entries against a confirmation policy.
#[derive(Debug, Clone)]
pub struct EntryValidator {
    policy: ConfirmationPolicy,
}

impl EntryValidator {
    /// Validator applying the given policy.
    #[must_use]
    pub const fn new(policy: ConfirmationPolicy) -> Self {
        Self { policy }
    }

    /// Review a proposed entry against an order's quantity snapshot.
    ///
    /// Rules, in check order:
    /// 1. both counts must be non-negative;
    /// 2. their total must not exceed the snapshot's remaining quantity.
    ///
    /// A valid entry consuming strictly more than the policy's share of
    /// the remaining quantity, or at least its absolute threshold, gets
    /// `requires_confirmation` set. Zero-total entries are always valid
    /// and never prompt.
    #[must_use]
    pub fn review(&self, snapshot: &QuantitySnapshot, accepted: i64, rejected: i64) -> EntryReview {
        let remaining = snapshot.remaining();
        let total = accepted + rejected;
        let mut errors = Vec::new();

        if accepted < 0 || rejected < 0 {
            errors.push(EntryError::NegativeQuantity { accepted, rejected });
        } else if total > remaining {
            errors.push(EntryError::QuantityExceeded { total, remaining });
        }

        let is_valid = errors.is_empty();
        let requires_confirmation = is_valid && self.needs_confirmation(total, remaining);
        if !is_valid || requires_confirmation {
            debug!(
                order_id = snapshot.order_id,
                accepted,
                rejected,
                remaining,
                is_valid,
                requires_confirmation,
                "entry review flagged"
            );
        }
        EntryReview {
            is_valid,
            errors,
            new_remaining: is_valid.then(|| remaining - total),
            requires_confirmation,
            confirmation_message: requires_confirmation.then(|| {
                format!("entry books {total} of {remaining} remaining; confirm to proceed")
            }),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn needs_confirmation(&self, total: i64, remaining: i64) -> bool {
        if total == 0 {
            return false;
        }
        let share_tripped = (total as f64) > (remaining as f64) * self.policy.ratio;
        let floor_tripped = self.policy.min_qty.is_some_and(|min_qty| total >= min_qty);
        share_tripped || floor_tripped
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
