use std::fmt;

/// Machine-readable error codes for terminal and gateway decision making.
///
/// Every surfaced failure in the core maps to exactly one code via the
/// `code()` method on its error type, so the surrounding application can
/// translate conditions to HTTP statuses or operator text without matching
/// on message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidTransition,
    MissingBreakCode,
    UnknownEventKind,
    QuantityExceeded,
    NegativeQuantity,
    ConfirmationRequired,
    SequenceExhausted,
    UnknownSession,
    LogBackendFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidTransition => "E2001",
            Self::MissingBreakCode => "E2002",
            Self::UnknownEventKind => "E2003",
            Self::QuantityExceeded => "E3001",
            Self::NegativeQuantity => "E3002",
            Self::ConfirmationRequired => "E3003",
            Self::SequenceExhausted => "E3004",
            Self::UnknownSession => "E4001",
            Self::LogBackendFailed => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidTransition => "Activity action not permitted in current state",
            Self::MissingBreakCode => "Pause requires a break reason code",
            Self::UnknownEventKind => "Unrecognized activity event kind",
            Self::QuantityExceeded => "Reported quantity exceeds remaining quantity",
            Self::NegativeQuantity => "Quantities must be non-negative",
            Self::ConfirmationRequired => "Entry requires explicit confirmation",
            Self::SequenceExhausted => "Per-day batch sequence space exhausted",
            Self::UnknownSession => "Session token not found",
            Self::LogBackendFailed => "Activity log backend failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in takt.toml and retry."),
            Self::InvalidTransition => {
                Some("Refresh the worker's derived state and retry with a permitted action.")
            }
            Self::MissingBreakCode => Some("Supply a break reason code when pausing work."),
            Self::UnknownEventKind => Some("Use one of: start, stop, resume, finish."),
            Self::QuantityExceeded => {
                Some("Reduce accepted/rejected quantities to at most the remaining amount.")
            }
            Self::NegativeQuantity => None,
            Self::ConfirmationRequired => {
                Some("Resubmit the entry with explicit confirmation to commit it.")
            }
            Self::SequenceExhausted => {
                Some("Widen batch.pad_width in the config; today's sequence space is spent.")
            }
            Self::UnknownSession => {
                Some("Re-authenticate and select a station to obtain a fresh token.")
            }
            Self::LogBackendFailed => Some("Check the store backing the activity log."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
