//! Domain session lifecycle
//!
//! A session moves `Pending -> Running -> Completed | Aborted` and never
//! backward. Both terminal states flush the records gathered so far.

use std::fmt;

/// Why a domain session stopped before its frontier drained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbortReason {
    /// The per-domain wall-clock deadline fired
    DeadlineExceeded,

    /// The per-domain page budget ran out with work still queued
    BudgetExhausted,
}

impl AbortReason {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::DeadlineExceeded => "deadline_exceeded",
            Self::BudgetExhausted => "budget_exhausted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "deadline_exceeded" => Some(Self::DeadlineExceeded),
            "budget_exhausted" => Some(Self::BudgetExhausted),
            _ => None,
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Current status of a domain session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainStatus {
    Pending,
    Running,
    Completed,
    Aborted(AbortReason),
}

/// Rejected status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid domain transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: DomainStatus,
    pub to: DomainStatus,
}

impl DomainStatus {
    /// Returns true for `Completed` and `Aborted`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted(_))
    }

    /// Moves the session forward
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The transition is legal and has been applied
    /// * `Err(InvalidTransition)` - The transition would skip a state or move
    ///   backward; the status is left untouched
    pub fn transition(&mut self, next: DomainStatus) -> Result<(), InvalidTransition> {
        let allowed = matches!(
            (*self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Aborted(_))
        );

        if !allowed {
            return Err(InvalidTransition {
                from: *self,
                to: next,
            });
        }

        *self = next;
        Ok(())
    }

    /// Abort reason, if any
    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            Self::Aborted(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Converts the status to its database label
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted(_) => "aborted",
        }
    }
}

impl fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted(reason) => write!(f, "aborted ({})", reason),
            other => write!(f, "{}", other.to_db_string()),
        }
    }
}
