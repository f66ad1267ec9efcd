//! Neutral-result wrapper returned by every oracle call.
//!
//! Oracles degrade instead of failing: a transport or parsing problem
//! produces [`OracleOutcome::Neutral`], and callers that only need a value
//! use [`OracleOutcome::value`] to get the neutral default (empty list, empty
//! string, `0.0`). The reason is kept so it can be logged.

use serde::{Deserialize, Serialize};

/// Either a produced value or a neutral marker with the reason it degraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OracleOutcome<T> {
    Produced { value: T },
    Neutral { reason: String },
}

impl<T> OracleOutcome<T> {
    pub fn produced(value: T) -> Self {
        OracleOutcome::Produced { value }
    }

    pub fn neutral(reason: impl Into<String>) -> Self {
        OracleOutcome::Neutral {
            reason: reason.into(),
        }
    }

    pub fn is_neutral(&self) -> bool {
        matches!(self, OracleOutcome::Neutral { .. })
    }

    /// Reason for degrading, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            OracleOutcome::Produced { .. } => None,
            OracleOutcome::Neutral { reason } => Some(reason),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> OracleOutcome<U> {
        match self {
            OracleOutcome::Produced { value } => OracleOutcome::Produced { value: f(value) },
            OracleOutcome::Neutral { reason } => OracleOutcome::Neutral { reason },
        }
    }
}

impl<T: Default> OracleOutcome<T> {
    /// The produced value, or `T::default()` for a neutral outcome.
    pub fn value(self) -> T {
        match self {
            OracleOutcome::Produced { value } => value,
            OracleOutcome::Neutral { .. } => T::default(),
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for OracleOutcome<T> {
    fn from(res: Result<T, E>) -> Self {
        match res {
            Ok(value) => OracleOutcome::produced(value),
            Err(e) => OracleOutcome::neutral(e.to_string()),
        }
    }
}
