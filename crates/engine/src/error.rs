//! The module contains the errors the engine can throw.
//!
//! The errors are:
//!
//! - [`NotFound`] thrown when a referenced user, group or expense is missing.
//! - [`Validation`] thrown when caller-supplied data breaks a contract.
//! - [`Conflict`] thrown when a uniqueness rule is violated.
//! - [`Invariant`] thrown when allocation arithmetic fails to reconcile. This
//!   is always a defect, never a user error.
//!
//!  [`NotFound`]: EngineError::NotFound
//!  [`Validation`]: EngineError::Validation
//!  [`Conflict`]: EngineError::Conflict
//!  [`Invariant`]: EngineError::Invariant
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("\"{0}\" already present!")]
    Conflict(String),
    #[error("Ledger invariant violated: {0}")]
    Invariant(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// `true` for errors caused by the caller's input, as opposed to defects
    /// or storage failures.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::Validation(_) | Self::Conflict(_)
        )
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Invariant(a), Self::Invariant(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_exclude_defects_and_storage() {
        assert!(EngineError::NotFound("group".to_string()).is_client_error());
        assert!(EngineError::Validation("amount".to_string()).is_client_error());
        assert!(EngineError::Conflict("membership".to_string()).is_client_error());
        assert!(!EngineError::Invariant("sum".to_string()).is_client_error());
        assert!(!EngineError::Database(DbErr::Custom("down".to_string())).is_client_error());
    }
}
