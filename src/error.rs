//! Error taxonomy for the orchestration engine.
//!
//! Category-scoped failures never leave the coordinators: they are written
//! into the category's run state and the cleanup ledger. Everything in
//! [`EngineError`] is session- or batch-scoped and is returned to the caller
//! of the triggering operation.

use serde::Serialize;
use thiserror::Error;

use crate::optimize::OptimizeKind;
use crate::page::PageState;

/// Classification shared by returned errors, session failures and ledger rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A single category scan failed; siblings are unaffected.
    ScanFailure,
    /// A single category clean failed; recorded in the ledger.
    CleanFailure,
    /// The OS elevation prompt was refused or cancelled.
    PrivilegeDenied,
    /// An elevated session already holds the privilege slot.
    SessionBusy,
    /// The whole batch could not be started.
    ProviderUnavailable,
    UnknownCategory,
    InvalidTransition,
    PhaseLocked,
    NothingSelected,
}

/// Failure reported by a scan provider, elevated executor or file action.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{0}")]
    Failed(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("privilege request was refused")]
    PrivilegeDenied,

    #[error("operation not supported by this provider")]
    Unsupported,
}

/// Rejections and session/batch failures returned by [`crate::engine::Engine`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    #[error("duplicate category id '{0}' in registry")]
    DuplicateCategory(String),

    #[error("cannot {action} while the page is {from}")]
    InvalidTransition {
        from: PageState,
        action: &'static str,
    },

    #[error("selection cannot change while the page is {0}")]
    PhaseLocked(PageState),

    #[error("no categories selected")]
    NothingSelected,

    #[error("{0} cannot be disabled on this system")]
    NotOptimizable(OptimizeKind),

    #[error("an elevated session is already running")]
    SessionBusy,

    #[error("administrator privileges were denied")]
    PrivilegeDenied,

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::UnknownCategory(_) | EngineError::DuplicateCategory(_) => {
                ErrorKind::UnknownCategory
            }
            EngineError::InvalidTransition { .. } | EngineError::NotOptimizable(_) => {
                ErrorKind::InvalidTransition
            }
            EngineError::PhaseLocked(_) => ErrorKind::PhaseLocked,
            EngineError::NothingSelected => ErrorKind::NothingSelected,
            EngineError::SessionBusy => ErrorKind::SessionBusy,
            EngineError::PrivilegeDenied => ErrorKind::PrivilegeDenied,
            EngineError::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
        }
    }

    /// Whether the user can fix this by confirming the elevation prompt again.
    pub fn is_retryable_by_user(&self) -> bool {
        matches!(self, EngineError::PrivilegeDenied)
    }
}

impl From<ProviderError> for EngineError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::PrivilegeDenied => EngineError::PrivilegeDenied,
            ProviderError::Unavailable(msg) | ProviderError::Failed(msg) => {
                EngineError::ProviderUnavailable(msg)
            }
            ProviderError::Unsupported => {
                EngineError::ProviderUnavailable("operation not supported".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privilege_denied_maps_to_distinct_kind() {
        let err: EngineError = ProviderError::PrivilegeDenied.into();
        assert_eq!(err, EngineError::PrivilegeDenied);
        assert_eq!(err.kind(), ErrorKind::PrivilegeDenied);
        assert!(err.is_retryable_by_user());
    }

    #[test]
    fn test_launch_failure_maps_to_provider_unavailable() {
        let err: EngineError = ProviderError::Unavailable("helper missing".into()).into();
        assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
        assert!(!err.is_retryable_by_user());
        assert!(err.to_string().contains("helper missing"));
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = EngineError::InvalidTransition {
            from: PageState::Cleaning,
            action: "start a scan",
        };
        assert_eq!(err.to_string(), "cannot start a scan while the page is cleaning");
    }
}
