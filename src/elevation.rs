//! Elevation negotiator
//!
//! Owns the elevated-session lifecycle and the single privilege slot:
//!
//! ```text
//! pending-confirmation --(confirmed call)--> requesting-privilege --> running --> succeeded
//!          |                                          |                  |
//!          v                                          v                  v
//!      cancelled                                    failed             failed
//! ```
//!
//! A confirmed request while another session holds the slot is rejected
//! with `SessionBusy`; requests are never queued.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::{EngineError, ErrorKind, ProviderError};
use crate::events::ProgressSnapshot;
use crate::optimize::OptimizeKind;
use crate::provider::{BatchRequest, ElevatedExecutor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    PendingConfirmation,
    RequestingPrivilege,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Succeeded | SessionState::Failed | SessionState::Cancelled
        )
    }

    /// States that hold the privilege slot.
    pub fn holds_slot(&self) -> bool {
        matches!(self, SessionState::RequestingPrivilege | SessionState::Running)
    }
}

/// Name of the progress stream for one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionTopic(String);

impl SessionTopic {
    pub fn for_session(id: u64) -> Self {
        SessionTopic(format!("clean-session-{}", id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "kind", rename_all = "snake_case")]
pub enum SessionPurpose {
    Clean,
    Optimize(OptimizeKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionFailure {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElevatedExecutionSession {
    pub id: u64,
    pub topic: SessionTopic,
    pub purpose: SessionPurpose,
    pub requested_category_ids: Vec<String>,
    pub state: SessionState,
    pub progress: ProgressSnapshot,
    pub failure: Option<SessionFailure>,
    pub created_at: DateTime<Utc>,
}

impl ElevatedExecutionSession {
    fn new(id: u64, purpose: SessionPurpose, category_ids: Vec<String>, state: SessionState) -> Self {
        Self {
            id,
            topic: SessionTopic::for_session(id),
            purpose,
            requested_category_ids: category_ids,
            state,
            progress: ProgressSnapshot::default(),
            failure: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_denied(&self) -> bool {
        self.failure
            .as_ref()
            .is_some_and(|f| f.kind == ErrorKind::PrivilegeDenied)
    }
}

/// Session bookkeeping; lives inside the engine state behind its lock.
#[derive(Debug, Default)]
pub struct ElevationNegotiator {
    next_id: u64,
    current: Option<ElevatedExecutionSession>,
}

impl ElevationNegotiator {
    pub fn current(&self) -> Option<&ElevatedExecutionSession> {
        self.current.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|s| s.state.holds_slot())
    }

    /// Create the session for a request.
    ///
    /// Unconfirmed requests stop at `pending-confirmation` and take no slot.
    /// Confirmed requests take the slot and enter `requesting-privilege`.
    pub fn open(
        &mut self,
        purpose: SessionPurpose,
        category_ids: Vec<String>,
        confirmed: bool,
    ) -> Result<ElevatedExecutionSession, EngineError> {
        if self.is_busy() {
            warn!("elevated request rejected: a session is already running");
            return Err(EngineError::SessionBusy);
        }

        self.next_id += 1;
        let state = if confirmed {
            SessionState::RequestingPrivilege
        } else {
            SessionState::PendingConfirmation
        };
        let session = ElevatedExecutionSession::new(self.next_id, purpose, category_ids, state);
        debug!(session = session.id, state = ?state, "elevated session opened");
        self.current = Some(session.clone());
        Ok(session)
    }

    /// The user declined the confirmation dialog.
    pub fn cancel_pending(&mut self) -> Option<ElevatedExecutionSession> {
        let session = self.current.as_mut()?;
        if session.state != SessionState::PendingConfirmation {
            return None;
        }
        session.state = SessionState::Cancelled;
        Some(session.clone())
    }

    pub fn mark_running(&mut self, id: u64) {
        if let Some(session) = self.session_mut(id) {
            session.state = SessionState::Running;
            info!(session = id, "elevated session running");
        }
    }

    pub fn succeed(&mut self, id: u64) -> Option<ElevatedExecutionSession> {
        let session = self.session_mut(id)?;
        session.state = SessionState::Succeeded;
        Some(session.clone())
    }

    pub fn fail(&mut self, id: u64, kind: ErrorKind, message: &str) -> Option<ElevatedExecutionSession> {
        let session = self.session_mut(id)?;
        session.state = SessionState::Failed;
        session.failure = Some(SessionFailure {
            kind,
            message: message.to_string(),
        });
        Some(session.clone())
    }

    /// Fail a session that is still holding the slot; no-op once terminal.
    pub fn abandon(&mut self, id: u64) {
        let holds_slot = self
            .current
            .as_ref()
            .is_some_and(|s| s.id == id && s.state.holds_slot());
        if holds_slot {
            warn!(session = id, "elevated session abandoned before finishing");
            self.fail(id, ErrorKind::ProviderUnavailable, "session interrupted");
        }
    }

    pub fn update_progress(&mut self, id: u64, snapshot: &ProgressSnapshot) {
        if let Some(session) = self.session_mut(id) {
            session.progress = snapshot.clone();
        }
    }

    /// Pin the freed counters to what the ledger confirmed.
    pub fn confirm_progress(&mut self, id: u64, cleaned_size_bytes: u64, cleaned_count: u64) {
        if let Some(session) = self.session_mut(id) {
            session.progress.cleaned_size_bytes = cleaned_size_bytes;
            session.progress.cleaned_count = cleaned_count;
        }
    }

    fn session_mut(&mut self, id: u64) -> Option<&mut ElevatedExecutionSession> {
        self.current.as_mut().filter(|s| s.id == id)
    }
}

/// Ask the executor for an elevated context, prompting only when the
/// process is not already elevated.
pub fn request_privilege(
    executor: &dyn ElevatedExecutor,
    session: &ElevatedExecutionSession,
) -> Result<(), ProviderError> {
    let prompt = !executor.is_privileged();
    debug!(session = session.id, prompt, "requesting elevated context");
    executor.launch(&BatchRequest {
        topic: session.topic.clone(),
        category_ids: session.requested_category_ids.clone(),
        prompt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unconfirmed_request_is_pending_and_takes_no_slot() {
        let mut negotiator = ElevationNegotiator::default();
        let session = negotiator
            .open(SessionPurpose::Clean, ids(&["1"]), false)
            .unwrap();
        assert_eq!(session.state, SessionState::PendingConfirmation);
        assert!(!negotiator.is_busy());
    }

    #[test]
    fn test_second_confirmed_request_is_busy() {
        let mut negotiator = ElevationNegotiator::default();
        let first = negotiator
            .open(SessionPurpose::Clean, ids(&["1"]), true)
            .unwrap();
        negotiator.mark_running(first.id);

        let second = negotiator.open(SessionPurpose::Clean, ids(&["2"]), true);
        assert_eq!(second, Err(EngineError::SessionBusy));
        let pending = negotiator.open(SessionPurpose::Clean, ids(&["2"]), false);
        assert_eq!(pending, Err(EngineError::SessionBusy));

        let current = negotiator.current().unwrap();
        assert_eq!(current.id, first.id);
        assert_eq!(current.state, SessionState::Running);
    }

    #[test]
    fn test_slot_released_on_terminal_state() {
        let mut negotiator = ElevationNegotiator::default();
        let first = negotiator
            .open(SessionPurpose::Clean, ids(&["1"]), true)
            .unwrap();
        negotiator.fail(first.id, ErrorKind::PrivilegeDenied, "refused");
        assert!(negotiator.current().unwrap().is_denied());
        assert!(!negotiator.is_busy());

        let retry = negotiator
            .open(SessionPurpose::Clean, ids(&["1"]), true)
            .unwrap();
        assert_eq!(retry.id, first.id + 1);
    }

    #[test]
    fn test_cancel_pending_only_affects_pending_sessions() {
        let mut negotiator = ElevationNegotiator::default();
        negotiator
            .open(SessionPurpose::Clean, ids(&["1"]), false)
            .unwrap();
        let cancelled = negotiator.cancel_pending().unwrap();
        assert_eq!(cancelled.state, SessionState::Cancelled);
        assert!(negotiator.cancel_pending().is_none());
    }

    #[test]
    fn test_abandon_is_noop_after_success() {
        let mut negotiator = ElevationNegotiator::default();
        let session = negotiator
            .open(SessionPurpose::Optimize(OptimizeKind::Hibernation), vec![], true)
            .unwrap();
        negotiator.mark_running(session.id);
        negotiator.succeed(session.id);
        negotiator.abandon(session.id);
        assert_eq!(negotiator.current().unwrap().state, SessionState::Succeeded);
    }

    #[test]
    fn test_topic_is_per_session() {
        assert_eq!(SessionTopic::for_session(3).as_str(), "clean-session-3");
    }

    #[test]
    fn test_confirm_progress_overrides_reported_bytes() {
        let mut negotiator = ElevationNegotiator::default();
        let session = negotiator
            .open(SessionPurpose::Clean, ids(&["1", "2"]), true)
            .unwrap();
        negotiator.update_progress(
            session.id,
            &ProgressSnapshot {
                processed_paths: 4,
                total_paths: 4,
                cleaned_size_bytes: 120,
                cleaned_count: 4,
                current_path: String::new(),
            },
        );
        negotiator.confirm_progress(session.id, 60, 2);

        let progress = &negotiator.current().unwrap().progress;
        assert_eq!(progress.cleaned_size_bytes, 60);
        assert_eq!(progress.cleaned_count, 2);
        assert_eq!(progress.processed_paths, 4);
    }
}
