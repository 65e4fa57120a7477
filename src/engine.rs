//! Orchestration engine
//!
//! Owns every piece of process-scoped state (category rows, page state,
//! elevated session, ledger) behind one lock and hands out read-only
//! snapshots. The scan and clean coordinators borrow the state only for
//! short critical sections; collaborator calls always happen outside the lock.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

use crate::categories::Registry;
use crate::cleaner::{self, ExecutorFeed};
use crate::config::Config;
use crate::disk::DiskInfo;
use crate::elevation::{self, ElevatedExecutionSession, ElevationNegotiator, SessionPurpose};
use crate::error::{EngineError, ErrorKind, ProviderError};
use crate::events::{ProgressHub, ProgressSubscription};
use crate::ledger::{CleanSummary, CleanupLedgerEntry, Ledger};
use crate::optimize::{OptimizeItem, OptimizeOutcome, OptimizeResult};
use crate::page::{PageEvent, PageMachine, PageState};
use crate::provider::{ElevatedExecutor, ScanProvider};
use crate::scanner::{self, CancelToken, ScanSession, ScanStream};
use crate::selection::SelectionModel;
use crate::state::{CategoryRunState, CategoryStatus};

pub(crate) struct EngineState {
    pub(crate) selection: SelectionModel,
    pub(crate) page: PageMachine,
    pub(crate) scan_generation: u64,
    pub(crate) scan_session: Option<ScanSession>,
    pub(crate) negotiator: ElevationNegotiator,
    pub(crate) ledger: Ledger,
}

pub(crate) struct Shared {
    state: Mutex<EngineState>,
    pub(crate) hub: Arc<ProgressHub>,
    pub(crate) abort: AtomicBool,
}

impl Shared {
    /// All guarded data stays consistent between statements, so a poisoned
    /// lock is safe to keep using.
    pub(crate) fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Replaces a category's registry default for `checked`.
    pub selection_overrides: BTreeMap<String, bool>,
    /// How often blocked waits re-check cancellation.
    pub cancel_poll: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            selection_overrides: BTreeMap::new(),
            cancel_poll: Duration::from_millis(100),
        }
    }
}

impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        Self {
            selection_overrides: config.selection.overrides.clone(),
            cancel_poll: config.cancel_poll(),
        }
    }
}

/// Everything a presentation layer renders, captured under one lock.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub page: PageState,
    pub last_error: Option<String>,
    pub categories: Vec<CategoryRunState>,
    pub total_selected_bytes: u64,
    pub selected_count: usize,
    pub session: Option<ElevatedExecutionSession>,
    pub ledger: Vec<CleanupLedgerEntry>,
    pub summary: CleanSummary,
}

pub struct Engine {
    shared: Arc<Shared>,
    registry: Arc<Registry>,
    scanner: Arc<dyn ScanProvider>,
    executor: Arc<dyn ElevatedExecutor>,
    options: EngineOptions,
}

impl Engine {
    pub fn new(
        registry: Registry,
        scanner: Arc<dyn ScanProvider>,
        executor: Arc<dyn ElevatedExecutor>,
    ) -> Self {
        Self::with_options(registry, scanner, executor, EngineOptions::default())
    }

    pub fn with_options(
        registry: Registry,
        scanner: Arc<dyn ScanProvider>,
        executor: Arc<dyn ElevatedExecutor>,
        options: EngineOptions,
    ) -> Self {
        let state = EngineState {
            selection: SelectionModel::seed(&registry, &options.selection_overrides),
            page: PageMachine::default(),
            scan_generation: 0,
            scan_session: None,
            negotiator: ElevationNegotiator::default(),
            ledger: Ledger::default(),
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                hub: ProgressHub::new(),
                abort: AtomicBool::new(false),
            }),
            registry: Arc::new(registry),
            scanner,
            executor,
            options,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn scan_provider(&self) -> Arc<dyn ScanProvider> {
        Arc::clone(&self.scanner)
    }

    // --- scanning -------------------------------------------------------

    /// Start scanning `ids` concurrently. See [`ScanStream`].
    pub fn start_scan<I, S>(&self, ids: I) -> Result<ScanStream, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.start_scan_with_cancel(ids, CancelToken::default())
    }

    pub fn start_scan_with_cancel<I, S>(
        &self,
        ids: I,
        cancel: CancelToken,
    ) -> Result<ScanStream, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        scanner::start_scan(
            &self.shared,
            &self.registry,
            &self.scanner,
            ids,
            cancel,
            self.options.cancel_poll,
        )
    }

    /// Scan every registry category.
    pub fn start_full_scan(&self) -> Result<ScanStream, EngineError> {
        self.start_scan(self.registry.ids())
    }

    /// Stop waiting for the current scan. Returns false if none was running.
    pub fn cancel_scan(&self) -> bool {
        let generation = self.shared.lock().scan_generation;
        scanner::cancel_session(&self.shared, generation)
    }

    pub fn scan_session(&self) -> Option<ScanSession> {
        self.shared.lock().scan_session.clone()
    }

    // --- selection ------------------------------------------------------

    pub fn toggle(&self, id: &str) -> Result<bool, EngineError> {
        let mut state = self.shared.lock();
        let page = state.page.state();
        state.selection.toggle(id, page)
    }

    pub fn set_checked(&self, id: &str, checked: bool) -> Result<(), EngineError> {
        let mut state = self.shared.lock();
        let page = state.page.state();
        state.selection.set_checked(id, checked, page)
    }

    pub fn total_selected_size(&self) -> u64 {
        self.shared.lock().selection.total_selected_size()
    }

    pub fn selected_count(&self) -> usize {
        self.shared.lock().selection.selected_count()
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.shared.lock().selection.selected_ids()
    }

    // --- cleaning -------------------------------------------------------

    /// Clean `ids` in the given order inside one elevated session.
    ///
    /// Without `confirmed` this only records a `pending-confirmation`
    /// session and calls nothing. With it, the call blocks until every
    /// category is terminal and returns the finished session; per-category
    /// failures are in [`Engine::ledger`], not in the result.
    pub fn request_elevated_clean<S: AsRef<str>>(
        &self,
        ids: &[S],
        confirmed: bool,
    ) -> Result<ElevatedExecutionSession, EngineError> {
        let mut ordered: Vec<String> = Vec::with_capacity(ids.len());
        for id in ids.iter().map(AsRef::as_ref) {
            if !ordered.iter().any(|o| o == id) {
                ordered.push(id.to_string());
            }
        }
        if ordered.is_empty() {
            return Err(EngineError::NothingSelected);
        }
        self.registry.ensure_known(ordered.iter().map(String::as_str))?;

        let session = {
            let mut state = self.shared.lock();
            if !confirmed {
                return state.negotiator.open(SessionPurpose::Clean, ordered, false);
            }
            if state.negotiator.is_busy() {
                warn!("clean rejected: elevated session already running");
                return Err(EngineError::SessionBusy);
            }
            let start = PageEvent::StartClean {
                selected: state.selection.selected_count(),
            };
            state.page.next(&start)?;
            let session = state.negotiator.open(SessionPurpose::Clean, ordered, true)?;
            state.page.apply(start)?;
            session
        };
        let _guard = SessionGuard {
            shared: &self.shared,
            id: session.id,
        };
        self.shared.abort.store(false, Ordering::SeqCst);
        self.shared.hub.reset();
        let feed = ExecutorFeed::start(
            &self.shared,
            &self.executor,
            &session,
            self.options.cancel_poll,
        );

        if let Err(err) = elevation::request_privilege(self.executor.as_ref(), &session) {
            return Err(self.fail_launch(session.id, err));
        }
        self.shared.lock().negotiator.mark_running(session.id);

        cleaner::execute_clean(&self.shared, &self.registry, &self.executor, &session, feed);

        let mut state = self.shared.lock();
        let finished = state.negotiator.succeed(session.id);
        state.page.apply(PageEvent::CleanFinished)?;
        let summary = state.ledger.summary();
        info!(
            session = session.id,
            freed = summary.bytes_freed,
            cleaned = summary.cleaned,
            failed = summary.failed,
            "clean batch finished"
        );
        Ok(finished.unwrap_or(session))
    }

    /// Clean every checked category in display order.
    pub fn start_clean(&self, confirmed: bool) -> Result<ElevatedExecutionSession, EngineError> {
        let ids = self.selected_ids();
        self.request_elevated_clean(&ids, confirmed)
    }

    pub fn cancel_pending_session(&self) -> Option<ElevatedExecutionSession> {
        self.shared.lock().negotiator.cancel_pending()
    }

    /// Skip the categories not yet started; the one in progress finishes.
    pub fn request_abort(&self) {
        info!("abort requested; remaining categories will be skipped");
        self.shared.abort.store(true, Ordering::SeqCst);
    }

    fn fail_launch(&self, id: u64, err: ProviderError) -> EngineError {
        let err = EngineError::from(err);
        let message = err.to_string();
        let mut state = self.shared.lock();
        state.negotiator.fail(id, err.kind(), &message);
        let cleaning = state.page.state() == PageState::Cleaning;
        if let EngineError::PrivilegeDenied = err {
            warn!(session = id, "elevation refused by the user");
            if cleaning {
                let _ = state.page.apply(PageEvent::PrivilegeRefused);
            }
        } else {
            warn!(session = id, error = %message, "elevated executor could not start");
            if cleaning {
                let _ = state.page.apply(PageEvent::BatchFailed(message.clone()));
            }
        }
        err
    }

    // --- system optimization --------------------------------------------

    pub fn scan_optimizations(&self) -> Result<Vec<OptimizeItem>, ProviderError> {
        self.scanner.scan_optimizations()
    }

    // --- disk -----------------------------------------------------------

    /// Capacity of the volume being cleaned, read fresh from the provider.
    pub fn disk_info(&self) -> Result<DiskInfo, ProviderError> {
        self.scanner.disk_info()
    }

    /// Disable one optimization item through the elevation gate.
    pub fn optimize(
        &self,
        item: &OptimizeItem,
        confirmed: bool,
    ) -> Result<OptimizeOutcome, EngineError> {
        if !item.can_disable {
            return Err(EngineError::NotOptimizable(item.kind));
        }
        let purpose = SessionPurpose::Optimize(item.kind);
        let session = self
            .shared
            .lock()
            .negotiator
            .open(purpose, Vec::new(), confirmed)?;
        if !confirmed {
            return Ok(OptimizeOutcome::PendingConfirmation(session));
        }
        let _guard = SessionGuard {
            shared: &self.shared,
            id: session.id,
        };

        if let Err(err) = elevation::request_privilege(self.executor.as_ref(), &session) {
            return Err(self.fail_launch(session.id, err));
        }
        self.shared.lock().negotiator.mark_running(session.id);

        let outcome = self.executor.optimize(item.kind);
        let mut state = self.shared.lock();
        let result = match outcome {
            Ok(()) => {
                state.negotiator.succeed(session.id);
                info!(kind = %item.kind, "optimization applied");
                OptimizeResult::success(item.kind, &format!("{} disabled", item.name))
            }
            Err(err) => {
                let message = err.to_string();
                warn!(kind = %item.kind, error = %message, "optimization failed");
                state
                    .negotiator
                    .fail(session.id, ErrorKind::CleanFailure, &message);
                OptimizeResult::failure(item.kind, &message)
            }
        };
        Ok(OptimizeOutcome::Finished(result))
    }

    // --- page -----------------------------------------------------------

    /// Leave `clean-complete`: rows go back to idle, the ledger stays
    /// readable until the next scan.
    pub fn acknowledge(&self) -> Result<(), EngineError> {
        let mut state = self.shared.lock();
        state.page.apply(PageEvent::Acknowledge)?;
        for row in state.selection.rows_mut() {
            row.status = CategoryStatus::Idle;
            row.size_bytes = 0;
            row.file_count = 0;
            row.error_message = None;
            row.path_details.clear();
            row.detail = None;
        }
        Ok(())
    }

    // --- read model -----------------------------------------------------

    pub fn page(&self) -> PageState {
        self.shared.lock().page.state()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.lock().page.last_error().map(str::to_string)
    }

    pub fn categories(&self) -> Vec<CategoryRunState> {
        self.shared.lock().selection.rows().to_vec()
    }

    pub fn category(&self, id: &str) -> Option<CategoryRunState> {
        self.shared.lock().selection.get(id).cloned()
    }

    pub fn session(&self) -> Option<ElevatedExecutionSession> {
        self.shared.lock().negotiator.current().cloned()
    }

    pub fn ledger(&self) -> Vec<CleanupLedgerEntry> {
        self.shared.lock().ledger.entries().to_vec()
    }

    pub fn clean_summary(&self) -> CleanSummary {
        self.shared.lock().ledger.summary()
    }

    pub fn subscribe_progress(&self) -> ProgressSubscription {
        self.shared.hub.subscribe()
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let state = self.shared.lock();
        EngineSnapshot {
            page: state.page.state(),
            last_error: state.page.last_error().map(str::to_string),
            categories: state.selection.rows().to_vec(),
            total_selected_bytes: state.selection.total_selected_size(),
            selected_count: state.selection.selected_count(),
            session: state.negotiator.current().cloned(),
            ledger: state.ledger.entries().to_vec(),
            summary: state.ledger.summary(),
        }
    }
}

/// Frees the privilege slot if a session is left non-terminal (early
/// return or panic between launch and completion).
struct SessionGuard<'a> {
    shared: &'a Shared,
    id: u64,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        let holds_slot = state
            .negotiator
            .current()
            .is_some_and(|s| s.id == self.id && s.state.holds_slot());
        if holds_slot {
            state.negotiator.abandon(self.id);
            if state.page.state() == PageState::Cleaning {
                let _ = state
                    .page
                    .apply(PageEvent::BatchFailed("clean interrupted".to_string()));
            }
        }
    }
}
