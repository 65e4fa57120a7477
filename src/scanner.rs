//! Scan coordinator
//!
//! Fans a scan out to one worker thread per category. Workers write their
//! result into the shared rows themselves (under the engine lock) and then
//! announce it on a channel; the [`ScanStream`] handed back to the caller is
//! only an observer, so dropping it never loses a result.
//!
//! Every scan bumps a generation counter. A worker whose generation is no
//! longer current (cancelled or superseded scan) discards its result.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::categories::Registry;
use crate::engine::{EngineState, Shared};
use crate::error::{EngineError, ProviderError};
use crate::events::ScanUpdate;
use crate::page::{PageEvent, PageState};
use crate::provider::{CategoryScan, ScanProvider};
use crate::state::CategoryStatus;

/// Bookkeeping for the most recent scan trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanSession {
    pub generation: u64,
    pub category_ids: BTreeSet<String>,
    pub started_at: DateTime<Utc>,
}

/// Shared flag that stops a scan from being waited on.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub scanned: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub total_selected_bytes: u64,
}

/// Per-category results of one scan, in completion order.
///
/// Yields one [`ScanUpdate`] per category as it reaches `scanned` or
/// `error`, and ends when every member has, or when the scan is cancelled or
/// replaced by a newer one.
pub struct ScanStream {
    shared: Arc<Shared>,
    generation: u64,
    rx: Receiver<ScanUpdate>,
    remaining: usize,
    cancel: CancelToken,
    poll: Duration,
    scanned: usize,
    failed: usize,
    cancelled: bool,
}

impl ScanStream {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Stop waiting; members still scanning become `error`.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        cancel_session(&self.shared, self.generation);
        self.cancelled = true;
    }

    /// Drain the stream and report the outcome.
    pub fn wait(mut self) -> ScanSummary {
        for _ in self.by_ref() {}
        self.summary()
    }

    pub fn summary(&self) -> ScanSummary {
        ScanSummary {
            scanned: self.scanned,
            failed: self.failed,
            cancelled: self.cancelled,
            total_selected_bytes: self.shared.lock().selection.total_selected_size(),
        }
    }
}

impl Iterator for ScanStream {
    type Item = ScanUpdate;

    fn next(&mut self) -> Option<ScanUpdate> {
        loop {
            if self.remaining == 0 || self.cancelled {
                return None;
            }
            if self.cancel.is_cancelled() {
                self.cancel();
                return None;
            }
            match self.rx.recv_timeout(self.poll) {
                Ok(update) => {
                    self.remaining -= 1;
                    match update.state.status {
                        CategoryStatus::Error => self.failed += 1,
                        _ => self.scanned += 1,
                    }
                    return Some(update);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.shared.lock().scan_generation != self.generation {
                        self.cancelled = true;
                        return None;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // Every worker is gone; anything missing was discarded.
                    if self.remaining > 0 {
                        self.cancelled = true;
                    }
                    return None;
                }
            }
        }
    }
}

pub(crate) fn start_scan(
    shared: &Arc<Shared>,
    registry: &Arc<Registry>,
    provider: &Arc<dyn ScanProvider>,
    ids: BTreeSet<String>,
    cancel: CancelToken,
    poll: Duration,
) -> Result<ScanStream, EngineError> {
    registry.ensure_known(ids.iter().map(String::as_str))?;
    shared.lock().page.next(&PageEvent::StartScan)?;

    if let Err(err) = provider.ensure_available() {
        let err = EngineError::from(err);
        let message = err.to_string();
        warn!(error = %message, "scan provider unavailable");
        let mut state = shared.lock();
        state.page.apply(PageEvent::StartScan)?;
        state.page.apply(PageEvent::BatchFailed(message))?;
        return Err(err);
    }

    let (tx, rx) = mpsc::channel();
    let generation = {
        let mut state = shared.lock();
        state.page.apply(PageEvent::StartScan)?;
        state.scan_generation += 1;
        let generation = state.scan_generation;

        supersede(&mut state, &ids);
        state.ledger.clear();
        for id in &ids {
            if let Some(row) = state.selection.row_mut(id) {
                row.begin_scan();
            }
        }
        state.scan_session = Some(ScanSession {
            generation,
            category_ids: ids.clone(),
            started_at: Utc::now(),
        });
        if ids.is_empty() {
            state.page.apply(PageEvent::ScanFinished)?;
        }
        generation
    };
    info!(generation, categories = ids.len(), "scan started");

    for id in &ids {
        let worker = Worker {
            shared: Arc::clone(shared),
            registry: Arc::clone(registry),
            generation,
            id: id.clone(),
        };
        let provider = Arc::clone(provider);
        let worker_tx = tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("scan-{}", id))
            .spawn(move || {
                debug!(category = %worker.id, "category scan started");
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    provider.scan_category(&worker.id)
                }))
                .unwrap_or_else(|_| Err(ProviderError::Failed("scan provider panicked".into())));
                if let Some(update) = worker.apply(result) {
                    let _ = worker_tx.send(update);
                }
            });
        if let Err(err) = spawned {
            let worker = Worker {
                shared: Arc::clone(shared),
                registry: Arc::clone(registry),
                generation,
                id: id.clone(),
            };
            let failure = ProviderError::Failed(format!("could not start scan worker: {}", err));
            if let Some(update) = worker.apply(Err(failure)) {
                let _ = tx.send(update);
            }
        }
    }
    drop(tx);

    Ok(ScanStream {
        shared: Arc::clone(shared),
        generation,
        rx,
        remaining: ids.len(),
        cancel,
        poll,
        scanned: 0,
        failed: 0,
        cancelled: false,
    })
}

/// Fail the members of scan `generation` that are still scanning and leave
/// the page at `scan-complete`. Returns false if that scan is not running.
pub(crate) fn cancel_session(shared: &Shared, generation: u64) -> bool {
    let mut state = shared.lock();
    let running = state.scan_generation == generation
        && state.page.state() == PageState::Scanning
        && state
            .scan_session
            .as_ref()
            .is_some_and(|s| s.generation == generation);
    if !running {
        return false;
    }

    let members: Vec<String> = state
        .scan_session
        .as_ref()
        .map(|s| s.category_ids.iter().cloned().collect())
        .unwrap_or_default();
    let mut interrupted = 0;
    for id in &members {
        if let Some(row) = state.selection.row_mut(id) {
            if row.status == CategoryStatus::Scanning {
                row.fail("scan cancelled");
                interrupted += 1;
            }
        }
    }
    state.scan_generation += 1;
    let _ = state.page.apply(PageEvent::ScanFinished);
    info!(generation, interrupted, "scan cancelled");
    true
}

/// Rows of the previous scan that the new one does not cover would
/// otherwise stay `scanning` forever.
fn supersede(state: &mut EngineState, next: &BTreeSet<String>) {
    let previous: Vec<String> = match &state.scan_session {
        Some(session) => session.category_ids.difference(next).cloned().collect(),
        None => return,
    };
    for id in previous {
        if let Some(row) = state.selection.row_mut(&id) {
            if row.status == CategoryStatus::Scanning {
                row.fail("scan superseded");
            }
        }
    }
}

struct Worker {
    shared: Arc<Shared>,
    registry: Arc<Registry>,
    generation: u64,
    id: String,
}

impl Worker {
    /// Write the result into the row if this scan is still current.
    fn apply(&self, result: Result<CategoryScan, ProviderError>) -> Option<ScanUpdate> {
        let mut state = self.shared.lock();
        if state.scan_generation != self.generation {
            debug!(category = %self.id, generation = self.generation, "discarding stale scan result");
            return None;
        }
        let expected = self.registry.lookup(&self.id).map(|c| c.kind);

        let update = {
            let row = state.selection.row_mut(&self.id)?;
            if row.status != CategoryStatus::Scanning {
                return None;
            }
            match result {
                Ok(scan) => match scan.detail.as_ref().map(|d| d.kind()) {
                    Some(kind) if Some(kind) != expected => {
                        warn!(category = %self.id, detail = kind.as_str(), "scan detail does not match category");
                        row.fail(format!("provider returned {} detail", kind.as_str()));
                    }
                    _ => {
                        debug!(category = %self.id, size = scan.size_bytes, files = scan.file_count, "category scanned");
                        row.apply_scan(scan);
                    }
                },
                Err(err) => {
                    warn!(category = %self.id, error = %err, "category scan failed");
                    row.fail(err.to_string());
                }
            }
            ScanUpdate {
                category_id: self.id.clone(),
                state: row.clone(),
            }
        };

        let finished = state.scan_session.as_ref().is_some_and(|session| {
            session.category_ids.iter().all(|id| {
                state
                    .selection
                    .get(id)
                    .is_some_and(|row| row.status.is_scan_terminal())
            })
        });
        if finished && state.page.state() == PageState::Scanning {
            let _ = state.page.apply(PageEvent::ScanFinished);
            info!(
                generation = self.generation,
                total = state.selection.total_selected_size(),
                "scan complete"
            );
        }
        Some(update)
    }
}
