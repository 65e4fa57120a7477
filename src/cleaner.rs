//! Clean coordinator
//!
//! Runs the categories of one elevated session strictly one after another,
//! in the order the session lists them. A failing category is recorded and
//! the batch moves on; only an abort request stops it early.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::categories::Registry;
use crate::elevation::{ElevatedExecutionSession, SessionTopic};
use crate::engine::Shared;
use crate::error::ProviderError;
use crate::events::ProgressSnapshot;
use crate::ledger::{CleanupLedgerEntry, SkipReason};
use crate::provider::{CleanOutcome, ElevatedExecutor};

pub(crate) fn execute_clean(
    shared: &Arc<Shared>,
    registry: &Registry,
    executor: &Arc<dyn ElevatedExecutor>,
    session: &ElevatedExecutionSession,
    feed: ExecutorFeed,
) {
    let ids = &session.requested_category_ids;

    for (index, id) in ids.iter().enumerate() {
        if shared.abort.load(Ordering::SeqCst) {
            let mut state = shared.lock();
            for rest in &ids[index..] {
                state
                    .ledger
                    .record(CleanupLedgerEntry::skipped(rest, SkipReason::Aborted));
            }
            info!(session = session.id, skipped = ids.len() - index, "clean aborted");
            break;
        }

        if let Some(row) = shared.lock().selection.row_mut(id) {
            row.begin_clean();
        }
        debug!(session = session.id, category = %id, "cleaning category");

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| executor.clean_category(id)))
            .unwrap_or_else(|_| Err(ProviderError::Failed("clean executor panicked".into())));
        if let Some(freed) = record_outcome(shared, id, outcome) {
            feed.confirm(freed);
        }
    }

    // Joins the forwarder so every confirmed total is published first.
    drop(feed);

    let mut state = shared.lock();
    for category in registry.iter() {
        if ids.contains(&category.id) {
            continue;
        }
        let reason = match state.selection.get(&category.id) {
            Some(row) if row.checked => SkipReason::NotRequested,
            _ => SkipReason::Unchecked,
        };
        state
            .ledger
            .record(CleanupLedgerEntry::skipped(&category.id, reason));
    }
    let summary = state.ledger.summary();
    state
        .negotiator
        .confirm_progress(session.id, summary.bytes_freed, summary.paths_affected);
}

/// Bytes and paths of one category whose deletion the executor confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Freed {
    pub(crate) bytes: u64,
    pub(crate) paths: u64,
}

/// Returns what was freed when the category was cleaned.
fn record_outcome(
    shared: &Shared,
    id: &str,
    outcome: Result<CleanOutcome, ProviderError>,
) -> Option<Freed> {
    let failure = match outcome {
        Ok(outcome) if outcome.success => {
            let mut state = shared.lock();
            if let Some(row) = state.selection.row_mut(id) {
                row.mark_cleaned();
            }
            state.ledger.record(CleanupLedgerEntry::cleaned(
                id,
                outcome.cleaned_size,
                outcome.cleaned_count,
            ));
            info!(
                category = %id,
                freed = outcome.cleaned_size,
                paths = outcome.cleaned_count,
                "category cleaned"
            );
            return Some(Freed {
                bytes: outcome.cleaned_size,
                paths: outcome.cleaned_count,
            });
        }
        Ok(outcome) => outcome
            .error
            .unwrap_or_else(|| "clean reported failure".to_string()),
        Err(err) => err.to_string(),
    };

    warn!(category = %id, error = %failure, "category clean failed");
    let mut state = shared.lock();
    if let Some(row) = state.selection.row_mut(id) {
        row.fail(failure.as_str());
    }
    state.ledger.record(CleanupLedgerEntry::failed(id, &failure));
    None
}

/// Forwards the executor's progress stream for one session into the hub.
///
/// The executor's path counters pass through as reported. Its byte and
/// file counters are replaced with the totals of categories confirmed
/// cleaned, so bytes deleted by a category that later fails never show up.
/// Dropping the feed unsubscribes and waits for the forwarder to drain.
pub(crate) struct ExecutorFeed {
    executor: Arc<dyn ElevatedExecutor>,
    topic: SessionTopic,
    confirmed: Sender<Freed>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ExecutorFeed {
    /// Subscribe to the session topic. Call before launching the run so
    /// nothing the executor reports during launch is missed.
    pub(crate) fn start(
        shared: &Arc<Shared>,
        executor: &Arc<dyn ElevatedExecutor>,
        session: &ElevatedExecutionSession,
        poll: Duration,
    ) -> Self {
        let rx = executor.subscribe(&session.topic);
        let (confirmed, confirmations) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let relay = Relay {
                shared: Arc::clone(shared),
                session_id: session.id,
                latest: ProgressSnapshot::default(),
                freed: Freed::default(),
            };
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name(format!("progress-{}", session.id))
                .spawn(move || forward(rx, confirmations, relay, &stop, poll))
                .map_err(|err| warn!(error = %err, "progress forwarder did not start"))
                .ok()
        };
        Self {
            executor: Arc::clone(executor),
            topic: session.topic.clone(),
            confirmed,
            stop,
            handle,
        }
    }

    fn confirm(&self, freed: Freed) {
        let _ = self.confirmed.send(freed);
    }
}

impl Drop for ExecutorFeed {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.executor.unsubscribe(&self.topic);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct Relay {
    shared: Arc<Shared>,
    session_id: u64,
    latest: ProgressSnapshot,
    freed: Freed,
}

impl Relay {
    fn observe(&mut self, snapshot: ProgressSnapshot) {
        self.latest = snapshot;
        self.publish();
    }

    fn settle(&mut self, freed: Freed) {
        self.freed.bytes += freed.bytes;
        self.freed.paths += freed.paths;
        self.publish();
    }

    fn drain(&mut self, rx: &Receiver<ProgressSnapshot>) {
        while let Ok(snapshot) = rx.try_recv() {
            self.observe(snapshot);
        }
    }

    fn publish(&self) {
        let snapshot = ProgressSnapshot {
            cleaned_size_bytes: self.freed.bytes,
            cleaned_count: self.freed.paths,
            ..self.latest.clone()
        };
        if self.shared.hub.publish(snapshot.clone()) {
            self.shared
                .lock()
                .negotiator
                .update_progress(self.session_id, &snapshot);
        }
    }
}

/// A confirmation is sent only after `clean_category` returned, so every
/// snapshot the executor sent for that category is already queued; draining
/// before settling keeps the published stream in executor order.
fn forward(
    rx: Receiver<ProgressSnapshot>,
    confirmations: Receiver<Freed>,
    mut relay: Relay,
    stop: &AtomicBool,
    poll: Duration,
) {
    let mut live = true;
    loop {
        if live {
            match rx.recv_timeout(poll) {
                Ok(snapshot) => relay.observe(snapshot),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => live = false,
            }
        } else if let Ok(freed) = confirmations.recv_timeout(poll) {
            relay.settle(freed);
        }

        for freed in confirmations.try_iter() {
            relay.drain(&rx);
            relay.settle(freed);
        }

        if stop.load(Ordering::SeqCst) {
            relay.drain(&rx);
            for freed in confirmations.try_iter() {
                relay.settle(freed);
            }
            break;
        }
    }
}
