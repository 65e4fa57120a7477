//! Events published to observers: per-category scan updates and the
//! batch-wide progress stream of an elevated clean.

use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tracing::warn;

use crate::state::CategoryRunState;

/// A category reached a terminal scan status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanUpdate {
    pub category_id: String,
    pub state: CategoryRunState,
}

/// Cumulative counters of an elevated run.
///
/// Every counter is non-decreasing within one session; `current_path` is a
/// point-in-time cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub processed_paths: u64,
    pub total_paths: u64,
    #[serde(rename = "cleanedSize")]
    pub cleaned_size_bytes: u64,
    pub cleaned_count: u64,
    #[serde(default)]
    pub current_path: String,
}

impl ProgressSnapshot {
    /// True if any cumulative counter went backwards relative to `previous`.
    pub fn regresses_from(&self, previous: &ProgressSnapshot) -> bool {
        self.processed_paths < previous.processed_paths
            || self.cleaned_size_bytes < previous.cleaned_size_bytes
            || self.cleaned_count < previous.cleaned_count
    }

    pub fn fraction(&self) -> f64 {
        if self.total_paths == 0 {
            return 0.0;
        }
        (self.processed_paths as f64 / self.total_paths as f64).min(1.0)
    }
}

#[derive(Debug, Default)]
struct HubInner {
    next_id: u64,
    subscribers: Vec<(u64, Sender<ProgressSnapshot>)>,
    latest: Option<ProgressSnapshot>,
}

/// Fan-out of progress snapshots to any number of observers.
#[derive(Debug, Default)]
pub struct ProgressHub {
    inner: Mutex<HubInner>,
}

impl ProgressHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(self: &Arc<Self>) -> ProgressSubscription {
        let (tx, rx) = mpsc::channel();
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.push((id, tx));
        ProgressSubscription {
            id,
            hub: Arc::downgrade(self),
            rx,
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.lock().subscribers.retain(|(sid, _)| *sid != id);
    }

    /// Deliver a snapshot to every subscriber, in arrival order.
    ///
    /// Snapshots that would move a counter backwards are dropped so observers
    /// only ever see monotonic progress. Returns whether it was delivered.
    pub fn publish(&self, snapshot: ProgressSnapshot) -> bool {
        let mut inner = self.lock();
        if let Some(previous) = &inner.latest {
            if snapshot.regresses_from(previous) {
                warn!(
                    processed = snapshot.processed_paths,
                    previous = previous.processed_paths,
                    "dropping out-of-order progress snapshot"
                );
                return false;
            }
        }
        inner
            .subscribers
            .retain(|(_, tx)| tx.send(snapshot.clone()).is_ok());
        inner.latest = Some(snapshot);
        true
    }

    /// Forget the last snapshot; called when a new session starts.
    pub fn reset(&self) {
        self.lock().latest = None;
    }

    pub fn latest(&self) -> Option<ProgressSnapshot> {
        self.lock().latest.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

/// Receiving end of a hub subscription; unsubscribes when dropped.
#[derive(Debug)]
pub struct ProgressSubscription {
    id: u64,
    hub: Weak<ProgressHub>,
    rx: Receiver<ProgressSnapshot>,
}

impl ProgressSubscription {
    pub fn try_recv(&self) -> Option<ProgressSnapshot> {
        match self.rx.try_recv() {
            Ok(snapshot) => Some(snapshot),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<ProgressSnapshot> {
        match self.rx.recv_timeout(timeout) {
            Ok(snapshot) => Some(snapshot),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything already queued, without blocking.
    pub fn drain(&self) -> Vec<ProgressSnapshot> {
        self.rx.try_iter().collect()
    }
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(processed: u64, cleaned: u64) -> ProgressSnapshot {
        ProgressSnapshot {
            processed_paths: processed,
            total_paths: 10,
            cleaned_size_bytes: cleaned,
            cleaned_count: processed,
            current_path: format!("C:\\path{}", processed),
        }
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let hub = ProgressHub::new();
        let a = hub.subscribe();
        let b = hub.subscribe();

        assert!(hub.publish(snap(1, 100)));
        assert!(hub.publish(snap(2, 200)));

        assert_eq!(a.drain(), vec![snap(1, 100), snap(2, 200)]);
        assert_eq!(b.drain(), vec![snap(1, 100), snap(2, 200)]);
    }

    #[test]
    fn test_regressing_snapshot_is_dropped() {
        let hub = ProgressHub::new();
        let sub = hub.subscribe();

        assert!(hub.publish(snap(3, 300)));
        assert!(!hub.publish(snap(2, 400)));
        assert!(hub.publish(snap(3, 300)));

        let seen: Vec<u64> = sub.drain().iter().map(|s| s.processed_paths).collect();
        assert_eq!(seen, vec![3, 3]);
    }

    #[test]
    fn test_reset_allows_new_session_to_start_from_zero() {
        let hub = ProgressHub::new();
        hub.publish(snap(5, 500));
        hub.reset();
        assert!(hub.latest().is_none());
        assert!(hub.publish(snap(0, 0)));
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let hub = ProgressHub::new();
        let sub = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_snapshot_wire_names() {
        let json = serde_json::to_value(snap(1, 42)).unwrap();
        assert_eq!(json["processedPaths"], 1);
        assert_eq!(json["cleanedSize"], 42);
        assert_eq!(json["currentPath"], "C:\\path1");
    }

    #[test]
    fn test_fraction() {
        assert_eq!(snap(5, 0).fraction(), 0.5);
        assert_eq!(ProgressSnapshot::default().fraction(), 0.0);
    }
}
