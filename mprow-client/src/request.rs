//! Pending-request tracking
//!
//! One record per in-flight request, keyed by id. Each record holds a
//! oneshot sender for the caller's future, the send instant for the
//! round-trip metric, and the abort handle of its timeout timer task.
//!
//! # Lifecycle
//!
//! 1. **Register**: insert the record and hand the receiver to the caller.
//!    A duplicate id is rejected rather than silently replacing a record.
//! 2. **Arm**: after the frame is on the wire, spawn the timeout timer.
//! 3. **Complete**: exactly one of three paths removes the record and fires
//!    the sender: a matched response, the timer, or a connection-closed
//!    purge. Whichever runs first wins; the others find no record and do
//!    nothing.
//!
//! Responses arrive out of order, so each request gets its own oneshot
//! channel; cleanup of the losing side is automatic when the sender drops.

use crate::stats::ClientStats;
use mprow_core::{Error, Id, Result, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};
use tokio::task::AbortHandle;

struct PendingRequest {
    tx: oneshot::Sender<Result<Value>>,
    sent_at: Instant,
    timer: Option<AbortHandle>,
}

/// Table of in-flight requests.
#[derive(Clone, Default)]
pub(crate) struct RequestTracker {
    inner: Arc<Mutex<HashMap<Id, PendingRequest>>>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record for `id` and return the completion receiver.
    pub async fn register(&self, id: Id) -> Result<oneshot::Receiver<Result<Value>>> {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.inner.lock().await;
        if pending.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }
        pending.insert(
            id,
            PendingRequest {
                tx,
                sent_at: Instant::now(),
                timer: None,
            },
        );
        Ok(rx)
    }

    /// Start the timeout timer for `id`. If the record is already gone the
    /// timer is discarded immediately.
    pub async fn arm_timeout(&self, id: &Id, timeout: Duration, stats: ClientStats) {
        let tracker = self.clone();
        let timed_out_id = id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if tracker.complete_failure(&timed_out_id, Error::Timeout).await {
                stats.record_timeout();
                tracing::debug!(id = %timed_out_id, "request timed out");
            }
        });
        let mut pending = self.inner.lock().await;
        match pending.get_mut(id) {
            Some(record) => record.timer = Some(task.abort_handle()),
            None => task.abort(),
        }
    }

    /// Resolve `id` with a successful result. Returns the round-trip time
    /// when a record was actually completed.
    pub async fn complete_success(&self, id: &Id, value: Value) -> Option<Duration> {
        let record = self.inner.lock().await.remove(id)?;
        if let Some(timer) = record.timer {
            timer.abort();
        }
        let rtt = record.sent_at.elapsed();
        let _ = record.tx.send(Ok(value));
        Some(rtt)
    }

    /// Fail `id`. Returns whether a record was present to fail.
    pub async fn complete_failure(&self, id: &Id, error: Error) -> bool {
        match self.inner.lock().await.remove(id) {
            Some(record) => {
                if let Some(timer) = record.timer {
                    timer.abort();
                }
                let _ = record.tx.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Drop a record without completing it (used when the send itself
    /// failed and the caller already has the error in hand).
    pub async fn discard(&self, id: &Id) {
        if let Some(record) = self.inner.lock().await.remove(id) {
            if let Some(timer) = record.timer {
                timer.abort();
            }
        }
    }

    /// Fail every record, releasing all timers.
    pub async fn fail_all(&self, error: Error) {
        let mut pending = self.inner.lock().await;
        for (_, record) in pending.drain() {
            if let Some(timer) = record.timer {
                timer.abort();
            }
            let _ = record.tx.send(Err(error.clone()));
        }
    }

    /// Whether a record exists for `id`.
    #[allow(dead_code)]
    pub async fn contains(&self, id: &Id) -> bool {
        self.inner.lock().await.contains_key(id)
    }

    /// Number of in-flight requests.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
