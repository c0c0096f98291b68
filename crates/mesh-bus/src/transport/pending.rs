//! Pending reply store.
//!
//! Maps reply inbox ids to waiting requesters. The first reply for an id
//! completes it; later replies for the same id are dropped.

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

/// A requester waiting for its reply
struct PendingReply {
    sender: oneshot::Sender<Bytes>,
    created_at: Instant,
    /// Subject the request was sent to (for logging)
    subject: String,
}

/// Statistics for the pending reply store
#[derive(Debug, Default)]
pub struct PendingStats {
    pub total_registered: AtomicU64,
    pub total_completed: AtomicU64,
    pub total_timeouts: AtomicU64,
    /// Replies that arrived after the requester went away
    pub total_late: AtomicU64,
    /// Requesters that stopped waiting before any reply or timeout
    pub total_cancelled: AtomicU64,
}

/// Flow:
/// 1. Requester calls `register()` to get an inbox id and a receiver
/// 2. The request is delivered with that inbox id attached
/// 3. A responder's reply calls `complete()`
/// 4. Requester awaits the receiver or calls `expire()` on timeout
/// 5. A requester dropped mid-flight calls `cancel()`
#[derive(Default)]
pub struct PendingReplyStore {
    pending: DashMap<Uuid, PendingReply>,
    stats: PendingStats,
}

impl PendingReplyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subject: &str) -> (Uuid, oneshot::Receiver<Bytes>) {
        let inbox = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();

        self.pending.insert(
            inbox,
            PendingReply {
                sender: tx,
                created_at: Instant::now(),
                subject: subject.to_string(),
            },
        );
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(inbox = %inbox, subject = subject, "Registered pending reply");
        (inbox, rx)
    }

    /// Deliver a reply. Returns false if the inbox is unknown or already done.
    pub fn complete(&self, inbox: Uuid, reply: Bytes) -> bool {
        let Some((_, pending)) = self.pending.remove(&inbox) else {
            self.stats.total_late.fetch_add(1, Ordering::Relaxed);
            debug!(inbox = %inbox, "Reply for unknown or completed inbox dropped");
            return false;
        };

        let elapsed = pending.created_at.elapsed();
        if pending.sender.send(reply).is_err() {
            // Receiver was dropped (request cancelled)
            self.stats.total_late.fetch_add(1, Ordering::Relaxed);
            debug!(inbox = %inbox, subject = pending.subject, "Requester went away before reply");
            return false;
        }

        self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
        debug!(
            inbox = %inbox,
            subject = pending.subject,
            response_time_ms = elapsed.as_millis(),
            "Completed pending reply"
        );
        true
    }

    /// Forget an inbox whose requester timed out.
    pub fn expire(&self, inbox: Uuid, timeout: Duration) {
        if let Some((_, pending)) = self.pending.remove(&inbox) {
            self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
            warn!(
                inbox = %inbox,
                subject = pending.subject,
                timeout_ms = timeout.as_millis(),
                "Request timed out waiting for a reply"
            );
        }
    }

    /// Forget an inbox whose requester went away. No-op once completed or
    /// expired.
    pub fn cancel(&self, inbox: Uuid) -> bool {
        let Some((_, pending)) = self.pending.remove(&inbox) else {
            return false;
        };
        self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
        debug!(inbox = %inbox, subject = pending.subject, "Requester stopped waiting");
        true
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, inbox: &Uuid) -> bool {
        self.pending.contains_key(inbox)
    }

    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}
