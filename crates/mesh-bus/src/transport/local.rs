//! In-process reference transport.
//!
//! A [`LocalNetwork`] is a shared hub; each [`LocalTransport`] is one client
//! connection to it. Delivery semantics follow a queue-group pub/sub system:
//!
//! - every matching notification group receives a published message once,
//!   through one randomly chosen member
//! - a request goes to one random subscription among all matching request
//!   subscriptions, whatever their group
//! - a request nobody answers waits out its timeout
//! - a requester that goes away releases its reply inbox

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use mesh_types::BrokerError;

use super::pending::PendingReplyStore;
use super::{DeliveryCallback, Transport, TransportOptions};
use crate::pattern::matches;
use crate::registry::{pick_one, pick_per_group, RegistrationKind};

struct LocalSubscription {
    connection: u64,
    kind: RegistrationKind,
    pattern: String,
    group: String,
    callback: DeliveryCallback,
}

/// Shared in-process hub.
pub struct LocalNetwork {
    subscriptions: RwLock<Vec<LocalSubscription>>,
    pending: PendingReplyStore,
    next_connection: AtomicU64,
    published: AtomicU64,
}

impl LocalNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            subscriptions: RwLock::new(Vec::new()),
            pending: PendingReplyStore::new(),
            next_connection: AtomicU64::new(1),
            published: AtomicU64::new(0),
        })
    }

    /// A new, not yet connected, client of this hub.
    pub fn transport(self: &Arc<Self>) -> LocalTransport {
        LocalTransport {
            network: Arc::clone(self),
            connection: self.next_connection.fetch_add(1, Ordering::Relaxed),
            connected: AtomicBool::new(false),
            client_name: RwLock::new(None),
        }
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Messages published or requested through the hub.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> &PendingReplyStore {
        &self.pending
    }

    fn add_subscription(&self, subscription: LocalSubscription) {
        self.subscriptions.write().push(subscription);
    }

    fn remove_connection(&self, connection: u64) -> usize {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.connection != connection);
        before - subscriptions.len()
    }

    /// One callback for a request, one per matching group for a notification.
    fn route(&self, kind: RegistrationKind, subject: &str) -> Vec<DeliveryCallback> {
        let matching: Vec<(String, DeliveryCallback)> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.kind == kind && matches(&s.pattern, subject))
            .map(|s| (s.group.clone(), Arc::clone(&s.callback)))
            .collect();

        match kind {
            RegistrationKind::Request => pick_one(&matching)
                .map(|(_, callback)| Arc::clone(callback))
                .into_iter()
                .collect(),
            RegistrationKind::Notification => pick_per_group(matching, |(group, _)| group.as_str())
                .into_iter()
                .map(|(_, callback)| callback)
                .collect(),
        }
    }

    /// Hand `payload` to every routed callback on its own task. With
    /// `reply_to` set the message is a request and the reply goes there.
    /// Returns the number of deliveries.
    fn deliver(self: &Arc<Self>, subject: &str, payload: Bytes, reply_to: Option<Uuid>) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let kind = match reply_to {
            Some(_) => RegistrationKind::Request,
            None => RegistrationKind::Notification,
        };
        let targets = self.route(kind, subject);
        let delivered = targets.len();

        for callback in targets {
            let network = Arc::clone(self);
            let payload = payload.clone();
            let subject = subject.to_string();
            tokio::spawn(async move {
                let reply = callback(payload, subject).await;
                if let (Some(inbox), Some(reply)) = (reply_to, reply) {
                    network.pending.complete(inbox, reply);
                }
            });
        }

        debug!(subject = subject, deliveries = delivered, "Delivered message");
        delivered
    }
}

/// Releases a reply inbox when its requester stops waiting, whether it
/// got a reply, timed out or was dropped mid-flight.
struct InboxGuard<'a> {
    store: &'a PendingReplyStore,
    inbox: Uuid,
}

impl Drop for InboxGuard<'_> {
    fn drop(&mut self) {
        self.store.cancel(self.inbox);
    }
}

/// One client connection to a [`LocalNetwork`].
pub struct LocalTransport {
    network: Arc<LocalNetwork>,
    connection: u64,
    connected: AtomicBool,
    client_name: RwLock<Option<String>>,
}

impl LocalTransport {
    pub fn network(&self) -> &Arc<LocalNetwork> {
        &self.network
    }

    pub fn client_name(&self) -> Option<String> {
        self.client_name.read().clone()
    }

    fn ensure_connected(&self) -> Result<(), BrokerError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(BrokerError::Transport("not connected".to_string()))
        }
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn connect(&self, options: &TransportOptions) -> Result<(), BrokerError> {
        if self.connected.swap(true, Ordering::SeqCst) {
            return Err(BrokerError::Transport("already connected".to_string()));
        }
        *self.client_name.write() = Some(options.client_name.clone());
        info!(
            client = %options.client_name,
            connection = self.connection,
            "Connected to local network"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Err(BrokerError::Transport("not connected".to_string()));
        }
        let removed = self.network.remove_connection(self.connection);
        info!(
            connection = self.connection,
            subscriptions = removed,
            "Closed local network connection"
        );
        Ok(())
    }

    fn subscribe(
        &self,
        kind: RegistrationKind,
        pattern: &str,
        group: &str,
        callback: DeliveryCallback,
    ) -> Result<(), BrokerError> {
        self.ensure_connected()?;
        self.network.add_subscription(LocalSubscription {
            connection: self.connection,
            kind,
            pattern: pattern.to_string(),
            group: group.to_string(),
            callback,
        });
        debug!(kind = ?kind, pattern = pattern, group = group, "Subscribed");
        Ok(())
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BrokerError> {
        self.ensure_connected()?;
        self.network.deliver(subject, payload, None);
        Ok(())
    }

    async fn request_once(&self, subject: &str, payload: Bytes, timeout: Duration) -> Result<Bytes, BrokerError> {
        self.ensure_connected()?;

        let (inbox, rx) = self.network.pending.register(subject);
        let _guard = InboxGuard {
            store: &self.network.pending,
            inbox,
        };
        if self.network.deliver(subject, payload, Some(inbox)) == 0 {
            debug!(subject = subject, "No subscribers for request");
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(BrokerError::Transport("reply channel closed".to_string())),
            Err(_) => {
                self.network.pending.expire(inbox, timeout);
                Err(BrokerError::Timeout {
                    topic: subject.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
