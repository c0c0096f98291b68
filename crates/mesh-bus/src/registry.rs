//! Handler registry and selection.
//!
//! Registrations are append-only. Dispatch works on a snapshot so the lock
//! is never held while a handler runs.

use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;
use uuid::Uuid;

use mesh_types::{Payload, SharedHandler};

use crate::pattern::{matches, validate_pattern};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationKind {
    Request,
    Notification,
}

/// One handler bound to a pattern.
pub struct Registration<P> {
    pub kind: RegistrationKind,
    pub pattern: String,
    /// Members of a group compete; each group sees a message once.
    pub group: String,
    pub handler: SharedHandler<P>,
}

impl<P> Clone for Registration<P> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            pattern: self.pattern.clone(),
            group: self.group.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<P> fmt::Debug for Registration<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("kind", &self.kind)
            .field("pattern", &self.pattern)
            .field("group", &self.group)
            .finish_non_exhaustive()
    }
}

struct RegistryState<P> {
    entries: Vec<Registration<P>>,
    active: bool,
}

/// Append-only set of registrations.
///
/// The `active` flag lets a transport-backed broker decide, under the same
/// lock as the append, whether a new registration must be subscribed now or
/// will be picked up by the next activation.
pub struct HandlerRegistry<P> {
    state: RwLock<RegistryState<P>>,
}

impl<P: Payload> HandlerRegistry<P> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState {
                entries: Vec::new(),
                active: false,
            }),
        }
    }

    /// Competing request handler; its group is the pattern itself.
    pub fn add_request(&self, pattern: &str, handler: SharedHandler<P>) -> (Registration<P>, bool) {
        self.add(Registration {
            kind: RegistrationKind::Request,
            pattern: pattern.to_string(),
            group: pattern.to_string(),
            handler,
        })
    }

    /// Notification handler. Without a group it gets a fresh one of its own.
    pub fn add_notification(
        &self,
        pattern: &str,
        group: Option<&str>,
        handler: SharedHandler<P>,
    ) -> (Registration<P>, bool) {
        let group = match group {
            Some(group) => group.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        self.add(Registration {
            kind: RegistrationKind::Notification,
            pattern: pattern.to_string(),
            group,
            handler,
        })
    }

    /// Returns the stored registration and whether the registry was active.
    fn add(&self, registration: Registration<P>) -> (Registration<P>, bool) {
        if let Err(e) = validate_pattern(&registration.pattern) {
            warn!(pattern = %registration.pattern, error = %e, "Registering malformed pattern");
        }
        let mut state = self.state.write();
        state.entries.push(registration.clone());
        (registration, state.active)
    }

    /// Mark active and return every registration made so far.
    pub fn activate(&self) -> Vec<Registration<P>> {
        let mut state = self.state.write();
        state.active = true;
        state.entries.clone()
    }

    pub fn deactivate(&self) {
        self.state.write().active = false;
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of registrations of `kind` whose pattern accepts `topic`.
    pub fn matching(&self, kind: RegistrationKind, topic: &str) -> Vec<Registration<P>> {
        self.state
            .read()
            .entries
            .iter()
            .filter(|r| r.kind == kind && matches(&r.pattern, topic))
            .cloned()
            .collect()
    }

    /// One uniformly random request handler for `topic`.
    pub fn select_request(&self, topic: &str) -> Option<SharedHandler<P>> {
        let candidates = self.matching(RegistrationKind::Request, topic);
        pick_one(&candidates).map(|r| r.handler.clone())
    }

    /// One random notification handler per group for `topic`.
    pub fn select_notification_targets(&self, topic: &str) -> Vec<SharedHandler<P>> {
        pick_per_group(self.matching(RegistrationKind::Notification, topic), |r| {
            r.group.as_str()
        })
        .into_iter()
        .map(|r| r.handler)
        .collect()
    }
}

impl<P: Payload> Default for HandlerRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Uniform random choice.
pub fn pick_one<T>(items: &[T]) -> Option<&T> {
    items.choose(&mut rand::thread_rng())
}

/// Partition `items` by group and pick one random member of each.
pub fn pick_per_group<T, F>(items: Vec<T>, group_of: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut groups: HashMap<String, Vec<T>> = HashMap::new();
    for item in items {
        groups.entry(group_of(&item).to_string()).or_default().push(item);
    }

    let mut rng = rand::thread_rng();
    groups
        .into_values()
        .filter_map(|mut members| {
            members.shuffle(&mut rng);
            members.pop()
        })
        .collect()
}
