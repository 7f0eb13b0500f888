use crate::registration::Registration;
use leakwatch_types::{PendingSubscription, SubscriptionId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Pending subscriptions by id.
///
/// Membership is the only record of "still pending": whoever removes an id
/// first owns its outcome.
#[derive(Default)]
pub(crate) struct Registry {
    entries: Mutex<HashMap<SubscriptionId, Arc<Registration>>>,
}

impl Registry {
    pub(crate) fn insert(&self, registration: Arc<Registration>) {
        self.entries.lock().insert(registration.id(), registration);
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> Option<Arc<Registration>> {
        self.entries.lock().remove(&id)
    }

    pub(crate) fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Snapshot of every pending subscription, oldest id first.
    pub(crate) fn snapshot(&self) -> Vec<PendingSubscription> {
        let now = Instant::now();
        let mut pending: Vec<_> = self
            .entries
            .lock()
            .values()
            .map(|registration| registration.snapshot(now))
            .collect();
        pending.sort_by_key(|entry| entry.id);
        pending
    }
}
