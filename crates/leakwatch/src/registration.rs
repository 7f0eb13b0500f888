//! Per-subscription record tracked by the registry.

use crate::config::LeakHandler;
use crate::error::Leak;
use crate::origin::Origin;
use crate::reclaim::{Anchor, Notifier};
use leakwatch_types::{PendingSubscription, SubscriptionId};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::error;

/// Cleanup supplied by the subscriber.
pub type UnsubscribeFn = Box<dyn FnOnce() + Send + 'static>;

pub(crate) struct Registration {
    id: SubscriptionId,
    handle: Weak<Anchor<Registration>>,
    origin: Arc<Origin>,
    created_at: Instant,
    /// Taken by whichever path wins the registry removal.
    unsubscribe: Mutex<Option<UnsubscribeFn>>,
}

impl Registration {
    /// Builds the registration together with the anchor that stands for it.
    ///
    /// The anchor is bound to `notifier` before anyone else can see it, so its
    /// reclamation always delivers this very registration.
    pub(crate) fn register(
        id: SubscriptionId,
        origin: Origin,
        unsubscribe: UnsubscribeFn,
        notifier: &Notifier<Registration>,
    ) -> (Arc<Registration>, Arc<Anchor<Registration>>) {
        let mut anchor = None;
        let registration = Arc::new_cyclic(|this| {
            let handle = notifier.anchor(this.clone());
            let weak_handle = Arc::downgrade(&handle);
            anchor = Some(handle);
            Registration {
                id,
                handle: weak_handle,
                origin: Arc::new(origin),
                created_at: Instant::now(),
                unsubscribe: Mutex::new(Some(unsubscribe)),
            }
        });
        let anchor =
            anchor.expect("invariant violated: new_cyclic runs its constructor exactly once");
        (registration, anchor)
    }

    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    pub(crate) fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The handle is gone but the reaper has not processed it yet.
    pub(crate) fn is_reclaimed(&self) -> bool {
        self.handle.strong_count() == 0
    }

    /// Runs the unsubscribe operation if it has not run yet.
    pub(crate) fn run_unsubscribe(&self) {
        let op = self.unsubscribe.lock().take();
        if let Some(op) = op {
            op();
        }
    }

    /// Reports the leak, then cleans up.
    ///
    /// Called from the reaper, so panics from either callback are caught and
    /// logged instead of unwinding through the reaper loop.
    pub(crate) fn invoke_leak(&self, on_leak: &LeakHandler) {
        let leak = Leak::new(self.id, self.created_at.elapsed(), Arc::clone(&self.origin));

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| on_leak(leak))) {
            error!(
                id = %self.id,
                panic = panic_message(&*payload),
                "leak callback panicked"
            );
        }

        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.run_unsubscribe())) {
            error!(
                id = %self.id,
                panic = panic_message(&*payload),
                "unsubscribe operation of leaked subscription panicked"
            );
        }
    }

    pub(crate) fn snapshot(&self, now: Instant) -> PendingSubscription {
        PendingSubscription {
            id: self.id,
            age_secs: now.saturating_duration_since(self.created_at).as_secs_f64(),
            location: self.origin.location().to_string(),
            reclaimed: self.is_reclaimed(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}
