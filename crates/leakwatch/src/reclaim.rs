//! Reachability notifications for engine-allocated handles.
//!
//! An [`Anchor`] plays the part of a collectable referent. It is kept alive
//! by strong `Arc` references only, and when the last one goes away its
//! destructor pushes the associated companion onto a [`ReclaimQueue`].
//!
//! The anchor holds its companion weakly. A companion nobody else owns any
//! more (its subscription was already released) is not delivered, which is
//! the equivalent of clearing a weak reference before it gets enqueued.

use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Creates a reclaim queue and the notifier anchors use to feed it.
///
/// The queue reports closure once the notifier and every anchor created from
/// it have been dropped.
pub(crate) fn reclaim_queue<T>() -> (Notifier<T>, ReclaimQueue<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Notifier { tx }, ReclaimQueue { rx })
}

/// Producer side: mints anchors bound to one queue.
pub(crate) struct Notifier<T> {
    tx: mpsc::UnboundedSender<Arc<T>>,
}

impl<T> Clone for Notifier<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> Notifier<T> {
    /// Allocates an anchor that enqueues `companion` when it is reclaimed.
    pub(crate) fn anchor(&self, companion: Weak<T>) -> Arc<Anchor<T>> {
        Arc::new(Anchor {
            companion,
            tx: self.tx.clone(),
        })
    }
}

/// Opaque handle whose reclamation is observed.
pub(crate) struct Anchor<T> {
    companion: Weak<T>,
    tx: mpsc::UnboundedSender<Arc<T>>,
}

impl<T> Drop for Anchor<T> {
    fn drop(&mut self) {
        if let Some(companion) = self.companion.upgrade() {
            // Only fails once the consumer is gone, and then nobody is left
            // to care about the notification.
            let _ = self.tx.send(companion);
        }
    }
}

/// Consumer side: yields companions whose anchors were reclaimed.
pub(crate) struct ReclaimQueue<T> {
    rx: mpsc::UnboundedReceiver<Arc<T>>,
}

impl<T> ReclaimQueue<T> {
    /// Blocks the current thread until a companion is available.
    ///
    /// Returns `None` once every producer is gone. Must not be called from
    /// inside an async runtime.
    pub(crate) fn remove_blocking(&mut self) -> Option<Arc<T>> {
        self.rx.blocking_recv()
    }

    /// Async counterpart of [`ReclaimQueue::remove_blocking`].
    pub(crate) async fn remove(&mut self) -> Option<Arc<T>> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_last_anchor_enqueues_companion() {
        let (notifier, mut queue) = reclaim_queue::<u32>();
        let companion = Arc::new(7);
        let anchor = notifier.anchor(Arc::downgrade(&companion));
        let second = Arc::clone(&anchor);

        drop(anchor);
        assert!(queue.rx.try_recv().is_err(), "one strong ref is still alive");

        drop(second);
        let delivered = queue.rx.try_recv().expect("companion should be queued");
        assert!(Arc::ptr_eq(&delivered, &companion));
    }

    #[test]
    fn released_companion_is_not_enqueued() {
        let (notifier, mut queue) = reclaim_queue::<u32>();
        let companion = Arc::new(7);
        let anchor = notifier.anchor(Arc::downgrade(&companion));

        drop(companion);
        drop(anchor);

        assert!(queue.rx.try_recv().is_err());
    }

    #[test]
    fn queue_closes_after_all_producers_are_gone() {
        let (notifier, mut queue) = reclaim_queue::<u32>();
        let companion = Arc::new(1);
        let anchor = notifier.anchor(Arc::downgrade(&companion));
        drop(notifier);

        drop(anchor);
        assert!(queue.remove_blocking().is_some());
        assert!(queue.remove_blocking().is_none());
    }
}
