use crate::config::{EngineConfig, LeakHandler, ReaperRuntime};
use crate::error::{EngineError, Leak, SubscribeError};
use crate::origin::Origin;
use crate::reaper;
use crate::reclaim::{Anchor, Notifier, reclaim_queue};
use crate::registration::{Registration, UnsubscribeFn};
use crate::registry::Registry;
use leakwatch_types::{EngineStats, PendingSubscription, SubscriptionId};
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// State shared between engine clones, live subscriptions and the reaper.
pub(crate) struct Shared {
    pub(crate) registry: Registry,
    pub(crate) on_leak: LeakHandler,
    pub(crate) subscribed: AtomicU64,
    pub(crate) released: AtomicU64,
    pub(crate) leaked: AtomicU64,
}

/// Tracks subscriptions and reports the ones dropped without `release()`.
///
/// Cloning is cheap; all clones share one registry and one reaper. The reaper
/// stops on its own once every clone and every outstanding [`Subscription`]
/// is gone.
#[derive(Clone)]
pub struct Engine {
    shared: Arc<Shared>,
    notifier: Notifier<Registration>,
    capture_backtraces: bool,
}

impl Engine {
    /// Builds an engine that hands every leak to `on_leak`.
    pub fn new(on_leak: impl Fn(Leak) + Send + Sync + 'static) -> Result<Self, EngineError> {
        Self::builder().on_leak(on_leak).build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn from_config(config: EngineConfig) -> Result<Self, EngineError> {
        let EngineConfig {
            on_leak,
            capture_backtraces,
            reaper: runtime,
        } = config;

        let shared = Arc::new(Shared {
            registry: Registry::default(),
            on_leak,
            subscribed: AtomicU64::new(0),
            released: AtomicU64::new(0),
            leaked: AtomicU64::new(0),
        });
        let (notifier, queue) = reclaim_queue();

        // The queue has to exist before the reaper starts consuming it.
        reaper::spawn(&runtime, Arc::clone(&shared), queue).map_err(EngineError::SpawnReaper)?;
        debug!(capture_backtraces, reaper = ?runtime, "leak tracking engine started");

        Ok(Self {
            shared,
            notifier,
            capture_backtraces,
        })
    }

    /// Registers `unsubscribe` and returns the capability that releases it.
    ///
    /// If the returned [`Subscription`] (and every clone of it) is dropped
    /// before [`Subscription::release`] is called, the leak callback receives a
    /// [`Leak`] pointing at this call site and `unsubscribe` runs anyway.
    #[track_caller]
    pub fn subscribe<F>(&self, unsubscribe: F) -> Result<Subscription, SubscribeError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.subscribe_boxed(Some(Box::new(unsubscribe)))
    }

    /// Type-erased [`Engine::subscribe`] for callers whose operation may be
    /// absent. `None` is rejected before any state changes.
    #[track_caller]
    pub fn subscribe_boxed(
        &self,
        unsubscribe: Option<UnsubscribeFn>,
    ) -> Result<Subscription, SubscribeError> {
        let Some(unsubscribe) = unsubscribe else {
            return Err(SubscribeError::MissingUnsubscribe);
        };

        let id = SubscriptionId::next_process_local().map_err(SubscribeError::InvalidId)?;
        let origin = Origin::capture(self.capture_backtraces);
        let location = origin.location();

        let (registration, anchor) =
            Registration::register(id, origin, unsubscribe, &self.notifier);
        self.shared.registry.insert(registration);
        self.shared.subscribed.fetch_add(1, Ordering::Relaxed);
        debug!(%id, %location, "subscribed");

        Ok(Subscription {
            id,
            location,
            shared: Arc::clone(&self.shared),
            _anchor: anchor,
        })
    }

    pub fn pending_count(&self) -> usize {
        self.shared.registry.len()
    }

    pub fn pending(&self) -> Vec<PendingSubscription> {
        self.shared.registry.snapshot()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            subscribed: self.shared.subscribed.load(Ordering::Relaxed),
            released: self.shared.released.load(Ordering::Relaxed),
            leaked: self.shared.leaked.load(Ordering::Relaxed),
            pending: self.shared.registry.len() as u64,
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("pending", &self.pending_count())
            .field("capture_backtraces", &self.capture_backtraces)
            .finish()
    }
}

/// Builder for [`Engine`]. Starts from [`EngineConfig::from_env`].
#[derive(Debug, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn on_leak(mut self, on_leak: impl Fn(Leak) + Send + Sync + 'static) -> Self {
        self.config.on_leak = Arc::new(on_leak);
        self
    }

    /// Overrides the `LEAKWATCH_BACKTRACE` setting.
    pub fn capture_backtraces(mut self, enabled: bool) -> Self {
        self.config.capture_backtraces = enabled;
        self
    }

    pub fn reaper_thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.reaper = ReaperRuntime::Thread { name: name.into() };
        self
    }

    /// Runs the reaper as a task on `handle` instead of a dedicated thread.
    pub fn spawn_on(mut self, handle: tokio::runtime::Handle) -> Self {
        self.config.reaper = ReaperRuntime::Tokio(handle);
        self
    }

    pub fn build(self) -> Result<Engine, EngineError> {
        Engine::from_config(self.config)
    }
}

/// Release capability returned by [`Engine::subscribe`].
///
/// This value is the only strong owner of the subscription's handle. Clones
/// share the handle; the subscription counts as leaked when the last clone is
/// dropped while still pending.
#[derive(Clone)]
#[must_use = "dropping a Subscription without calling release() reports it as leaked"]
pub struct Subscription {
    id: SubscriptionId,
    location: &'static Location<'static>,
    shared: Arc<Shared>,
    _anchor: Arc<Anchor<Registration>>,
}

impl Subscription {
    /// Runs the unsubscribe operation and stops tracking this subscription.
    ///
    /// Idempotent across calls and clones: only the first call does anything.
    pub fn release(&self) {
        let Some(registration) = self.shared.registry.remove(self.id) else {
            return;
        };
        self.shared.released.fetch_add(1, Ordering::Relaxed);
        debug!(id = %self.id, "subscription released");
        registration.run_unsubscribe();
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Source location of the `subscribe` call.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub fn is_pending(&self) -> bool {
        self.shared.registry.contains(self.id)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("location", &format_args!("{}", self.location))
            .field("pending", &self.is_pending())
            .finish()
    }
}
