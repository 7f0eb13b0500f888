//! Leak detection for subscriptions that must be explicitly released.
//!
//! A caller registers a cleanup operation with [`Engine::subscribe`] and gets
//! back a [`Subscription`]. Calling [`Subscription::release`] runs the cleanup
//! and ends tracking. Dropping every clone of the subscription without
//! releasing it is a leak: a background reaper notices, hands a [`Leak`]
//! describing the `subscribe` call site to the engine's leak callback, and
//! runs the cleanup anyway.
//!
//! ```rust,no_run
//! let engine = leakwatch::Engine::new(|leak| eprintln!("{leak}"))?;
//!
//! let subscription = engine.subscribe(|| println!("unsubscribed"))?;
//! // ... later
//! subscription.release();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # How leaks are observed
//!
//! Each subscription owns an engine-allocated handle held only through
//! `Arc`s inside the [`Subscription`] and its clones. When the last one is
//! dropped the handle's destructor pushes the pending registration onto a
//! reclaim queue. The reaper drains that queue and, for each registration
//! still present in the registry, reports the leak. `release()` and the
//! reaper both go through registry removal, so a subscription is either
//! released or reported, never both.
//!
//! # Configuration
//!
//! | Setting | Default |
//! |---------|---------|
//! | leak callback | [`log_leak`], logs through `tracing` |
//! | backtrace capture | on, unless `LEAKWATCH_BACKTRACE=0` |
//! | reaper | detached thread named `leakwatch-reaper` |
//!
//! See [`EngineBuilder`].

mod config;
mod engine;
mod error;
mod origin;
mod reaper;
mod reclaim;
mod registration;
mod registry;

pub use config::{
    BACKTRACE_ENV, DEFAULT_REAPER_THREAD_NAME, EngineConfig, LeakHandler, ReaperRuntime, log_leak,
};
pub use engine::{Engine, EngineBuilder, Subscription};
pub use error::{EngineError, Leak, SubscribeError};
pub use leakwatch_types::{EngineStats, InvariantError, PendingSubscription, SubscriptionId};
pub use registration::UnsubscribeFn;
