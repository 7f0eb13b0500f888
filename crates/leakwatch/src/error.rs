use crate::origin::Origin;
use leakwatch_types::{InvariantError, SubscriptionId};
use std::error::Error;
use std::fmt;
use std::io;
use std::panic::Location;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Returned by [`Engine::subscribe`](crate::Engine::subscribe) and friends.
#[derive(Debug)]
pub enum SubscribeError {
    /// No unsubscribe operation was supplied.
    MissingUnsubscribe,
    /// The process ran out of subscription ids.
    InvalidId(InvariantError),
}

impl fmt::Display for SubscribeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingUnsubscribe => {
                write!(f, "invalid argument: an unsubscribe operation is required")
            }
            Self::InvalidId(source) => write!(f, "could not allocate subscription id: {source}"),
        }
    }
}

impl Error for SubscribeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidId(source) => Some(source),
            Self::MissingUnsubscribe => None,
        }
    }
}

/// Returned by [`EngineBuilder::build`](crate::EngineBuilder::build).
#[derive(Debug)]
pub enum EngineError {
    SpawnReaper(io::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnReaper(source) => write!(f, "failed to spawn reaper thread: {source}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SpawnReaper(source) => Some(source),
        }
    }
}

/// Diagnostic delivered to the leak callback.
///
/// Describes a subscription whose handle was dropped before `release()` was
/// called. The location and stack point at the `subscribe` call site.
pub struct Leak {
    id: SubscriptionId,
    age: Duration,
    origin: Arc<Origin>,
    stack: OnceLock<Option<String>>,
}

impl Leak {
    pub(crate) fn new(id: SubscriptionId, age: Duration, origin: Arc<Origin>) -> Self {
        Self {
            id,
            age,
            origin,
            stack: OnceLock::new(),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Source location of the `subscribe` call.
    pub fn location(&self) -> &'static Location<'static> {
        self.origin.location()
    }

    /// How long the subscription was pending before the leak was detected.
    pub fn age(&self) -> Duration {
        self.age
    }

    /// The stack captured at subscribe time, caller frame first.
    ///
    /// `None` when the engine was built with backtrace capture disabled.
    /// Symbols are resolved on first call.
    pub fn stack(&self) -> Option<&str> {
        self.stack
            .get_or_init(|| self.origin.render_stack())
            .as_deref()
    }
}

impl fmt::Display for Leak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "subscription {} has not been released (subscribed at {})",
            self.id,
            self.location()
        )
    }
}

impl fmt::Debug for Leak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leak")
            .field("id", &self.id)
            .field("location", &format_args!("{}", self.location()))
            .field("age", &self.age)
            .finish_non_exhaustive()
    }
}

impl Error for Leak {}
