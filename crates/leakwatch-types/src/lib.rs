//! Identifier and snapshot types for leakwatch.
//!
//! Everything here derives [`Facet`] so a host process can serialize engine
//! state (for example with `facet-json`) without depending on the engine crate.

use facet::Facet;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantError {
    ZeroId(&'static str),
    IdOutOfRange {
        field: &'static str,
        max: u64,
        got: u64,
    },
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroId(field) => write!(f, "{field} must be non-zero"),
            Self::IdOutOfRange { field, max, got } => {
                write!(f, "{field} must be <= {max}, got {got}")
            }
        }
    }
}

impl Error for InvariantError {}

/// Largest id that survives a round-trip through a JSON number.
pub const JS_SAFE_INT_MAX_U64: u64 = (1u64 << 53) - 1;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique subscription identifier.
///
/// Ids come from a single monotonic counter and are never handed out twice
/// while the process lives.
#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[facet(transparent)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    const FIELD: &'static str = "subscription_id";

    pub fn from_raw(value: u64) -> Result<Self, InvariantError> {
        if value == 0 {
            return Err(InvariantError::ZeroId(Self::FIELD));
        }
        if value > JS_SAFE_INT_MAX_U64 {
            return Err(InvariantError::IdOutOfRange {
                field: Self::FIELD,
                max: JS_SAFE_INT_MAX_U64,
                got: value,
            });
        }
        Ok(Self(value))
    }

    /// Allocates the next id from the process-wide counter.
    ///
    /// Once the counter passes [`JS_SAFE_INT_MAX_U64`] every call fails; the
    /// counter is never rewound, so an exhausted id space stays exhausted.
    pub fn next_process_local() -> Result<Self, InvariantError> {
        let raw = NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed);
        Self::from_raw(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// A subscription that has neither been released nor reported as leaked.
#[derive(Facet, Debug, Clone, PartialEq)]
pub struct PendingSubscription {
    pub id: SubscriptionId,
    /// Seconds since `subscribe` returned.
    pub age_secs: f64,
    /// `file:line:column` of the subscribe call site.
    pub location: String,
    /// The handle is already gone and the reaper has not processed it yet.
    pub reclaimed: bool,
}

/// Lifetime counters for one engine.
#[derive(Facet, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub subscribed: u64,
    pub released: u64,
    pub leaked: u64,
    pub pending: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_id_rejects_zero() {
        let err = SubscriptionId::from_raw(0).expect_err("zero id must fail");
        assert!(matches!(err, InvariantError::ZeroId("subscription_id")));
    }

    #[test]
    fn subscription_id_rejects_values_above_js_safe_max() {
        let err = SubscriptionId::from_raw(JS_SAFE_INT_MAX_U64 + 1)
            .expect_err("id must be JS-safe");
        assert!(matches!(
            err,
            InvariantError::IdOutOfRange {
                field: "subscription_id",
                max: JS_SAFE_INT_MAX_U64,
                got
            } if got > JS_SAFE_INT_MAX_U64
        ));
    }

    #[test]
    fn process_local_ids_are_unique_and_increasing() {
        let a = SubscriptionId::next_process_local().expect("first id");
        let b = SubscriptionId::next_process_local().expect("second id");
        assert!(b > a);
    }

    #[test]
    fn subscription_id_displays_with_prefix() {
        let id = SubscriptionId::from_raw(42).expect("42 is valid");
        assert_eq!(id.to_string(), "sub#42");
    }

    #[test]
    fn stats_serialize_to_json() {
        let stats = EngineStats {
            subscribed: 3,
            released: 1,
            leaked: 1,
            pending: 1,
        };
        let json = facet_json::to_string(&stats).expect("stats serialize");
        assert!(json.contains("\"leaked\":1"), "unexpected json: {json}");
    }
}
