//! Engine configuration.

use crate::error::Leak;
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// Environment variable that toggles subscribe-time backtrace capture.
///
/// `0`, `false`, `off` and `no` disable capture; anything else, or leaving it
/// unset, enables it.
pub const BACKTRACE_ENV: &str = "LEAKWATCH_BACKTRACE";

pub const DEFAULT_REAPER_THREAD_NAME: &str = "leakwatch-reaper";

/// Callback invoked once for every leaked subscription.
pub type LeakHandler = Arc<dyn Fn(Leak) + Send + Sync + 'static>;

/// Where the reaper loop runs.
#[derive(Debug, Clone)]
pub enum ReaperRuntime {
    /// A detached OS thread. It never keeps the process alive.
    Thread { name: String },
    /// A task on an existing tokio runtime. Leaks stop being reported once
    /// that runtime shuts down.
    Tokio(tokio::runtime::Handle),
}

impl Default for ReaperRuntime {
    fn default() -> Self {
        Self::Thread {
            name: DEFAULT_REAPER_THREAD_NAME.to_owned(),
        }
    }
}

pub struct EngineConfig {
    pub(crate) on_leak: LeakHandler,
    pub(crate) capture_backtraces: bool,
    pub(crate) reaper: ReaperRuntime,
}

impl EngineConfig {
    /// Defaults, with backtrace capture read from [`BACKTRACE_ENV`].
    pub fn from_env() -> Self {
        Self {
            on_leak: Arc::new(log_leak),
            capture_backtraces: parse_toggle(std::env::var(BACKTRACE_ENV).ok().as_deref()),
            reaper: ReaperRuntime::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("capture_backtraces", &self.capture_backtraces)
            .field("reaper", &self.reaper)
            .finish_non_exhaustive()
    }
}

/// Default leak callback: logs the leak and its subscribe-time stack.
pub fn log_leak(leak: Leak) {
    match leak.stack() {
        Some(stack) => error!(
            id = %leak.id(),
            location = %leak.location(),
            age_ms = leak.age().as_millis() as u64,
            "{leak}\n{stack}"
        ),
        None => error!(
            id = %leak.id(),
            location = %leak.location(),
            age_ms = leak.age().as_millis() as u64,
            "{leak}"
        ),
    }
}

fn parse_toggle(value: Option<&str>) -> bool {
    let Some(value) = value else {
        return true;
    };
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "off" | "no"
    )
}

#[cfg(test)]
mod tests {
    use super::parse_toggle;

    #[test]
    fn toggle_defaults_to_enabled() {
        assert!(parse_toggle(None));
        assert!(parse_toggle(Some("")));
        assert!(parse_toggle(Some("1")));
        assert!(parse_toggle(Some("yes")));
    }

    #[test]
    fn toggle_accepts_common_off_spellings() {
        for value in ["0", "false", "OFF", " no "] {
            assert!(!parse_toggle(Some(value)), "{value:?} should disable");
        }
    }
}
