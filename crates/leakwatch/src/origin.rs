//! Call-site capture for leak diagnostics.

use backtrace::{Backtrace, BacktraceFrame};
use std::fmt;
use std::panic::Location;

/// Symbol prefixes of frames that belong to the capture path itself. Leading
/// frames matching one of these are dropped so a rendered stack starts at the
/// code that called `subscribe`.
const CAPTURE_PATH_PREFIXES: &[&str] = &[
    "backtrace::",
    "<backtrace::",
    "leakwatch::origin::",
    "<leakwatch::origin::",
    "leakwatch::engine::",
    "<leakwatch::engine::",
];

/// Where a subscription was created.
pub(crate) struct Origin {
    location: &'static Location<'static>,
    /// Unresolved until a leak is actually reported; symbolication is the
    /// expensive half of a capture.
    backtrace: Option<Backtrace>,
}

impl Origin {
    #[track_caller]
    pub(crate) fn capture(with_backtrace: bool) -> Self {
        // Leading-frame stripping expects the capture directly in this frame.
        let backtrace = if with_backtrace {
            Some(Backtrace::new_unresolved())
        } else {
            None
        };
        Self {
            location: Location::caller(),
            backtrace,
        }
    }

    pub(crate) fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Resolves and renders the captured stack, caller frame first.
    pub(crate) fn render_stack(&self) -> Option<String> {
        let mut backtrace = self.backtrace.clone()?;
        backtrace.resolve();

        let frames: Vec<BacktraceFrame> = backtrace
            .frames()
            .iter()
            .skip_while(|frame| is_capture_path_frame(frame))
            .cloned()
            .collect();

        Some(format!("{:?}", Backtrace::from(frames)))
    }
}

fn is_capture_path_frame(frame: &BacktraceFrame) -> bool {
    frame.symbols().iter().any(|symbol| {
        symbol
            .name()
            .is_some_and(|name| is_capture_path_symbol(&name.to_string()))
    })
}

fn is_capture_path_symbol(name: &str) -> bool {
    CAPTURE_PATH_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Origin")
            .field("location", &format_args!("{}", self.location))
            .field("backtrace", &self.backtrace.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::is_capture_path_symbol;

    #[test]
    fn capture_path_symbols_match_both_manglings() {
        for name in [
            "backtrace::backtrace::trace_unsynchronized",
            "<backtrace::capture::Backtrace>::new_unresolved",
            "leakwatch::origin::Origin::capture",
            "<leakwatch::origin::Origin>::capture",
            "leakwatch::engine::Engine::subscribe_boxed",
            "<leakwatch::engine::Engine>::subscribe::<F>",
        ] {
            assert!(is_capture_path_symbol(name), "{name} should be stripped");
        }
    }

    #[test]
    fn caller_symbols_are_kept() {
        for name in [
            "leakwatch::tests::leak_points_at_the_subscribe_call_site",
            "my_app::feeds::open",
            "<my_app::Feed as core::ops::Drop>::drop",
        ] {
            assert!(!is_capture_path_symbol(name), "{name} should be kept");
        }
    }
}
