pub mod forgotten_release;
pub mod released_subscription;
pub mod task_leak;

use leakwatch::Engine;
use std::time::Duration;

/// Waits up to `settle` for the engine to have no pending subscriptions left
/// that could still change state, then prints its counters as JSON.
pub(crate) async fn report(engine: &Engine, settle: Duration, expected_leaks: u64) -> Result<(), String> {
    let deadline = tokio::time::Instant::now() + settle;
    while engine.stats().leaked < expected_leaks && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let stats = engine.stats();
    let json = facet_json::to_string(&stats).map_err(|e| format!("serialize stats: {e}"))?;
    println!("{json}");

    if stats.leaked != expected_leaks {
        return Err(format!(
            "expected {expected_leaks} leak(s), observed {}",
            stats.leaked
        ));
    }
    Ok(())
}
