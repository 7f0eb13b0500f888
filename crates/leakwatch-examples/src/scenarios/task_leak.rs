use crate::Config;
use std::time::Duration;
use tracing::info;

/// Spawns `tasks` workers that each hold a subscription; odd-numbered workers
/// forget to release theirs.
pub async fn run(cfg: &Config, tasks: u32) -> Result<(), String> {
    let engine = cfg
        .engine_builder()
        .spawn_on(tokio::runtime::Handle::current())
        .on_leak(|leak| info!(id = %leak.id(), location = %leak.location(), "leak reported"))
        .build()
        .map_err(|e| e.to_string())?;

    let mut handles = Vec::with_capacity(tasks as usize);
    for worker in 0..tasks {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let subscription = engine
                .subscribe(move || println!("worker.{worker}: unsubscribed"))
                .map_err(|e| e.to_string())?;
            tokio::time::sleep(Duration::from_millis(10 * u64::from(worker))).await;
            if worker % 2 == 0 {
                subscription.release();
            } else {
                println!("worker.{worker}: exiting without release");
            }
            Ok::<(), String>(())
        }));
    }

    for handle in handles {
        handle.await.map_err(|e| format!("worker task failed: {e}"))??;
    }

    super::report(&engine, cfg.settle, u64::from(tasks / 2)).await
}
