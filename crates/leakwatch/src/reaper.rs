//! Background consumer of the reclaim queue.
//!
//! Exactly one reaper runs per engine. It only ever sees registrations whose
//! handles were dropped, and it competes with `release()` through registry
//! removal: if the id is already gone the notification is stale and ignored.

use crate::config::ReaperRuntime;
use crate::engine::Shared;
use crate::reclaim::ReclaimQueue;
use crate::registration::Registration;
use std::io;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::{debug, error, warn};

pub(crate) fn spawn(
    runtime: &ReaperRuntime,
    shared: Arc<Shared>,
    queue: ReclaimQueue<Registration>,
) -> io::Result<()> {
    match runtime {
        ReaperRuntime::Thread { name } => {
            // Detached; the thread must not hold up process exit.
            std::thread::Builder::new()
                .name(name.clone())
                .spawn(move || run_blocking(shared, queue))?;
        }
        ReaperRuntime::Tokio(handle) => {
            handle.spawn(run_async(shared, queue));
        }
    }
    Ok(())
}

fn run_blocking(shared: Arc<Shared>, mut queue: ReclaimQueue<Registration>) {
    debug!("reaper thread started");
    while let Some(registration) = queue.remove_blocking() {
        reap(&shared, &registration);
    }
    debug!("reclaim queue closed, reaper thread exiting");
}

async fn run_async(shared: Arc<Shared>, mut queue: ReclaimQueue<Registration>) {
    debug!("reaper task started");
    while let Some(registration) = queue.remove().await {
        // Callbacks and symbolication block; keep them off the runtime workers.
        let shared = Arc::clone(&shared);
        if let Err(error) =
            tokio::task::spawn_blocking(move || reap(&shared, &registration)).await
        {
            error!(%error, "reaper worker join error");
        }
    }
    debug!("reclaim queue closed, reaper task exiting");
}

fn reap(shared: &Shared, reclaimed: &Registration) {
    let id = reclaimed.id();
    let Some(registration) = shared.registry.remove(id) else {
        debug!(%id, "handle reclaimed after release, nothing to report");
        return;
    };

    shared.leaked.fetch_add(1, Ordering::Relaxed);
    warn!(
        %id,
        location = %registration.origin().location(),
        "subscription dropped without release"
    );
    registration.invoke_leak(&shared.on_leak);
}
