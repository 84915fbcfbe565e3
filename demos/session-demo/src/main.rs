use std::time::Duration;

use serde_json::json;
use tracing::info;
use warden::prelude::*;

// ---------------------------------------------------------------------------
// Walkthrough
// ---------------------------------------------------------------------------
//
// Run with `RUST_LOG=debug cargo run -p session-demo` to see every
// transition the manager logs.

const IDLE_TIMEOUT: Duration = Duration::from_millis(300);
const SWEEP_EVERY: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<(), WardenError> {
    warden::init_tracing("warden=info,session_demo=info,info")?;

    let manager = SessionManager::builder()
        .config(
            SessionConfig::default()
                .with_global_session_timeout(IDLE_TIMEOUT)
                .with_validation_interval(SWEEP_EVERY),
        )
        .build();

    let mut events = manager.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!(?event, "lifecycle event");
        }
    });

    // A user logs in, does some work, logs out.
    let alice = manager.start("10.0.0.1".parse().ok()).await?;
    manager.set_attribute(&alice, "user", json!("alice")).await?;
    manager.touch(&alice).await?;
    manager.stop(&alice).await?;

    let record = manager.get_session(&alice).await?;
    info!(session_id = %alice, state = %record.state(), "alice logged out");

    // Another user walks away; nobody touches the session again.
    let bob = manager.start("10.0.0.2".parse().ok()).await?;
    manager.set_attribute(&bob, "user", json!("bob")).await?;

    tokio::time::sleep(IDLE_TIMEOUT + SWEEP_EVERY * 3).await;

    match manager.get_session(&bob).await {
        Err(e) if e.requires_new_session() => info!(error = %e, "bob must log in again"),
        other => info!(result = ?other, "unexpected result for bob"),
    }

    let purged = manager.purge_invalid().await?;
    info!(count = purged.len(), "purged terminal sessions");

    let metrics = manager.scheduler_metrics();
    info!(
        sweeps = metrics.total_sweeps,
        expired = metrics.total_expired,
        "validation totals"
    );

    manager.shutdown().await;
    Ok(())
}
