//! Scheduler driver (C10): the one background loop that drives every
//! time-based sweep — invoice expiry and the two subscription sweeps.
//! Nothing here carries business rules of its own; each tick just calls
//! into the same service functions the request path could call directly.

use std::time::Duration as StdDuration;

use chrono::Utc;

use crate::services::{invoice, subscription};
use crate::state::AppState;

/// Spawns the sweep loop on the current Tokio runtime. The returned handle
/// is not awaited by the caller — the process lives and dies with it.
pub fn spawn(state: AppState) -> tokio::task::JoinHandle<()> {
    let interval = StdDuration::from_secs(state.config.scheduler_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            run_once(&state).await;
        }
    })
}

async fn run_once(state: &AppState) {
    let now = Utc::now();

    match invoice::expire_due(state, now).await {
        Ok(count) if count > 0 => tracing::info!(count, "expired due invoices"),
        Ok(_) => {}
        Err(err) => tracing::error!(error = %err, "invoice expiry sweep failed"),
    }

    match subscription::notify_expiring_sweep(state, now).await {
        Ok(count) if count > 0 => tracing::info!(count, "sent subscription-expiring notifications"),
        Ok(_) => {}
        Err(err) => tracing::error!(error = %err, "subscription expiry-notification sweep failed"),
    }

    match subscription::auto_renew_sweep(state, now).await {
        Ok((renewed, failed)) if renewed > 0 || failed > 0 => {
            tracing::info!(renewed, failed, "ran auto-renewal sweep")
        }
        Ok(_) => {}
        Err(err) => tracing::error!(error = %err, "auto-renewal sweep failed"),
    }

    match subscription::notify_expired_sweep(state, now).await {
        Ok(count) if count > 0 => tracing::info!(count, "sent subscription-expired notifications"),
        Ok(_) => {}
        Err(err) => tracing::error!(error = %err, "subscription expired-notification sweep failed"),
    }
}
