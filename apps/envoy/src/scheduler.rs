use crate::orchestrator::Orchestrator;
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    time::{Interval, MissedTickBehavior, interval},
};
use tracing::{error, info};

/// Runs a full cycle every `period`, starting immediately. A running cycle is
/// never aborted; shutdown is observed between cycles.
pub async fn run_periodic_cycles(
    orchestrator: Arc<Orchestrator>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if !wait_for_tick(&mut ticker, &mut shutdown).await {
            break;
        }

        info!("Running fetch cycle");
        let report = orchestrator.run_cycle().await;
        info!(
            failed = report.errors.len(),
            new = report.new.values().map(Vec::len).sum::<usize>(),
            "Fetch cycle completed, sleeping for {} seconds",
            period.as_secs()
        );
    }

    info!("Cycle scheduler stopped");
}

/// Sends the expiring reminder every `period`. Only meaningful with a store.
pub async fn run_periodic_expiring_digest(
    orchestrator: Arc<Orchestrator>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    if !orchestrator.has_store() {
        info!("No store configured, expiring digest disabled");
        return;
    }

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if !wait_for_tick(&mut ticker, &mut shutdown).await {
            break;
        }

        match orchestrator.send_expiring_digest(Utc::now()).await {
            Ok(sent) => info!(protocols = sent.len(), "Expiring digest completed"),
            Err(e) => error!(error = %e, "Expiring digest failed"),
        }
    }

    info!("Expiring digest scheduler stopped");
}

/// Returns `false` once shutdown has been signalled or its sender is gone.
async fn wait_for_tick(ticker: &mut Interval, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    loop {
        tokio::select! {
            _ = ticker.tick() => return !*shutdown.borrow(),
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return false;
                }
            }
        }
    }
}
