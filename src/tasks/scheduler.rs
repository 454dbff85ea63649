use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;

pub(crate) async fn run(state: AppState) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handles = vec![tokio::spawn(deadline_sweep_loop(state.clone(), shutdown_rx))];

    crate::core::shutdown::shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        tracing::warn!("Failed to broadcast shutdown signal to background tasks");
    }

    for handle in handles {
        if let Err(err) = handle.await {
            tracing::error!(error = %err, "Background task join failed");
        }
    }

    Ok(())
}

async fn deadline_sweep_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = state.settings().coursework().deadline_sweep_interval_seconds.max(1);
    let mut tick = interval(Duration::from_secs(period));
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                if let Err(err) = sweep_deadlines(&state).await {
                    tracing::error!(error = %err, "Deadline sweep failed");
                }
            }
        }
    }
}

/// Closes assignments that are past their deadline and do not take late work.
pub(crate) async fn sweep_deadlines(state: &AppState) -> Result<Vec<String>> {
    let closed = repositories::assignments::close_overdue(state.db(), primitive_now_utc()).await?;

    for assignment_id in &closed {
        tracing::info!(assignment_id = %assignment_id, "Assignment closed after deadline");
    }
    if !closed.is_empty() {
        metrics::counter!("assignments_auto_closed_total").increment(closed.len() as u64);
    }

    Ok(closed)
}
