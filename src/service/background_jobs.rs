// service/background_jobs.rs
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::AppState;

pub const SCHEDULER_RUN_BY: &str = "scheduler";

/// Periodic forced reconciliation. Runs once at startup, then every `every`.
pub async fn start_reconciliation_job(app_state: Arc<AppState>, every: Duration) {
    let mut interval = interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        tracing::info!("Running reconciliation job at {}", Utc::now());

        match app_state
            .reconciliation_service
            .run(SCHEDULER_RUN_BY, true)
            .await
        {
            Ok(report) if report.summary.matched && report.summary.discrepancy_count == 0 => {
                tracing::info!(
                    "Reconciliation job completed: {} users checked, ledger matches gateway",
                    report.summary.users_checked
                )
            }
            Ok(report) => tracing::warn!(
                "Reconciliation job completed with {} discrepancies, {} errors, aggregate difference {}",
                report.summary.discrepancy_count,
                report.summary.error_count,
                report.summary.difference
            ),
            Err(e) => tracing::error!("Reconciliation job failed: {}", e),
        }
    }
}
