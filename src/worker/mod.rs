use std::time::Duration;

use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::services::escalation_notifier::DispatchSummary;
use crate::sla::escalation::EscalationReport;
use crate::state::AppState;

pub async fn start_background_workers(state: AppState) {
    let interval = state.config.escalation_interval;
    info!(
        interval_seconds = interval.as_secs(),
        mode = ?state.escalations.mode(),
        "starting escalation worker"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            run_escalation_tick(&state).await;
        }
    });
}

/// One scan plus notification dispatch. A failed or timed-out scan is
/// logged and retried on the next tick.
pub async fn run_escalation_tick(
    state: &AppState,
) -> Option<(EscalationReport, DispatchSummary)> {
    let report = scan_with_timeout(state, state.config.scan_timeout).await?;
    let summary = state.notifier.dispatch(&report).await;
    Some((report, summary))
}

async fn scan_with_timeout(state: &AppState, timeout: Duration) -> Option<EscalationReport> {
    let scan = state
        .escalations
        .scan_for_escalations(None, OffsetDateTime::now_utc());
    match tokio::time::timeout(timeout, scan).await {
        Ok(Ok(report)) => Some(report),
        Ok(Err(err)) => {
            error!(%err, "worker: escalation scan failed");
            None
        }
        Err(_) => {
            warn!(
                timeout_seconds = timeout.as_secs(),
                "worker: escalation scan timed out"
            );
            None
        }
    }
}
