use super::prelude::*;

use crate::sla::error::SlaError;

#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub property_id: Option<Uuid>,
}

/// On-demand escalation scan. Notifications are left to the background
/// worker so a manual scan never e-mails twice for the same tick.
pub async fn scan_escalations(
    State(app_state): State<AppState>,
    payload: Option<Json<ScanRequest>>,
) -> Response {
    let property_id = payload.and_then(|Json(body)| body.property_id);
    let timeout = app_state.config.scan_timeout;

    let scan = app_state
        .escalations
        .scan_for_escalations(property_id, OffsetDateTime::now_utc());
    match tokio::time::timeout(timeout, scan).await {
        Ok(Ok(report)) => ok_json(json!({
            "success": true,
            "report": report,
        })),
        Ok(Err(err)) => err.into_response(),
        Err(_) => SlaError::Timeout {
            operation: "escalation scan",
            seconds: timeout.as_secs(),
        }
        .into_response(),
    }
}
