use async_trait::async_trait;
use uuid::Uuid;

use crate::models::sla_tracking::{SlaHistoryFilter, SlaHistoryRow, SlaTracking};

/// Store port for SLA records. Every breach update is an OR: implementations
/// must never write `false` over a `true` flag.
#[async_trait]
pub trait SlaTrackingRepository: Send + Sync {
    async fn find_by_issue(&self, issue_id: Uuid) -> Result<Option<SlaTracking>, sqlx::Error>;

    /// Inserts the record if missing, otherwise sets the provider when one is
    /// given. Existing times and flags are left untouched.
    async fn open_tracking(
        &self,
        issue_id: Uuid,
        provider_id: Option<Uuid>,
    ) -> Result<SlaTracking, sqlx::Error>;

    /// Sets the response time only while it is still empty. `None` means the
    /// record is missing or already responded.
    async fn record_response(
        &self,
        issue_id: Uuid,
        hours: f64,
        breached: bool,
    ) -> Result<Option<SlaTracking>, sqlx::Error>;

    /// Sets the resolution time only while it is still empty.
    async fn record_resolution(
        &self,
        issue_id: Uuid,
        hours: f64,
        breached: bool,
    ) -> Result<Option<SlaTracking>, sqlx::Error>;

    async fn mark_breaches(
        &self,
        issue_id: Uuid,
        response_breached: bool,
        resolution_breached: bool,
    ) -> Result<Option<SlaTracking>, sqlx::Error>;

    async fn list_history(
        &self,
        filter: &SlaHistoryFilter,
    ) -> Result<Vec<SlaHistoryRow>, sqlx::Error>;
}
