use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::issue::IssueCategory;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub specialties: Vec<IssueCategory>,
    pub rating: f64,
    pub hourly_rate: f64,
    pub currency: String,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Provider {
    pub fn handles(&self, category: IssueCategory) -> bool {
        self.active && self.specialties.contains(&category)
    }
}

/// Workload and history figures the scoring engine needs per candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ProviderStats {
    pub provider_id: Uuid,
    pub open_assignments: i64,
    pub active_on_property: bool,
    pub avg_response_hours: Option<f64>,
}
