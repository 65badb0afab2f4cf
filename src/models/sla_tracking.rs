use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::issue::{IssueCategory, IssuePriority};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SlaTracking {
    pub issue_id: Uuid,
    pub provider_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Hours from issue creation to the first provider action.
    pub actual_response_time: Option<f64>,
    /// Hours from issue creation to completion.
    pub actual_resolution_time: Option<f64>,
    pub response_breached: bool,
    pub resolution_breached: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlaState {
    Unassigned,
    Responded,
    Resolved,
}

impl SlaTracking {
    pub fn state(&self) -> SlaState {
        match (self.actual_response_time, self.actual_resolution_time) {
            (_, Some(_)) => SlaState::Resolved,
            (Some(_), None) => SlaState::Responded,
            (None, None) => SlaState::Unassigned,
        }
    }
}

/// An SLA record joined with the issue attributes analytics groups by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SlaHistoryRow {
    pub issue_id: Uuid,
    pub property_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub category: IssueCategory,
    pub priority: IssuePriority,
    #[serde(with = "time::serde::rfc3339")]
    pub issue_created_at: OffsetDateTime,
    pub actual_response_time: Option<f64>,
    pub actual_resolution_time: Option<f64>,
    pub response_breached: bool,
    pub resolution_breached: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlaHistoryFilter {
    pub from: Option<OffsetDateTime>,
    pub to: Option<OffsetDateTime>,
    pub property_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
}

impl SlaHistoryFilter {
    pub fn matches(&self, row: &SlaHistoryRow) -> bool {
        self.from.map_or(true, |from| row.issue_created_at >= from)
            && self.to.map_or(true, |to| row.issue_created_at <= to)
            && self.property_id.map_or(true, |id| row.property_id == id)
            && self
                .provider_id
                .map_or(true, |id| row.provider_id == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> SlaTracking {
        let now = OffsetDateTime::now_utc();
        SlaTracking {
            issue_id: Uuid::new_v4(),
            provider_id: None,
            created_at: now,
            actual_response_time: None,
            actual_resolution_time: None,
            response_breached: false,
            resolution_breached: false,
            updated_at: now,
        }
    }

    #[test]
    fn state_follows_recorded_times() {
        let mut r = record();
        assert_eq!(r.state(), SlaState::Unassigned);
        r.actual_response_time = Some(1.5);
        assert_eq!(r.state(), SlaState::Responded);
        r.actual_resolution_time = Some(20.0);
        assert_eq!(r.state(), SlaState::Resolved);
    }
}
