use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "issue_category")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCategory {
    Plumbing,
    Electrical,
    Hvac,
    Structural,
    Other,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::Plumbing => "PLUMBING",
            IssueCategory::Electrical => "ELECTRICAL",
            IssueCategory::Hvac => "HVAC",
            IssueCategory::Structural => "STRUCTURAL",
            IssueCategory::Other => "OTHER",
        }
    }
}

/// Ordered from least to most urgent, so `Ord` follows escalation priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Type,
)]
#[sqlx(type_name = "issue_priority")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuePriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl IssuePriority {
    pub const ALL: [IssuePriority; 4] = [
        IssuePriority::Urgent,
        IssuePriority::High,
        IssuePriority::Medium,
        IssuePriority::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssuePriority::Low => "LOW",
            IssuePriority::Medium => "MEDIUM",
            IssuePriority::High => "HIGH",
            IssuePriority::Urgent => "URGENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "issue_status")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    Open,
    Assigned,
    InProgress,
    Completed,
    Closed,
}

impl IssueStatus {
    pub const OPEN_STATES: [IssueStatus; 3] = [
        IssueStatus::Open,
        IssueStatus::Assigned,
        IssueStatus::InProgress,
    ];

    pub fn is_open(&self) -> bool {
        Self::OPEN_STATES.contains(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Issue {
    pub id: Uuid,
    pub property_id: Uuid,
    pub title: String,
    pub category: IssueCategory,
    pub priority: IssuePriority,
    pub status: IssueStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    pub assigned_provider_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_follows_urgency() {
        assert!(IssuePriority::Urgent > IssuePriority::High);
        assert!(IssuePriority::High > IssuePriority::Medium);
        assert!(IssuePriority::Medium > IssuePriority::Low);
    }

    #[test]
    fn enums_serialize_in_screaming_case() {
        let value = serde_json::to_value(IssueStatus::InProgress).unwrap();
        assert_eq!(value, "IN_PROGRESS");
        let category: IssueCategory = serde_json::from_str("\"HVAC\"").unwrap();
        assert_eq!(category, IssueCategory::Hvac);
    }

    #[test]
    fn only_active_statuses_are_open() {
        assert!(IssueStatus::Open.is_open());
        assert!(IssueStatus::InProgress.is_open());
        assert!(!IssueStatus::Completed.is_open());
        assert!(!IssueStatus::Closed.is_open());
    }
}
