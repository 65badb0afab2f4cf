use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::models::issue::{Issue, IssueCategory, IssuePriority, IssueStatus};
use crate::models::provider::Provider;
use crate::models::sla_tracking::SlaTracking;

pub fn fixed_now() -> OffsetDateTime {
    time::macros::datetime!(2024-03-01 12:00 UTC)
}

pub fn hours(h: f64) -> Duration {
    Duration::seconds_f64(h * 3600.0)
}

/// Deterministic ids so tie-break ordering is predictable in tests.
pub fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

pub fn provider(n: u128, rating: f64, specialties: &[IssueCategory]) -> Provider {
    Provider {
        id: id(n),
        name: format!("Provider {n}"),
        email: Some(format!("provider{n}@example.com")),
        specialties: specialties.to_vec(),
        rating,
        hourly_rate: 45.0,
        currency: "EUR".into(),
        active: true,
        created_at: fixed_now() - Duration::days(365),
    }
}

pub fn issue(
    n: u128,
    property_id: Uuid,
    priority: IssuePriority,
    created_at: OffsetDateTime,
) -> Issue {
    Issue {
        id: id(n),
        property_id,
        title: format!("Issue {n}"),
        category: IssueCategory::Plumbing,
        priority,
        status: IssueStatus::Open,
        created_at,
        completed_at: None,
        assigned_provider_id: None,
    }
}

pub fn tracking(issue_id: Uuid, provider_id: Option<Uuid>) -> SlaTracking {
    SlaTracking {
        issue_id,
        provider_id,
        created_at: fixed_now(),
        actual_response_time: None,
        actual_resolution_time: None,
        response_breached: false,
        resolution_breached: false,
        updated_at: fixed_now(),
    }
}
