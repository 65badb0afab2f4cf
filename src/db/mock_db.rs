use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::{
    issue_repository::IssueRepository, provider_repository::ProviderRepository,
    sla_repository::SlaTrackingRepository,
};
use crate::models::issue::{Issue, IssueCategory, IssueStatus};
use crate::models::provider::{Provider, ProviderStats};
use crate::models::provider_rating::{NewProviderRating, ProviderRating};
use crate::models::sla_tracking::{SlaHistoryFilter, SlaHistoryRow, SlaTracking};

/// In-memory store implementing every repository trait, used by tests and
/// local runs without Postgres.
#[derive(Default)]
pub struct InMemoryDb {
    pub issues: Mutex<HashMap<Uuid, Issue>>,
    pub providers: Mutex<HashMap<Uuid, Provider>>,
    pub tracking: Mutex<HashMap<Uuid, SlaTracking>>,
    pub ratings: Mutex<Vec<ProviderRating>>,
    pub should_fail: bool,
    /// Delay applied to issue lookups.
    pub read_latency: Option<Duration>,
    /// Delay applied to provider binding.
    pub write_latency: Option<Duration>,
}

impl InMemoryDb {
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    pub fn with_read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = Some(latency);
        self
    }

    pub fn with_write_latency(mut self, latency: Duration) -> Self {
        self.write_latency = Some(latency);
        self
    }

    pub fn insert_issue(&self, issue: Issue) {
        self.issues.lock().unwrap().insert(issue.id, issue);
    }

    pub fn insert_provider(&self, provider: Provider) {
        self.providers.lock().unwrap().insert(provider.id, provider);
    }

    pub fn insert_tracking(&self, record: SlaTracking) {
        self.tracking.lock().unwrap().insert(record.issue_id, record);
    }

    pub fn issue(&self, issue_id: Uuid) -> Option<Issue> {
        self.issues.lock().unwrap().get(&issue_id).cloned()
    }

    pub fn tracking_for(&self, issue_id: Uuid) -> Option<SlaTracking> {
        self.tracking.lock().unwrap().get(&issue_id).cloned()
    }

    pub fn set_issue_status(&self, issue_id: Uuid, status: IssueStatus) {
        if let Some(issue) = self.issues.lock().unwrap().get_mut(&issue_id) {
            issue.status = status;
        }
    }

    fn check(&self) -> Result<(), sqlx::Error> {
        if self.should_fail {
            return Err(sqlx::Error::Protocol("Mock DB failure".into()));
        }
        Ok(())
    }

    async fn wait(latency: Option<Duration>) {
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl IssueRepository for InMemoryDb {
    async fn find_issue(&self, issue_id: Uuid) -> Result<Option<Issue>, sqlx::Error> {
        Self::wait(self.read_latency).await;
        self.check()?;
        Ok(self.issue(issue_id))
    }

    async fn list_open_issues(
        &self,
        property_id: Option<Uuid>,
    ) -> Result<Vec<Issue>, sqlx::Error> {
        self.check()?;
        let mut open: Vec<Issue> = self
            .issues
            .lock()
            .unwrap()
            .values()
            .filter(|issue| issue.status.is_open())
            .filter(|issue| property_id.map_or(true, |id| issue.property_id == id))
            .cloned()
            .collect();
        open.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(open)
    }

    async fn assign_provider(
        &self,
        issue_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<Issue>, sqlx::Error> {
        Self::wait(self.write_latency).await;
        self.check()?;
        let mut issues = self.issues.lock().unwrap();
        Ok(issues.get_mut(&issue_id).map(|issue| {
            issue.assigned_provider_id = Some(provider_id);
            if issue.status == IssueStatus::Open {
                issue.status = IssueStatus::Assigned;
            }
            issue.clone()
        }))
    }

    async fn count_issues_for_property_since(
        &self,
        property_id: Uuid,
        since: OffsetDateTime,
    ) -> Result<i64, sqlx::Error> {
        self.check()?;
        let count = self
            .issues
            .lock()
            .unwrap()
            .values()
            .filter(|issue| issue.property_id == property_id && issue.created_at >= since)
            .count();
        Ok(count as i64)
    }
}

#[async_trait]
impl ProviderRepository for InMemoryDb {
    async fn find_provider(&self, provider_id: Uuid) -> Result<Option<Provider>, sqlx::Error> {
        self.check()?;
        Ok(self.providers.lock().unwrap().get(&provider_id).cloned())
    }

    async fn find_providers(&self, provider_ids: &[Uuid]) -> Result<Vec<Provider>, sqlx::Error> {
        self.check()?;
        let providers = self.providers.lock().unwrap();
        let mut found: Vec<Provider> = provider_ids
            .iter()
            .filter_map(|id| providers.get(id).cloned())
            .collect();
        found.sort_by_key(|p| p.id);
        found.dedup_by_key(|p| p.id);
        Ok(found)
    }

    async fn list_active_providers_for_category(
        &self,
        category: IssueCategory,
    ) -> Result<Vec<Provider>, sqlx::Error> {
        self.check()?;
        let mut matching: Vec<Provider> = self
            .providers
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.handles(category))
            .cloned()
            .collect();
        matching.sort_by_key(|p| p.id);
        Ok(matching)
    }

    async fn load_provider_stats(
        &self,
        provider_ids: &[Uuid],
        property_id: Uuid,
    ) -> Result<Vec<ProviderStats>, sqlx::Error> {
        self.check()?;
        let tracking = self.tracking.lock().unwrap();
        let issues = self.issues.lock().unwrap();

        let mut stats: Vec<ProviderStats> = provider_ids
            .iter()
            .map(|&provider_id| {
                let mut entry = ProviderStats {
                    provider_id,
                    ..Default::default()
                };
                let mut response_sum = 0.0;
                let mut response_count = 0usize;
                for record in tracking
                    .values()
                    .filter(|r| r.provider_id == Some(provider_id))
                {
                    if let Some(hours) = record.actual_response_time {
                        response_sum += hours;
                        response_count += 1;
                    }
                    let Some(issue) = issues.get(&record.issue_id) else {
                        continue;
                    };
                    if issue.status.is_open() {
                        if record.actual_resolution_time.is_none() {
                            entry.open_assignments += 1;
                        }
                        if issue.property_id == property_id {
                            entry.active_on_property = true;
                        }
                    }
                }
                if response_count > 0 {
                    entry.avg_response_hours = Some(response_sum / response_count as f64);
                }
                entry
            })
            .collect();
        stats.sort_by_key(|s| s.provider_id);
        Ok(stats)
    }

    async fn insert_rating(
        &self,
        provider_id: Uuid,
        rating: NewProviderRating,
    ) -> Result<ProviderRating, sqlx::Error> {
        self.check()?;
        let row = ProviderRating {
            id: Uuid::new_v4(),
            provider_id,
            property_id: rating.property_id,
            issue_id: rating.issue_id,
            rating: rating.rating,
            quality: rating.quality,
            timeliness: rating.timeliness,
            communication: rating.communication,
            price: rating.price,
            comment: rating.comment,
            rater_id: rating.rater_id,
            created_at: OffsetDateTime::now_utc(),
        };
        self.ratings.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn recompute_provider_rating(&self, provider_id: Uuid) -> Result<f64, sqlx::Error> {
        self.check()?;
        let scores: Vec<i16> = self
            .ratings
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.provider_id == provider_id)
            .map(|r| r.rating)
            .collect();
        let mean = if scores.is_empty() {
            0.0
        } else {
            scores.iter().map(|&s| f64::from(s)).sum::<f64>() / scores.len() as f64
        };
        let mut providers = self.providers.lock().unwrap();
        let provider = providers
            .get_mut(&provider_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        provider.rating = mean;
        Ok(mean)
    }
}

#[async_trait]
impl SlaTrackingRepository for InMemoryDb {
    async fn find_by_issue(&self, issue_id: Uuid) -> Result<Option<SlaTracking>, sqlx::Error> {
        self.check()?;
        Ok(self.tracking_for(issue_id))
    }

    async fn open_tracking(
        &self,
        issue_id: Uuid,
        provider_id: Option<Uuid>,
    ) -> Result<SlaTracking, sqlx::Error> {
        self.check()?;
        let now = OffsetDateTime::now_utc();
        let mut tracking = self.tracking.lock().unwrap();
        let record = tracking.entry(issue_id).or_insert_with(|| SlaTracking {
            issue_id,
            provider_id: None,
            created_at: now,
            actual_response_time: None,
            actual_resolution_time: None,
            response_breached: false,
            resolution_breached: false,
            updated_at: now,
        });
        if provider_id.is_some() {
            record.provider_id = provider_id;
        }
        record.updated_at = now;
        Ok(record.clone())
    }

    async fn record_response(
        &self,
        issue_id: Uuid,
        hours: f64,
        breached: bool,
    ) -> Result<Option<SlaTracking>, sqlx::Error> {
        self.check()?;
        let mut tracking = self.tracking.lock().unwrap();
        Ok(tracking
            .get_mut(&issue_id)
            .filter(|r| r.actual_response_time.is_none())
            .map(|record| {
                record.actual_response_time = Some(hours);
                record.response_breached |= breached;
                record.updated_at = OffsetDateTime::now_utc();
                record.clone()
            }))
    }

    async fn record_resolution(
        &self,
        issue_id: Uuid,
        hours: f64,
        breached: bool,
    ) -> Result<Option<SlaTracking>, sqlx::Error> {
        self.check()?;
        let mut tracking = self.tracking.lock().unwrap();
        Ok(tracking
            .get_mut(&issue_id)
            .filter(|r| r.actual_resolution_time.is_none())
            .map(|record| {
                record.actual_resolution_time = Some(hours);
                record.resolution_breached |= breached;
                record.updated_at = OffsetDateTime::now_utc();
                record.clone()
            }))
    }

    async fn mark_breaches(
        &self,
        issue_id: Uuid,
        response_breached: bool,
        resolution_breached: bool,
    ) -> Result<Option<SlaTracking>, sqlx::Error> {
        self.check()?;
        let mut tracking = self.tracking.lock().unwrap();
        Ok(tracking.get_mut(&issue_id).map(|record| {
            record.response_breached |= response_breached;
            record.resolution_breached |= resolution_breached;
            record.updated_at = OffsetDateTime::now_utc();
            record.clone()
        }))
    }

    async fn list_history(
        &self,
        filter: &SlaHistoryFilter,
    ) -> Result<Vec<SlaHistoryRow>, sqlx::Error> {
        self.check()?;
        let tracking = self.tracking.lock().unwrap();
        let issues = self.issues.lock().unwrap();
        let mut rows: Vec<SlaHistoryRow> = tracking
            .values()
            .filter_map(|record| {
                let issue = issues.get(&record.issue_id)?;
                Some(SlaHistoryRow {
                    issue_id: record.issue_id,
                    property_id: issue.property_id,
                    provider_id: record.provider_id,
                    category: issue.category,
                    priority: issue.priority,
                    issue_created_at: issue.created_at,
                    actual_response_time: record.actual_response_time,
                    actual_resolution_time: record.actual_resolution_time,
                    response_breached: record.response_breached,
                    resolution_breached: record.resolution_breached,
                })
            })
            .filter(|row| filter.matches(row))
            .collect();
        rows.sort_by(|a, b| {
            a.issue_created_at
                .cmp(&b.issue_created_at)
                .then(a.issue_id.cmp(&b.issue_id))
        });
        Ok(rows)
    }
}
