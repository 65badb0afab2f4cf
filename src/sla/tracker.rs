use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::{issue_repository::IssueRepository, sla_repository::SlaTrackingRepository};
use crate::models::issue::Issue;
use crate::models::sla_tracking::SlaTracking;
use crate::sla::error::SlaError;
use crate::sla::policy::{SlaDeadlines, SlaPolicy};

/// Elapsed hours between two instants, never negative.
pub fn hours_between(start: OffsetDateTime, end: OffsetDateTime) -> f64 {
    ((end - start).as_seconds_f64() / 3600.0).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    Recorded,
    /// The transition was already recorded; nothing changed.
    AlreadyRecorded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionResult {
    pub outcome: TransitionOutcome,
    pub record: SlaTracking,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BreachCheck {
    pub response: bool,
    pub resolution: bool,
}

impl BreachCheck {
    /// True when this check would flip a flag that is currently false.
    pub fn raises(&self, record: &SlaTracking) -> bool {
        (self.response && !record.response_breached)
            || (self.resolution && !record.resolution_breached)
    }
}

/// Deadline breaches for transitions that have not happened yet.
pub fn detect_breaches(
    record: &SlaTracking,
    issue_created_at: OffsetDateTime,
    deadlines: SlaDeadlines,
    now: OffsetDateTime,
) -> BreachCheck {
    let elapsed = hours_between(issue_created_at, now);
    BreachCheck {
        response: record.actual_response_time.is_none() && elapsed > deadlines.response_hours,
        resolution: record.actual_resolution_time.is_none()
            && elapsed > deadlines.resolution_hours,
    }
}

#[derive(Debug, Default)]
pub struct BreachSweep {
    pub checked: usize,
    pub newly_breached: usize,
    pub issues: Vec<Issue>,
    pub records: HashMap<Uuid, SlaTracking>,
}

pub struct SlaTracker {
    issues: Arc<dyn IssueRepository>,
    tracking: Arc<dyn SlaTrackingRepository>,
    policy: SlaPolicy,
    issue_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl SlaTracker {
    pub fn new(
        issues: Arc<dyn IssueRepository>,
        tracking: Arc<dyn SlaTrackingRepository>,
        policy: SlaPolicy,
    ) -> Self {
        Self {
            issues,
            tracking,
            policy,
            issue_locks: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &SlaPolicy {
        &self.policy
    }

    /// Serializes every mutation of one issue's SLA record.
    pub async fn lock_issue(&self, issue_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self
            .issue_locks
            .entry(issue_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drops lock entries nobody holds or waits on. A guard keeps its own
    /// `Arc`, so an entry with a single reference is idle.
    fn prune_idle_locks(&self) {
        self.issue_locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    async fn load_issue(&self, issue_id: Uuid) -> Result<Issue, SlaError> {
        self.issues
            .find_issue(issue_id)
            .await?
            .ok_or_else(|| SlaError::issue_not_found(issue_id))
    }

    /// Creates the record or binds a provider to it. Callers that combine this
    /// with other writes must hold `lock_issue`.
    pub async fn open_for_issue(
        &self,
        issue_id: Uuid,
        provider_id: Option<Uuid>,
    ) -> Result<SlaTracking, SlaError> {
        Ok(self.tracking.open_tracking(issue_id, provider_id).await?)
    }

    async fn ensure_record(&self, issue: &Issue) -> Result<SlaTracking, SlaError> {
        match self.tracking.find_by_issue(issue.id).await? {
            Some(record) => Ok(record),
            None => self.open_for_issue(issue.id, issue.assigned_provider_id).await,
        }
    }

    async fn write_response(
        &self,
        issue: &Issue,
        at: OffsetDateTime,
    ) -> Result<TransitionResult, SlaError> {
        let record = self.ensure_record(issue).await?;
        if record.actual_response_time.is_some() {
            return Ok(TransitionResult {
                outcome: TransitionOutcome::AlreadyRecorded,
                record,
            });
        }

        let hours = hours_between(issue.created_at, at);
        let deadline = self.policy.deadlines(issue.priority).response_hours;
        let breached = hours > deadline;

        match self.tracking.record_response(issue.id, hours, breached).await? {
            Some(updated) => {
                if breached {
                    warn!(issue_id = %issue.id, hours, deadline, "response deadline breached");
                }
                Ok(TransitionResult {
                    outcome: TransitionOutcome::Recorded,
                    record: updated,
                })
            }
            // Another writer got there first.
            None => Ok(TransitionResult {
                outcome: TransitionOutcome::AlreadyRecorded,
                record: self.ensure_record(issue).await?,
            }),
        }
    }

    /// UNASSIGNED -> RESPONDED. Re-recording is a no-op.
    pub async fn record_provider_response(
        &self,
        issue_id: Uuid,
        at: OffsetDateTime,
    ) -> Result<TransitionResult, SlaError> {
        let issue = self.load_issue(issue_id).await?;
        let _guard = self.lock_issue(issue_id).await;
        self.write_response(&issue, at).await
    }

    /// RESPONDED -> RESOLVED. A missing response is recorded at the same
    /// instant first. Re-recording is a no-op.
    pub async fn record_resolution(
        &self,
        issue_id: Uuid,
        at: OffsetDateTime,
    ) -> Result<TransitionResult, SlaError> {
        let issue = self.load_issue(issue_id).await?;
        let _guard = self.lock_issue(issue_id).await;

        let record = self.ensure_record(&issue).await?;
        if record.actual_resolution_time.is_some() {
            return Ok(TransitionResult {
                outcome: TransitionOutcome::AlreadyRecorded,
                record,
            });
        }
        if record.actual_response_time.is_none() {
            self.write_response(&issue, at).await?;
        }

        let hours = hours_between(issue.created_at, at);
        let deadline = self.policy.deadlines(issue.priority).resolution_hours;
        let breached = hours > deadline;

        match self
            .tracking
            .record_resolution(issue.id, hours, breached)
            .await?
        {
            Some(updated) => {
                info!(issue_id = %issue.id, hours, breached, "issue resolved");
                Ok(TransitionResult {
                    outcome: TransitionOutcome::Recorded,
                    record: updated,
                })
            }
            None => Ok(TransitionResult {
                outcome: TransitionOutcome::AlreadyRecorded,
                record: self.ensure_record(&issue).await?,
            }),
        }
    }

    /// Raises breach flags whose deadline passed while waiting. Flags are only
    /// ever set, so repeated calls are harmless.
    pub async fn refresh_breaches(
        &self,
        issue: &Issue,
        now: OffsetDateTime,
    ) -> Result<(SlaTracking, bool), SlaError> {
        let _guard = self.lock_issue(issue.id).await;
        let record = self.ensure_record(issue).await?;
        let check = detect_breaches(
            &record,
            issue.created_at,
            self.policy.deadlines(issue.priority),
            now,
        );
        if !check.raises(&record) {
            return Ok((record, false));
        }

        let updated = self
            .tracking
            .mark_breaches(issue.id, check.response, check.resolution)
            .await?
            .unwrap_or(record);
        warn!(
            issue_id = %issue.id,
            priority = issue.priority.as_str(),
            response_breached = updated.response_breached,
            resolution_breached = updated.resolution_breached,
            "sla breach detected"
        );
        Ok((updated, true))
    }

    /// Runs breach detection over every open issue, optionally for a single
    /// property.
    pub async fn refresh_open_breaches(
        &self,
        property_id: Option<Uuid>,
        now: OffsetDateTime,
    ) -> Result<BreachSweep, SlaError> {
        let issues = self.issues.list_open_issues(property_id).await?;
        let mut sweep = BreachSweep {
            checked: issues.len(),
            ..Default::default()
        };

        for issue in &issues {
            let (record, raised) = self.refresh_breaches(issue, now).await?;
            if raised {
                sweep.newly_breached += 1;
            }
            sweep.records.insert(issue.id, record);
        }
        sweep.issues = issues;
        self.prune_idle_locks();

        Ok(sweep)
    }
}
