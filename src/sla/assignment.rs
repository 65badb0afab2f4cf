use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::db::issue_repository::IssueRepository;
use crate::models::issue::{Issue, IssueStatus};
use crate::sla::error::SlaError;
use crate::sla::scoring::{RankRequest, RankedProvider, ScoringEngine};
use crate::sla::tracker::SlaTracker;

/// What `auto_assign` does with an issue that already has a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReassignPolicy {
    /// Keep the current binding and report it unchanged.
    #[default]
    Keep,
    /// Re-rank without the current provider and bind the best alternative.
    Reassign,
}

impl FromStr for ReassignPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keep" => Ok(ReassignPolicy::Keep),
            "reassign" => Ok(ReassignPolicy::Reassign),
            other => Err(format!("unknown reassign policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentOutcome {
    pub assigned: bool,
    pub provider_id: Option<Uuid>,
    pub score: Option<f64>,
    pub previous_provider_id: Option<Uuid>,
    /// False when the call left the binding as it was.
    pub changed: bool,
}

impl AssignmentOutcome {
    fn unchanged(provider_id: Option<Uuid>) -> Self {
        Self {
            assigned: provider_id.is_some(),
            provider_id,
            score: None,
            previous_provider_id: provider_id,
            changed: false,
        }
    }
}

fn status_name(status: IssueStatus) -> &'static str {
    match status {
        IssueStatus::Open => "OPEN",
        IssueStatus::Assigned => "ASSIGNED",
        IssueStatus::InProgress => "IN_PROGRESS",
        IssueStatus::Completed => "COMPLETED",
        IssueStatus::Closed => "CLOSED",
    }
}

pub struct AutoAssigner {
    issues: Arc<dyn IssueRepository>,
    scoring: Arc<ScoringEngine>,
    tracker: Arc<SlaTracker>,
    reassign_policy: ReassignPolicy,
    timeout: Duration,
}

impl AutoAssigner {
    pub fn new(
        issues: Arc<dyn IssueRepository>,
        scoring: Arc<ScoringEngine>,
        tracker: Arc<SlaTracker>,
        reassign_policy: ReassignPolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            issues,
            scoring,
            tracker,
            reassign_policy,
            timeout,
        }
    }

    pub fn reassign_policy(&self) -> ReassignPolicy {
        self.reassign_policy
    }

    /// Binds the best-ranked provider to the issue. An empty ranking yields
    /// `assigned: false` for manual follow-up.
    pub async fn auto_assign(&self, issue_id: Uuid) -> Result<AssignmentOutcome, SlaError> {
        let (_guard, issue, plan) = self
            .with_timeout(async {
                let guard = self.tracker.lock_issue(issue_id).await;
                let issue = self.load_assignable(issue_id).await?;
                let plan = match (issue.assigned_provider_id, self.reassign_policy) {
                    (Some(current), ReassignPolicy::Keep) => Plan::Keep(current),
                    (Some(current), ReassignPolicy::Reassign) => {
                        Plan::Bind(self.best_candidate(&issue, vec![current]).await?)
                    }
                    (None, _) => Plan::Bind(self.best_candidate(&issue, Vec::new()).await?),
                };
                Ok((guard, issue, plan))
            })
            .await?;

        match plan {
            Plan::Keep(current) => {
                // Heals a binding whose SLA record was never opened.
                self.tracker.open_for_issue(issue.id, Some(current)).await?;
                Ok(AssignmentOutcome::unchanged(Some(current)))
            }
            Plan::Bind(best) => self.bind(&issue, best).await,
        }
    }

    /// Re-ranks the issue without the given providers and binds the best
    /// remaining one. Used by escalation when the current provider is late.
    pub async fn reassign_excluding(
        &self,
        issue_id: Uuid,
        exclude: Vec<Uuid>,
    ) -> Result<AssignmentOutcome, SlaError> {
        let (_guard, issue, best) = self
            .with_timeout(async {
                let guard = self.tracker.lock_issue(issue_id).await;
                let issue = self.load_assignable(issue_id).await?;
                let best = self.best_candidate(&issue, exclude).await?;
                Ok((guard, issue, best))
            })
            .await?;
        self.bind(&issue, best).await
    }

    /// Bounds the read phase only. The issue row and its SLA record are
    /// written after this returns, so an elapsed timeout never leaves them
    /// naming different providers.
    async fn with_timeout<F, T>(&self, fut: F) -> Result<T, SlaError>
    where
        F: std::future::Future<Output = Result<T, SlaError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| SlaError::Timeout {
                operation: "auto-assignment",
                seconds: self.timeout.as_secs(),
            })?
    }

    async fn load_assignable(&self, issue_id: Uuid) -> Result<Issue, SlaError> {
        let issue = self
            .issues
            .find_issue(issue_id)
            .await?
            .ok_or_else(|| SlaError::issue_not_found(issue_id))?;
        if !issue.status.is_open() {
            return Err(SlaError::StaleState {
                issue_id,
                status: status_name(issue.status),
            });
        }
        Ok(issue)
    }

    async fn best_candidate(
        &self,
        issue: &Issue,
        exclude: Vec<Uuid>,
    ) -> Result<Option<RankedProvider>, SlaError> {
        let ranked = self
            .scoring
            .rank_providers(&RankRequest {
                property_id: issue.property_id,
                category: issue.category,
                priority: issue.priority,
                exclude,
            })
            .await?;
        Ok(ranked.into_iter().next())
    }

    async fn bind(
        &self,
        issue: &Issue,
        best: Option<RankedProvider>,
    ) -> Result<AssignmentOutcome, SlaError> {
        let Some(best) = best else {
            info!(
                issue_id = %issue.id,
                category = issue.category.as_str(),
                "no provider candidate, manual assignment required"
            );
            return Ok(AssignmentOutcome::unchanged(issue.assigned_provider_id));
        };

        self.issues
            .assign_provider(issue.id, best.provider_id)
            .await?
            .ok_or_else(|| SlaError::issue_not_found(issue.id))?;
        self.tracker
            .open_for_issue(issue.id, Some(best.provider_id))
            .await?;

        info!(
            issue_id = %issue.id,
            provider_id = %best.provider_id,
            score = best.score,
            previous = ?issue.assigned_provider_id,
            "provider assigned"
        );

        Ok(AssignmentOutcome {
            assigned: true,
            provider_id: Some(best.provider_id),
            score: Some(best.score),
            previous_provider_id: issue.assigned_provider_id,
            changed: issue.assigned_provider_id != Some(best.provider_id),
        })
    }
}

enum Plan {
    Keep(Uuid),
    Bind(Option<RankedProvider>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::InMemoryDb;
    use crate::models::issue::{IssueCategory, IssuePriority};
    use crate::sla::policy::SlaPolicy;
    use crate::sla::scoring::ScoringWeights;
    use crate::sla::test_support::{fixed_now, id, issue, provider, tracking};

    fn assigner(db: &Arc<InMemoryDb>, policy: ReassignPolicy) -> AutoAssigner {
        assigner_with_timeout(db, policy, Duration::from_secs(5))
    }

    fn assigner_with_timeout(
        db: &Arc<InMemoryDb>,
        policy: ReassignPolicy,
        timeout: Duration,
    ) -> AutoAssigner {
        let scoring = Arc::new(ScoringEngine::new(
            db.clone(),
            SlaPolicy::default(),
            ScoringWeights::default(),
        ));
        let tracker = Arc::new(SlaTracker::new(db.clone(), db.clone(), SlaPolicy::default()));
        AutoAssigner::new(db.clone(), scoring, tracker, policy, timeout)
    }

    #[tokio::test]
    async fn assigns_top_candidate_and_opens_tracking() {
        let db = Arc::new(InMemoryDb::default());
        db.insert_provider(provider(1, 3.0, &[IssueCategory::Plumbing]));
        db.insert_provider(provider(2, 4.8, &[IssueCategory::Plumbing]));
        db.insert_issue(issue(10, id(100), IssuePriority::High, fixed_now()));

        let outcome = assigner(&db, ReassignPolicy::Keep)
            .auto_assign(id(10))
            .await
            .unwrap();

        assert!(outcome.assigned);
        assert!(outcome.changed);
        assert_eq!(outcome.provider_id, Some(id(2)));
        let stored = db.issue(id(10)).unwrap();
        assert_eq!(stored.assigned_provider_id, Some(id(2)));
        assert_eq!(stored.status, IssueStatus::Assigned);
        assert_eq!(db.tracking_for(id(10)).unwrap().provider_id, Some(id(2)));
    }

    #[tokio::test]
    async fn empty_pool_returns_unassigned() {
        let db = Arc::new(InMemoryDb::default());
        db.insert_provider(provider(1, 5.0, &[IssueCategory::Hvac]));
        db.insert_issue(issue(10, id(100), IssuePriority::Urgent, fixed_now()));

        let outcome = assigner(&db, ReassignPolicy::Keep)
            .auto_assign(id(10))
            .await
            .unwrap();

        assert!(!outcome.assigned);
        assert_eq!(outcome.provider_id, None);
        assert_eq!(db.issue(id(10)).unwrap().status, IssueStatus::Open);
    }

    #[tokio::test]
    async fn keep_policy_leaves_existing_binding() {
        let db = Arc::new(InMemoryDb::default());
        db.insert_provider(provider(1, 2.0, &[IssueCategory::Plumbing]));
        db.insert_provider(provider(2, 5.0, &[IssueCategory::Plumbing]));
        let mut existing = issue(10, id(100), IssuePriority::Medium, fixed_now());
        existing.assigned_provider_id = Some(id(1));
        existing.status = IssueStatus::Assigned;
        db.insert_issue(existing);

        let outcome = assigner(&db, ReassignPolicy::Keep)
            .auto_assign(id(10))
            .await
            .unwrap();

        assert!(outcome.assigned);
        assert!(!outcome.changed);
        assert_eq!(outcome.provider_id, Some(id(1)));
        assert_eq!(db.tracking_for(id(10)).unwrap().provider_id, Some(id(1)));
    }

    #[tokio::test]
    async fn reassign_policy_picks_a_different_provider() {
        let db = Arc::new(InMemoryDb::default());
        db.insert_provider(provider(1, 5.0, &[IssueCategory::Plumbing]));
        db.insert_provider(provider(2, 4.0, &[IssueCategory::Plumbing]));
        let mut existing = issue(10, id(100), IssuePriority::Medium, fixed_now());
        existing.assigned_provider_id = Some(id(1));
        existing.status = IssueStatus::Assigned;
        db.insert_issue(existing);

        let outcome = assigner(&db, ReassignPolicy::Reassign)
            .auto_assign(id(10))
            .await
            .unwrap();

        assert_eq!(outcome.provider_id, Some(id(2)));
        assert_eq!(outcome.previous_provider_id, Some(id(1)));
        assert!(outcome.changed);
    }

    #[tokio::test]
    async fn closed_issue_is_stale() {
        let db = Arc::new(InMemoryDb::default());
        let mut done = issue(10, id(100), IssuePriority::Low, fixed_now());
        done.status = IssueStatus::Closed;
        db.insert_issue(done);

        let err = assigner(&db, ReassignPolicy::Keep)
            .auto_assign(id(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SlaError::StaleState { status: "CLOSED", .. }));
    }

    #[tokio::test]
    async fn missing_issue_is_not_found() {
        let db = Arc::new(InMemoryDb::default());
        let err = assigner(&db, ReassignPolicy::Keep)
            .auto_assign(id(10))
            .await
            .unwrap_err();
        assert!(matches!(err, SlaError::NotFound { .. }));
    }

    #[tokio::test]
    async fn slow_lookup_times_out_without_binding() {
        let db = Arc::new(InMemoryDb::default().with_read_latency(Duration::from_millis(200)));
        db.insert_provider(provider(1, 4.0, &[IssueCategory::Plumbing]));
        db.insert_issue(issue(10, id(100), IssuePriority::High, fixed_now()));

        let err = assigner_with_timeout(&db, ReassignPolicy::Keep, Duration::from_millis(20))
            .auto_assign(id(10))
            .await
            .unwrap_err();

        assert!(matches!(err, SlaError::Timeout { operation: "auto-assignment", .. }));
        assert_eq!(db.issue(id(10)).unwrap().assigned_provider_id, None);
        assert!(db.tracking_for(id(10)).is_none());
    }

    #[tokio::test]
    async fn slow_binding_completes_both_writes() {
        let db = Arc::new(InMemoryDb::default().with_write_latency(Duration::from_millis(100)));
        db.insert_provider(provider(1, 5.0, &[IssueCategory::Plumbing]));
        db.insert_provider(provider(2, 4.0, &[IssueCategory::Plumbing]));
        let mut existing = issue(10, id(100), IssuePriority::Medium, fixed_now());
        existing.assigned_provider_id = Some(id(1));
        existing.status = IssueStatus::Assigned;
        db.insert_issue(existing);
        db.insert_tracking(tracking(id(10), Some(id(1))));

        let outcome =
            assigner_with_timeout(&db, ReassignPolicy::Reassign, Duration::from_millis(20))
                .auto_assign(id(10))
                .await
                .unwrap();

        assert_eq!(outcome.provider_id, Some(id(2)));
        assert_eq!(db.issue(id(10)).unwrap().assigned_provider_id, Some(id(2)));
        assert_eq!(db.tracking_for(id(10)).unwrap().provider_id, Some(id(2)));
    }

    #[test]
    fn parses_reassign_policy() {
        assert_eq!("Reassign".parse::<ReassignPolicy>(), Ok(ReassignPolicy::Reassign));
        assert!("sometimes".parse::<ReassignPolicy>().is_err());
    }
}
