use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::issue::Issue;

#[async_trait]
pub trait IssueRepository: Send + Sync {
    async fn find_issue(&self, issue_id: Uuid) -> Result<Option<Issue>, sqlx::Error>;

    /// Issues in OPEN, ASSIGNED or IN_PROGRESS, oldest first.
    async fn list_open_issues(&self, property_id: Option<Uuid>)
        -> Result<Vec<Issue>, sqlx::Error>;

    /// Binds a provider to the issue and moves OPEN issues to ASSIGNED.
    async fn assign_provider(
        &self,
        issue_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<Issue>, sqlx::Error>;

    async fn count_issues_for_property_since(
        &self,
        property_id: Uuid,
        since: OffsetDateTime,
    ) -> Result<i64, sqlx::Error>;
}
