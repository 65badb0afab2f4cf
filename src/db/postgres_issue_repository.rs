use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::issue::Issue;

use super::issue_repository::IssueRepository;

pub struct PostgresIssueRepository {
    pub pool: PgPool,
}

#[async_trait]
impl IssueRepository for PostgresIssueRepository {
    async fn find_issue(&self, issue_id: Uuid) -> Result<Option<Issue>, sqlx::Error> {
        let result = sqlx::query_as::<_, Issue>(
            r#"
            SELECT id,
                   property_id,
                   title,
                   category,
                   priority,
                   status,
                   created_at,
                   completed_at,
                   assigned_provider_id
            FROM issues
            WHERE id = $1
            "#,
        )
        .bind(issue_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn list_open_issues(
        &self,
        property_id: Option<Uuid>,
    ) -> Result<Vec<Issue>, sqlx::Error> {
        let results = sqlx::query_as::<_, Issue>(
            r#"
            SELECT id,
                   property_id,
                   title,
                   category,
                   priority,
                   status,
                   created_at,
                   completed_at,
                   assigned_provider_id
            FROM issues
            WHERE status IN ('OPEN', 'ASSIGNED', 'IN_PROGRESS')
              AND ($1::uuid IS NULL OR property_id = $1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn assign_provider(
        &self,
        issue_id: Uuid,
        provider_id: Uuid,
    ) -> Result<Option<Issue>, sqlx::Error> {
        let result = sqlx::query_as::<_, Issue>(
            r#"
            UPDATE issues
            SET assigned_provider_id = $2,
                status = CASE WHEN status = 'OPEN' THEN 'ASSIGNED'::issue_status ELSE status END
            WHERE id = $1
            RETURNING id, property_id, title, category, priority, status, created_at, completed_at, assigned_provider_id
            "#,
        )
        .bind(issue_id)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn count_issues_for_property_since(
        &self,
        property_id: Uuid,
        since: OffsetDateTime,
    ) -> Result<i64, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM issues
            WHERE property_id = $1 AND created_at >= $2
            "#,
        )
        .bind(property_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
