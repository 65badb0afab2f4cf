use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::sla_tracking::{SlaHistoryFilter, SlaHistoryRow, SlaTracking};

use super::sla_repository::SlaTrackingRepository;

pub struct PostgresSlaTrackingRepository {
    pub pool: PgPool,
}

const RETURNING_COLUMNS: &str = "issue_id, provider_id, created_at, actual_response_time, actual_resolution_time, response_breached, resolution_breached, updated_at";

#[async_trait]
impl SlaTrackingRepository for PostgresSlaTrackingRepository {
    async fn find_by_issue(&self, issue_id: Uuid) -> Result<Option<SlaTracking>, sqlx::Error> {
        let query = format!("SELECT {RETURNING_COLUMNS} FROM sla_tracking WHERE issue_id = $1");
        let result = sqlx::query_as::<_, SlaTracking>(&query)
            .bind(issue_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(result)
    }

    async fn open_tracking(
        &self,
        issue_id: Uuid,
        provider_id: Option<Uuid>,
    ) -> Result<SlaTracking, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO sla_tracking (issue_id, provider_id, created_at, updated_at)
            VALUES ($1, $2, now(), now())
            ON CONFLICT (issue_id) DO UPDATE
            SET provider_id = COALESCE(EXCLUDED.provider_id, sla_tracking.provider_id),
                updated_at = now()
            RETURNING {RETURNING_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, SlaTracking>(&query)
            .bind(issue_id)
            .bind(provider_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(result)
    }

    async fn record_response(
        &self,
        issue_id: Uuid,
        hours: f64,
        breached: bool,
    ) -> Result<Option<SlaTracking>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE sla_tracking
            SET actual_response_time = $2,
                response_breached = response_breached OR $3,
                updated_at = now()
            WHERE issue_id = $1 AND actual_response_time IS NULL
            RETURNING {RETURNING_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, SlaTracking>(&query)
            .bind(issue_id)
            .bind(hours)
            .bind(breached)
            .fetch_optional(&self.pool)
            .await?;

        Ok(result)
    }

    async fn record_resolution(
        &self,
        issue_id: Uuid,
        hours: f64,
        breached: bool,
    ) -> Result<Option<SlaTracking>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE sla_tracking
            SET actual_resolution_time = $2,
                resolution_breached = resolution_breached OR $3,
                updated_at = now()
            WHERE issue_id = $1 AND actual_resolution_time IS NULL
            RETURNING {RETURNING_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, SlaTracking>(&query)
            .bind(issue_id)
            .bind(hours)
            .bind(breached)
            .fetch_optional(&self.pool)
            .await?;

        Ok(result)
    }

    async fn mark_breaches(
        &self,
        issue_id: Uuid,
        response_breached: bool,
        resolution_breached: bool,
    ) -> Result<Option<SlaTracking>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE sla_tracking
            SET response_breached = response_breached OR $2,
                resolution_breached = resolution_breached OR $3,
                updated_at = now()
            WHERE issue_id = $1
            RETURNING {RETURNING_COLUMNS}
            "#
        );
        let result = sqlx::query_as::<_, SlaTracking>(&query)
            .bind(issue_id)
            .bind(response_breached)
            .bind(resolution_breached)
            .fetch_optional(&self.pool)
            .await?;

        Ok(result)
    }

    async fn list_history(
        &self,
        filter: &SlaHistoryFilter,
    ) -> Result<Vec<SlaHistoryRow>, sqlx::Error> {
        let results = sqlx::query_as::<_, SlaHistoryRow>(
            r#"
            SELECT s.issue_id,
                   i.property_id,
                   s.provider_id,
                   i.category,
                   i.priority,
                   i.created_at AS issue_created_at,
                   s.actual_response_time,
                   s.actual_resolution_time,
                   s.response_breached,
                   s.resolution_breached
            FROM sla_tracking s
            JOIN issues i ON i.id = s.issue_id
            WHERE ($1::timestamptz IS NULL OR i.created_at >= $1)
              AND ($2::timestamptz IS NULL OR i.created_at <= $2)
              AND ($3::uuid IS NULL OR i.property_id = $3)
              AND ($4::uuid IS NULL OR s.provider_id = $4)
            ORDER BY i.created_at ASC
            "#,
        )
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.property_id)
        .bind(filter.provider_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }
}
