use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::issue::IssueCategory;
use crate::models::provider::{Provider, ProviderStats};
use crate::models::provider_rating::{NewProviderRating, ProviderRating};

use super::provider_repository::ProviderRepository;

pub struct PostgresProviderRepository {
    pub pool: PgPool,
}

#[async_trait]
impl ProviderRepository for PostgresProviderRepository {
    async fn find_provider(&self, provider_id: Uuid) -> Result<Option<Provider>, sqlx::Error> {
        let result = sqlx::query_as::<_, Provider>(
            r#"
            SELECT id, name, email, specialties, rating, hourly_rate, currency, active, created_at
            FROM providers
            WHERE id = $1
            "#,
        )
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn find_providers(&self, provider_ids: &[Uuid]) -> Result<Vec<Provider>, sqlx::Error> {
        let results = sqlx::query_as::<_, Provider>(
            r#"
            SELECT id, name, email, specialties, rating, hourly_rate, currency, active, created_at
            FROM providers
            WHERE id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(provider_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn list_active_providers_for_category(
        &self,
        category: IssueCategory,
    ) -> Result<Vec<Provider>, sqlx::Error> {
        let results = sqlx::query_as::<_, Provider>(
            r#"
            SELECT id, name, email, specialties, rating, hourly_rate, currency, active, created_at
            FROM providers
            WHERE active = TRUE AND $1 = ANY(specialties)
            ORDER BY id
            "#,
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn load_provider_stats(
        &self,
        provider_ids: &[Uuid],
        property_id: Uuid,
    ) -> Result<Vec<ProviderStats>, sqlx::Error> {
        let results = sqlx::query_as::<_, ProviderStats>(
            r#"
            SELECT p.id AS provider_id,
                   COUNT(i.id) FILTER (
                       WHERE i.status IN ('OPEN', 'ASSIGNED', 'IN_PROGRESS')
                         AND s.actual_resolution_time IS NULL
                   ) AS open_assignments,
                   COALESCE(BOOL_OR(
                       i.property_id = $2 AND i.status IN ('OPEN', 'ASSIGNED', 'IN_PROGRESS')
                   ), FALSE) AS active_on_property,
                   AVG(s.actual_response_time) AS avg_response_hours
            FROM providers p
            LEFT JOIN sla_tracking s ON s.provider_id = p.id
            LEFT JOIN issues i ON i.id = s.issue_id
            WHERE p.id = ANY($1)
            GROUP BY p.id
            ORDER BY p.id
            "#,
        )
        .bind(provider_ids)
        .bind(property_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn insert_rating(
        &self,
        provider_id: Uuid,
        rating: NewProviderRating,
    ) -> Result<ProviderRating, sqlx::Error> {
        let result = sqlx::query_as::<_, ProviderRating>(
            r#"
            INSERT INTO provider_ratings
                (provider_id, property_id, issue_id, rating, quality, timeliness, communication, price, comment, rater_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())
            RETURNING id, provider_id, property_id, issue_id, rating, quality, timeliness, communication, price, comment, rater_id, created_at
            "#,
        )
        .bind(provider_id)
        .bind(rating.property_id)
        .bind(rating.issue_id)
        .bind(rating.rating)
        .bind(rating.quality)
        .bind(rating.timeliness)
        .bind(rating.communication)
        .bind(rating.price)
        .bind(rating.comment)
        .bind(rating.rater_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn recompute_provider_rating(&self, provider_id: Uuid) -> Result<f64, sqlx::Error> {
        let rating = sqlx::query_scalar::<_, f64>(
            r#"
            UPDATE providers
            SET rating = COALESCE(
                (SELECT AVG(rating)::double precision FROM provider_ratings WHERE provider_id = $1),
                0
            )
            WHERE id = $1
            RETURNING rating
            "#,
        )
        .bind(provider_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(rating)
    }
}
