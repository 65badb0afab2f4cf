use async_trait::async_trait;
use uuid::Uuid;

use crate::models::issue::IssueCategory;
use crate::models::provider::{Provider, ProviderStats};
use crate::models::provider_rating::{NewProviderRating, ProviderRating};

#[async_trait]
pub trait ProviderRepository: Send + Sync {
    async fn find_provider(&self, provider_id: Uuid) -> Result<Option<Provider>, sqlx::Error>;

    async fn find_providers(&self, provider_ids: &[Uuid]) -> Result<Vec<Provider>, sqlx::Error>;

    async fn list_active_providers_for_category(
        &self,
        category: IssueCategory,
    ) -> Result<Vec<Provider>, sqlx::Error>;

    /// Open workload, property continuity and response history per provider.
    /// Providers without any SLA history still get a zeroed entry.
    async fn load_provider_stats(
        &self,
        provider_ids: &[Uuid],
        property_id: Uuid,
    ) -> Result<Vec<ProviderStats>, sqlx::Error>;

    async fn insert_rating(
        &self,
        provider_id: Uuid,
        rating: NewProviderRating,
    ) -> Result<ProviderRating, sqlx::Error>;

    /// Recomputes `providers.rating` as the mean of all ratings and returns it.
    async fn recompute_provider_rating(&self, provider_id: Uuid) -> Result<f64, sqlx::Error>;
}
