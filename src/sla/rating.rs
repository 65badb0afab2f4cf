use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::db::provider_repository::ProviderRepository;
use crate::models::provider_rating::{NewProviderRating, ProviderRating, MAX_RATING, MIN_RATING};
use crate::sla::error::SlaError;

#[derive(Debug, Clone, Serialize)]
pub struct RatingSubmitted {
    pub rating: ProviderRating,
    /// The provider's running mean after this rating.
    pub provider_rating: f64,
}

pub struct ProviderRatingService {
    providers: Arc<dyn ProviderRepository>,
}

impl ProviderRatingService {
    pub fn new(providers: Arc<dyn ProviderRepository>) -> Self {
        Self { providers }
    }

    pub async fn submit_rating(
        &self,
        provider_id: Uuid,
        rating: NewProviderRating,
    ) -> Result<RatingSubmitted, SlaError> {
        if let Some(field) = rating.invalid_score() {
            return Err(SlaError::InvalidInput(format!(
                "{field} must be between {MIN_RATING} and {MAX_RATING}"
            )));
        }
        if self.providers.find_provider(provider_id).await?.is_none() {
            return Err(SlaError::provider_not_found(provider_id));
        }

        let stored = self.providers.insert_rating(provider_id, rating).await?;
        let provider_rating = self.providers.recompute_provider_rating(provider_id).await?;
        info!(%provider_id, score = stored.rating, provider_rating, "provider rated");

        Ok(RatingSubmitted {
            rating: stored,
            provider_rating,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::InMemoryDb;
    use crate::models::issue::IssueCategory;
    use crate::sla::test_support::{id, provider};

    fn new_rating(score: i16) -> NewProviderRating {
        NewProviderRating {
            property_id: id(100),
            issue_id: None,
            rating: score,
            quality: None,
            timeliness: None,
            communication: None,
            price: None,
            comment: Some("fixed the leak".into()),
            rater_id: id(900),
        }
    }

    #[tokio::test]
    async fn recomputes_mean_after_each_rating() {
        let db = Arc::new(InMemoryDb::default());
        db.insert_provider(provider(1, 0.0, &[IssueCategory::Plumbing]));
        let service = ProviderRatingService::new(db.clone());

        let first = service.submit_rating(id(1), new_rating(5)).await.unwrap();
        assert_eq!(first.provider_rating, 5.0);

        let second = service.submit_rating(id(1), new_rating(2)).await.unwrap();
        assert_eq!(second.provider_rating, 3.5);
        assert_eq!(db.providers.lock().unwrap()[&id(1)].rating, 3.5);
    }

    #[tokio::test]
    async fn rejects_out_of_range_sub_score() {
        let db = Arc::new(InMemoryDb::default());
        db.insert_provider(provider(1, 4.0, &[IssueCategory::Plumbing]));
        let service = ProviderRatingService::new(db.clone());

        let mut rating = new_rating(4);
        rating.price = Some(0);
        let err = service.submit_rating(id(1), rating).await.unwrap_err();

        assert!(matches!(err, SlaError::InvalidInput(ref msg) if msg.starts_with("price")));
        assert!(db.ratings.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_provider_is_not_found() {
        let db = Arc::new(InMemoryDb::default());
        let service = ProviderRatingService::new(db);

        let err = service.submit_rating(id(7), new_rating(3)).await.unwrap_err();
        assert!(matches!(err, SlaError::NotFound { entity: "provider", .. }));
    }
}
