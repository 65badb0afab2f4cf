use super::prelude::*;

use crate::models::issue::{IssueCategory, IssuePriority};
use crate::models::provider_rating::NewProviderRating;
use crate::sla::scoring::RankRequest;

#[derive(Debug, Deserialize)]
pub struct RankQuery {
    pub property_id: Uuid,
    pub category: IssueCategory,
    pub priority: IssuePriority,
}

pub async fn rank_providers(
    State(app_state): State<AppState>,
    Query(query): Query<RankQuery>,
) -> Response {
    let request = RankRequest {
        property_id: query.property_id,
        category: query.category,
        priority: query.priority,
        exclude: Vec::new(),
    };

    match app_state.scoring.rank_providers(&request).await {
        Ok(providers) => ok_json(json!({
            "success": true,
            "providers": providers,
        })),
        Err(err) => err.into_response(),
    }
}

pub async fn submit_rating(
    State(app_state): State<AppState>,
    Path(provider_id): Path<Uuid>,
    Json(payload): Json<NewProviderRating>,
) -> Response {
    match app_state.ratings.submit_rating(provider_id, payload).await {
        Ok(submitted) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "rating": submitted.rating,
                "provider_rating": submitted.provider_rating,
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
