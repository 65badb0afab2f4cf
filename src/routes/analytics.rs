use super::prelude::*;

use crate::models::sla_tracking::SlaHistoryFilter;

const DEFAULT_FORECAST_DAYS: u32 = 30;

#[derive(Debug, Default, Deserialize)]
pub struct MetricsQuery {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub from: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub to: Option<OffsetDateTime>,
    pub property_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
}

impl From<MetricsQuery> for SlaHistoryFilter {
    fn from(query: MetricsQuery) -> Self {
        SlaHistoryFilter {
            from: query.from,
            to: query.to,
            property_id: query.property_id,
            provider_id: query.provider_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub from: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub to: Option<OffsetDateTime>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForecastQuery {
    pub days: Option<u32>,
}

pub async fn get_metrics(
    State(app_state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> Response {
    match app_state.analytics.get_metrics(&query.into()).await {
        Ok(metrics) => ok_json(json!({
            "success": true,
            "metrics": metrics,
        })),
        Err(err) => err.into_response(),
    }
}

pub async fn get_leaderboard(
    State(app_state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Response {
    let filter = SlaHistoryFilter {
        from: query.from,
        to: query.to,
        ..Default::default()
    };
    match app_state.analytics.get_leaderboard(&filter).await {
        Ok(leaderboard) => ok_json(json!({
            "success": true,
            "leaderboard": leaderboard,
        })),
        Err(err) => err.into_response(),
    }
}

pub async fn get_forecast(
    State(app_state): State<AppState>,
    Path(property_id): Path<Uuid>,
    Query(query): Query<ForecastQuery>,
) -> Response {
    let days = query.days.unwrap_or(DEFAULT_FORECAST_DAYS);
    match app_state
        .analytics
        .forecast(property_id, days, OffsetDateTime::now_utc())
        .await
    {
        Ok(forecast) => ok_json(json!({
            "success": true,
            "forecast": forecast,
        })),
        Err(err) => err.into_response(),
    }
}

pub async fn get_policy(State(app_state): State<AppState>) -> Response {
    ok_json(json!({
        "success": true,
        "policy": app_state.config.sla_policy,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;

    use crate::db::mock_db::InMemoryDb;
    use crate::routes::test_support::{send, test_app};
    use crate::sla::test_support::id;

    #[tokio::test]
    async fn empty_store_yields_zero_metrics() {
        let db = Arc::new(InMemoryDb::default());
        let (status, body) = send(test_app(db), "GET", "/metrics", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["metrics"]["total_records"], 0);
        assert_eq!(body["metrics"]["response"]["p95"], 0.0);
        assert_eq!(body["metrics"]["breach_rates"]["overall"], 0.0);
    }

    #[tokio::test]
    async fn inverted_window_is_bad_request() {
        let db = Arc::new(InMemoryDb::default());
        let uri = "/metrics?from=2024-03-02T00:00:00Z&to=2024-03-01T00:00:00Z";
        let (status, body) = send(test_app(db), "GET", uri, None).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_input");
    }

    #[tokio::test]
    async fn leaderboard_is_empty_without_history() {
        let db = Arc::new(InMemoryDb::default());
        let (status, body) = send(test_app(db), "GET", "/leaderboard", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["leaderboard"]["top_performers"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn forecast_defaults_to_thirty_days() {
        let db = Arc::new(InMemoryDb::default());
        let uri = format!("/forecast/{}", id(100));
        let (status, body) = send(test_app(db), "GET", &uri, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["forecast"]["days_ahead"], 30);
        assert_eq!(body["forecast"]["risk_level"], "low");
    }

    #[tokio::test]
    async fn policy_lists_default_deadlines() {
        let db = Arc::new(InMemoryDb::default());
        let (status, body) = send(test_app(db), "GET", "/policy", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["policy"]["urgent"]["response_hours"], 2.0);
        assert_eq!(body["policy"]["low"]["resolution_hours"], 336.0);
    }
}
