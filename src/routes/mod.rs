mod analytics;
mod escalations;
mod issues;
mod prelude;
mod providers;

#[cfg(test)]
pub(crate) mod test_support;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub use analytics::{get_forecast, get_leaderboard, get_metrics, get_policy};
pub use escalations::scan_escalations;
pub use issues::{auto_assign, get_tracking, record_resolution, record_response};
pub use providers::{rank_providers, submit_rating};

/// Every SLA endpoint, to be nested under `/api/sla`.
pub fn sla_router() -> Router<AppState> {
    Router::new()
        .route("/providers/rank", get(rank_providers))
        .route("/providers/{provider_id}/ratings", post(submit_rating))
        .route("/issues/{issue_id}/auto-assign", post(auto_assign))
        .route("/issues/{issue_id}/response", post(record_response))
        .route("/issues/{issue_id}/resolution", post(record_resolution))
        .route("/issues/{issue_id}/tracking", get(get_tracking))
        .route("/escalations/scan", post(scan_escalations))
        .route("/metrics", get(get_metrics))
        .route("/leaderboard", get(get_leaderboard))
        .route("/forecast/{property_id}", get(get_forecast))
        .route("/policy", get(get_policy))
}
