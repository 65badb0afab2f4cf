use super::prelude::*;

use crate::sla::error::SlaError;

pub async fn auto_assign(
    State(app_state): State<AppState>,
    Path(issue_id): Path<Uuid>,
) -> Response {
    match app_state.assigner.auto_assign(issue_id).await {
        Ok(outcome) => ok_json(json!({
            "success": true,
            "assignment": outcome,
        })),
        Err(err) => err.into_response(),
    }
}

pub async fn record_response(
    State(app_state): State<AppState>,
    Path(issue_id): Path<Uuid>,
    payload: Option<Json<TransitionAt>>,
) -> Response {
    let at = payload
        .and_then(|Json(body)| body.at)
        .unwrap_or_else(OffsetDateTime::now_utc);

    match app_state.tracker.record_provider_response(issue_id, at).await {
        Ok(result) => ok_json(json!({
            "success": true,
            "outcome": result.outcome,
            "tracking": result.record,
        })),
        Err(err) => err.into_response(),
    }
}

pub async fn record_resolution(
    State(app_state): State<AppState>,
    Path(issue_id): Path<Uuid>,
    payload: Option<Json<TransitionAt>>,
) -> Response {
    let at = payload
        .and_then(|Json(body)| body.at)
        .unwrap_or_else(OffsetDateTime::now_utc);

    match app_state.tracker.record_resolution(issue_id, at).await {
        Ok(result) => ok_json(json!({
            "success": true,
            "outcome": result.outcome,
            "tracking": result.record,
        })),
        Err(err) => err.into_response(),
    }
}

pub async fn get_tracking(
    State(app_state): State<AppState>,
    Path(issue_id): Path<Uuid>,
) -> Response {
    let issue = match app_state.issue_repo.find_issue(issue_id).await {
        Ok(Some(issue)) => issue,
        Ok(None) => return SlaError::issue_not_found(issue_id).into_response(),
        Err(err) => return SlaError::from(err).into_response(),
    };

    match app_state.sla_repo.find_by_issue(issue_id).await {
        Ok(Some(record)) => ok_json(json!({
            "success": true,
            "state": record.state(),
            "deadlines": app_state.tracker.policy().deadlines(issue.priority),
            "tracking": record,
        })),
        Ok(None) => JsonResponse::not_found("No SLA record for this issue").into_response(),
        Err(err) => SlaError::from(err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::json;

    use crate::db::mock_db::InMemoryDb;
    use crate::models::issue::{IssueCategory, IssuePriority, IssueStatus};
    use crate::routes::test_support::{send, test_app};
    use crate::sla::test_support::{fixed_now, hours, id, issue, provider};

    #[tokio::test]
    async fn auto_assign_binds_best_provider() {
        let db = Arc::new(InMemoryDb::default());
        db.insert_provider(provider(1, 4.0, &[IssueCategory::Plumbing]));
        db.insert_issue(issue(10, id(100), IssuePriority::High, fixed_now()));

        let uri = format!("/issues/{}/auto-assign", id(10));
        let (status, body) = send(test_app(db.clone()), "POST", &uri, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["assignment"]["assigned"], true);
        assert_eq!(db.issue(id(10)).unwrap().assigned_provider_id, Some(id(1)));
    }

    #[tokio::test]
    async fn auto_assign_on_closed_issue_conflicts() {
        let db = Arc::new(InMemoryDb::default());
        db.insert_issue(issue(10, id(100), IssuePriority::High, fixed_now()));
        db.set_issue_status(id(10), IssueStatus::Completed);

        let uri = format!("/issues/{}/auto-assign", id(10));
        let (status, body) = send(test_app(db), "POST", &uri, None).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "stale_state");
    }

    #[tokio::test]
    async fn response_then_tracking_reports_state() {
        let db = Arc::new(InMemoryDb::default());
        let t0 = fixed_now();
        db.insert_issue(issue(10, id(100), IssuePriority::High, t0));
        let app = test_app(db);

        let at = (t0 + hours(9.0))
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap();
        let uri = format!("/issues/{}/response", id(10));
        let (status, body) = send(app.clone(), "POST", &uri, Some(json!({ "at": at }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "recorded");
        assert_eq!(body["tracking"]["response_breached"], true);

        let (_, again) = send(app.clone(), "POST", &uri, Some(json!({ "at": at }))).await;
        assert_eq!(again["outcome"], "already_recorded");

        let uri = format!("/issues/{}/tracking", id(10));
        let (status, body) = send(app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "RESPONDED");
        assert_eq!(body["deadlines"]["response_hours"], 8.0);
    }

    #[tokio::test]
    async fn resolution_without_body_uses_now() {
        let db = Arc::new(InMemoryDb::default());
        db.insert_issue(issue(10, id(100), IssuePriority::Low, fixed_now()));

        let uri = format!("/issues/{}/resolution", id(10));
        let (status, body) = send(test_app(db), "POST", &uri, None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["tracking"]["actual_resolution_time"].is_number());
    }

    #[tokio::test]
    async fn unknown_issue_is_not_found() {
        let db = Arc::new(InMemoryDb::default());
        let uri = format!("/issues/{}/tracking", id(99));
        let (status, body) = send(test_app(db), "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }
}
