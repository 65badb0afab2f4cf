use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt; // for `app.oneshot(...)`

use crate::config::Config;
use crate::db::mock_db::InMemoryDb;
use crate::routes::sla_router;
use crate::services::smtp_mailer::MockMailer;
use crate::state::AppState;

pub fn test_config() -> Config {
    Config::from_lookup(|name| (name == "DATABASE_URL").then(|| "postgres://test".to_string()))
        .unwrap()
}

pub fn test_app(db: Arc<InMemoryDb>) -> Router {
    let state = AppState::new(
        db.clone(),
        db.clone(),
        db,
        Arc::new(MockMailer::default()),
        test_config(),
    );
    sla_router().with_state(state)
}

pub async fn send(
    app: Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
