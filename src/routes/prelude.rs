pub(crate) use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
pub(crate) use serde::Deserialize;
pub(crate) use serde_json::json;
pub(crate) use time::OffsetDateTime;
pub(crate) use uuid::Uuid;

pub(crate) use crate::{responses::JsonResponse, state::AppState};

/// Optional body carrying the instant a transition happened; defaults to now.
#[derive(Debug, Default, Deserialize)]
pub struct TransitionAt {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub at: Option<OffsetDateTime>,
}

pub(crate) fn ok_json(value: serde_json::Value) -> Response {
    (StatusCode::OK, Json(value)).into_response()
}
