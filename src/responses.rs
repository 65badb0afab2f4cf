use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::sla::error::SlaError;

#[derive(Serialize, Deserialize)]
pub struct JsonResponse {
    pub status: String,
    pub success: bool,
    pub message: String,
    pub code: Option<String>,
}

impl JsonResponse {
    fn error(status: StatusCode, msg: &str, code: Option<&str>) -> Response {
        (
            status,
            Json(JsonResponse {
                status: "error".to_string(),
                success: false,
                message: msg.to_string(),
                code: code.map(str::to_string),
            }),
        )
            .into_response()
    }

    pub fn success(msg: &str) -> impl IntoResponse {
        (
            StatusCode::OK,
            Json(JsonResponse {
                status: "success".to_string(),
                success: true,
                message: msg.to_string(),
                code: None,
            }),
        )
    }

    pub fn not_found(msg: &str) -> impl IntoResponse {
        Self::error(StatusCode::NOT_FOUND, msg, None)
    }

    pub fn too_many_requests(msg: &str) -> impl IntoResponse {
        Self::error(StatusCode::TOO_MANY_REQUESTS, msg, None)
    }

    pub fn error_with_code(status: StatusCode, msg: &str, code: &str) -> impl IntoResponse {
        Self::error(status, msg, Some(code))
    }
}

impl IntoResponse for SlaError {
    fn into_response(self) -> Response {
        let status = match &self {
            SlaError::NotFound { .. } => StatusCode::NOT_FOUND,
            SlaError::StaleState { .. } => StatusCode::CONFLICT,
            SlaError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            SlaError::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SlaError::Database(err) => {
                error!(?err, "database error");
                return JsonResponse::error_with_code(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    self.code(),
                )
                .into_response();
            }
        };
        JsonResponse::error_with_code(status, &self.to_string(), self.code()).into_response()
    }
}
