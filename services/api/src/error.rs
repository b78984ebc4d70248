use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ventas_common::VentasError;

pub struct ApiError(pub VentasError);

impl From<VentasError> for ApiError {
    fn from(err: VentasError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            VentasError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            VentasError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            VentasError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            VentasError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
