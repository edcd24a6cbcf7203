use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("delivery distance {distance_km:.2} km exceeds service radius of {max_km:.1} km")]
    Eligibility { distance_km: f64, max_km: f64 },

    #[error("not found: {0}")]
    NotFound(String),

    /// The canonical record and its paired view have diverged. This means the
    /// dual-write was violated somewhere; it must surface loudly, never as a
    /// plain 404.
    #[error("consistency violation: {0}")]
    Consistency(String),

    #[error("capacity conflict: {0}")]
    CapacityConflict(String),

    #[error("cancellation window expired for order {0}")]
    CancelWindowExpired(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Eligibility { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Consistency(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::CapacityConflict(_) => StatusCode::CONFLICT,
            AppError::CancelWindowExpired(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if let AppError::Consistency(detail) = &self {
            tracing::error!(detail = %detail, "order/view pair diverged");
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
