use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::order::OrderStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid pin")]
    InvalidPin,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("order cannot move from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("pumps unavailable: {}", .0.join(", "))]
    PumpsUnavailable(Vec<String>),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InvalidPin => (StatusCode::UNAUTHORIZED, "INVALID PIN".to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::InvalidTransition { .. } => (StatusCode::CONFLICT, self.to_string()),
            AppError::PumpsUnavailable(pumps) => {
                let body = Json(json!({
                    "error": format!(
                        "these pumps are no longer available: {}",
                        pumps.join(", ")
                    ),
                    "unavailable_pumps": pumps,
                }));
                return (StatusCode::CONFLICT, body).into_response();
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::AppError;
    use crate::models::order::OrderStatus;

    #[test]
    fn transition_errors_use_wire_status_names() {
        let err = AppError::InvalidTransition {
            from: OrderStatus::OnWayToPharmacy,
            to: OrderStatus::Delivered,
        };
        assert_eq!(
            err.to_string(),
            "order cannot move from ON_WAY_TO_PHARMACY to DELIVERED"
        );
    }
}
