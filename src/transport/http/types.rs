use crate::app::MarketService;
use crate::domain::{StallDraft, User, VarietyDraft};
use crate::error::MarketError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MarketService>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok<T: Serialize>(data: T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                success: true,
                data: Some(value),
                error: None,
            },
            Err(e) => Self::failure(format!("Failed to encode response: {}", e)),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// 200 with the success envelope.
pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::ok(data))).into_response()
}

/// 201 with the success envelope.
pub fn created<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::ok(data))).into_response()
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct AdminLoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct AdminTokenResponse {
    pub token: String,
    /// Token lifetime in seconds.
    #[serde(rename = "expiresIn")]
    pub expires_in: i64,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct StockUpdateRequest {
    pub varieties: Vec<VarietyDraft>,
}

/// Stall attributes plus an optional variety list that becomes a new stock
/// update.
#[derive(Deserialize, Debug, ToSchema)]
pub struct AdminStallRequest {
    #[serde(flatten)]
    pub stall: StallDraft,
    #[serde(default)]
    pub varieties: Option<Vec<VarietyDraft>>,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct DeletedResponse {
    pub deleted: u64,
}

pub fn json_422(err: JsonRejection, expected: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::failure(format!(
            "Invalid JSON body: {} (expected: {})",
            err, expected
        ))),
    )
        .into_response()
}

/// Malformed path segment or query string.
pub fn request_400(err: impl std::fmt::Display, expected: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::failure(format!(
            "Invalid request: {} (expected: {})",
            err, expected
        ))),
    )
        .into_response()
}

impl MarketError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MarketError::Validation(_) => StatusCode::BAD_REQUEST,
            MarketError::Unauthenticated | MarketError::InvalidToken => StatusCode::UNAUTHORIZED,
            MarketError::Forbidden(_) => StatusCode::FORBIDDEN,
            MarketError::NotFound(_) => StatusCode::NOT_FOUND,
            MarketError::Conflict(_) => StatusCode::CONFLICT,
            MarketError::Store(_) | MarketError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if self.is_internal() {
            tracing::error!(error = ?self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ApiResponse::failure(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(
            MarketError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(MarketError::InvalidToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            MarketError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            MarketError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            MarketError::Store(sqlx::Error::PoolTimedOut).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn admin_stall_request_flattens_attributes() {
        let request: AdminStallRequest = serde_json::from_value(serde_json::json!({
            "name": "Pak Ali",
            "address": "Jalan Besar",
            "varieties": [{ "name": "D24", "price": "18", "stock": "low" }]
        }))
        .unwrap();
        assert_eq!(request.stall.name, "Pak Ali");
        assert_eq!(request.varieties.map(|v| v.len()), Some(1));
    }
}
