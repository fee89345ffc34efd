//! "My stall" endpoints for signed-in stall owners.

use crate::domain::StallDraft;
use crate::transport::http::handlers::common::BearerToken;
use crate::transport::http::types::{
    created, json_422, ok, AppState, CreatedResponse, StockUpdateRequest,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[utoipa::path(
    get,
    path = "/api/my/stall",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The caller's stall with its latest stock", body = ApiResponse),
        (status = 401, description = "Missing or invalid token", body = ApiResponse),
        (status = 404, description = "No stall for this user", body = ApiResponse)
    )
)]
pub async fn my_stall_handler(State(state): State<AppState>, token: BearerToken) -> Response {
    match state.service.my_stall(token.as_deref()).await {
        Ok(stall) => ok(stall),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/my/stall",
    request_body = StallDraft,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Stall updated", body = ApiResponse),
        (status = 400, description = "Invalid stall attributes", body = ApiResponse),
        (status = 401, description = "Missing or invalid token", body = ApiResponse),
        (status = 404, description = "No stall for this user", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse)
    )
)]
pub async fn update_my_stall_handler(
    State(state): State<AppState>,
    token: BearerToken,
    request: Result<Json<StallDraft>, JsonRejection>,
) -> Response {
    let Json(draft) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"name\": string, \"address\": string, ...}"),
    };
    match state.service.update_my_stall(token.as_deref(), draft).await {
        Ok(()) => ok(serde_json::json!({ "updated": true })),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/my/stock",
    request_body = StockUpdateRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Stock update recorded", body = ApiResponse),
        (status = 400, description = "Invalid variety list", body = ApiResponse),
        (status = 401, description = "Missing or invalid token", body = ApiResponse),
        (status = 404, description = "No stall for this user", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse)
    )
)]
pub async fn post_stock_handler(
    State(state): State<AppState>,
    token: BearerToken,
    request: Result<Json<StockUpdateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => {
            return json_422(
                e,
                "{\"varieties\": [{\"name\": string, \"price\"?: number, \"stock\"?: string}]}",
            )
        }
    };
    match state
        .service
        .post_stock_update(token.as_deref(), request.varieties)
        .await
    {
        Ok(id) => created(CreatedResponse { id }),
        Err(e) => e.into_response(),
    }
}
