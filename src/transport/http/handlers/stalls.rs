//! Public directory reads plus the owner-or-admin stall update.

use crate::domain::{StallDraft, StallFilter, StallId};
use crate::transport::http::handlers::common::BearerToken;
use crate::transport::http::types::{json_422, ok, request_400, AppState};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

#[utoipa::path(
    get,
    path = "/api/stalls",
    params(StallFilter),
    responses(
        (status = 200, description = "Stalls with their latest stock", body = ApiResponse),
        (status = 500, description = "Internal server error", body = ApiResponse)
    )
)]
pub async fn list_stalls_handler(
    State(state): State<AppState>,
    filter: Result<Query<StallFilter>, QueryRejection>,
) -> Response {
    let Query(filter) = match filter {
        Ok(v) => v,
        Err(e) => return request_400(e, "?state=string&variety=string"),
    };
    match state.service.list_stalls(&filter).await {
        Ok(stalls) => ok(stalls),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/stalls/{id}",
    params(("id" = i64, Path, description = "Stall id")),
    responses(
        (status = 200, description = "Stall with its latest stock", body = ApiResponse),
        (status = 400, description = "Malformed stall id", body = ApiResponse),
        (status = 404, description = "Stall not found", body = ApiResponse)
    )
)]
pub async fn get_stall_handler(
    State(state): State<AppState>,
    id: Result<Path<StallId>, PathRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(v) => v,
        Err(e) => return request_400(e, "numeric stall id"),
    };
    match state.service.get_stall(id).await {
        Ok(stall) => ok(stall),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/stalls/{id}",
    params(("id" = i64, Path, description = "Stall id")),
    request_body = StallDraft,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Stall updated", body = ApiResponse),
        (status = 400, description = "Invalid stall attributes", body = ApiResponse),
        (status = 401, description = "Missing or invalid token", body = ApiResponse),
        (status = 403, description = "Not the owner of this stall", body = ApiResponse),
        (status = 404, description = "Stall not found", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse)
    )
)]
pub async fn update_stall_handler(
    State(state): State<AppState>,
    token: BearerToken,
    id: Result<Path<StallId>, PathRejection>,
    request: Result<Json<StallDraft>, JsonRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(v) => v,
        Err(e) => return request_400(e, "numeric stall id"),
    };
    let Json(draft) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"name\": string, \"address\": string, ...}"),
    };
    match state.service.update_stall(token.as_deref(), id, draft).await {
        Ok(()) => ok(serde_json::json!({ "id": id })),
        Err(e) => e.into_response(),
    }
}
