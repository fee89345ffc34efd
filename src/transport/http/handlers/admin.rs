use crate::domain::StallId;
use crate::transport::http::handlers::common::BearerToken;
use crate::transport::http::types::{
    created, json_422, ok, request_400, AdminStallRequest, AppState, CreatedResponse,
    DeletedResponse,
};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;

const STALL_BODY: &str =
    "{\"name\": string, \"address\": string, ..., \"varieties\"?: [{\"name\", \"price\"?, \"stock\"?}]}";

#[utoipa::path(
    get,
    path = "/api/admin/stalls",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "All stalls with owner ids and raw coordinates", body = ApiResponse),
        (status = 401, description = "Missing or invalid token", body = ApiResponse),
        (status = 403, description = "Admin role required", body = ApiResponse)
    )
)]
pub async fn list_stalls_handler(State(state): State<AppState>, token: BearerToken) -> Response {
    match state.service.admin_list_stalls(token.as_deref()).await {
        Ok(stalls) => ok(stalls),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/stalls",
    request_body = AdminStallRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Stall created", body = ApiResponse),
        (status = 400, description = "Invalid stall or variety list", body = ApiResponse),
        (status = 401, description = "Missing or invalid token", body = ApiResponse),
        (status = 403, description = "Admin role required", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse)
    )
)]
pub async fn create_stall_handler(
    State(state): State<AppState>,
    token: BearerToken,
    request: Result<Json<AdminStallRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, STALL_BODY),
    };
    match state
        .service
        .admin_create_stall(token.as_deref(), request.stall, request.varieties)
        .await
    {
        Ok(id) => created(CreatedResponse { id }),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/admin/stalls/{id}",
    params(("id" = i64, Path, description = "Stall id")),
    request_body = AdminStallRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Stall replaced (and stock appended when varieties are given)", body = ApiResponse),
        (status = 400, description = "Invalid stall or variety list", body = ApiResponse),
        (status = 401, description = "Missing or invalid token", body = ApiResponse),
        (status = 403, description = "Admin role required", body = ApiResponse),
        (status = 404, description = "Stall not found", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse)
    )
)]
pub async fn edit_stall_handler(
    State(state): State<AppState>,
    token: BearerToken,
    id: Result<Path<StallId>, PathRejection>,
    request: Result<Json<AdminStallRequest>, JsonRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(v) => v,
        Err(e) => return request_400(e, "numeric stall id"),
    };
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, STALL_BODY),
    };
    match state
        .service
        .admin_edit_stall(token.as_deref(), id, request.stall, request.varieties)
        .await
    {
        Ok(()) => ok(serde_json::json!({ "id": id })),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/stalls/{id}",
    params(("id" = i64, Path, description = "Stall id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Number of stalls removed (0 when already gone)", body = ApiResponse),
        (status = 400, description = "Malformed stall id", body = ApiResponse),
        (status = 401, description = "Missing or invalid token", body = ApiResponse),
        (status = 403, description = "Admin role required", body = ApiResponse)
    )
)]
pub async fn delete_stall_handler(
    State(state): State<AppState>,
    token: BearerToken,
    id: Result<Path<StallId>, PathRejection>,
) -> Response {
    let Path(id) = match id {
        Ok(v) => v,
        Err(e) => return request_400(e, "numeric stall id"),
    };
    match state.service.admin_delete_stall(token.as_deref(), id).await {
        Ok(deleted) => ok(DeletedResponse { deleted }),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/migrate",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Pending migrations applied", body = ApiResponse),
        (status = 401, description = "Missing or invalid token", body = ApiResponse),
        (status = 403, description = "Admin role required", body = ApiResponse),
        (status = 500, description = "Migration failed", body = ApiResponse)
    )
)]
pub async fn migrate_handler(State(state): State<AppState>, token: BearerToken) -> Response {
    match state.service.migrate(token.as_deref()).await {
        Ok(report) => ok(report),
        Err(e) => e.into_response(),
    }
}
