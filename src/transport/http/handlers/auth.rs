use crate::domain::Registration;
use crate::transport::http::handlers::common::BearerToken;
use crate::transport::http::types::{
    created, json_422, ok, AdminLoginRequest, AdminTokenResponse, AppState,
    AuthResponse, LoginRequest,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = Registration,
    responses(
        (status = 201, description = "User and stall created", body = ApiResponse),
        (status = 400, description = "Invalid registration", body = ApiResponse),
        (status = 409, description = "Email already registered", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse)
    )
)]
pub async fn register_handler(
    State(state): State<AppState>,
    request: Result<Json<Registration>, JsonRejection>,
) -> Response {
    let Json(registration) = match request {
        Ok(v) => v,
        Err(e) => {
            return json_422(
                e,
                "{\"name\", \"email\", \"password\", \"phone\"?, \"stall\": {\"name\", \"address\", ...}}",
            )
        }
    };
    match state.service.register(registration).await {
        Ok(session) => created(AuthResponse {
            token: session.token,
            user: session.user,
        }),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = ApiResponse),
        (status = 401, description = "Invalid email or password", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse)
    )
)]
pub async fn login_handler(
    State(state): State<AppState>,
    request: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"email\": string, \"password\": string}"),
    };
    match state.service.login(&request.email, &request.password).await {
        Ok(session) => ok(AuthResponse {
            token: session.token,
            user: session.user,
        }),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = ApiResponse),
        (status = 401, description = "Missing or invalid token", body = ApiResponse),
        (status = 404, description = "User no longer exists", body = ApiResponse)
    )
)]
pub async fn me_handler(State(state): State<AppState>, token: BearerToken) -> Response {
    match state.service.me(token.as_deref()).await {
        Ok(user) => ok(user),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/login",
    request_body = AdminLoginRequest,
    responses(
        (status = 200, description = "Admin token issued", body = ApiResponse),
        (status = 401, description = "Invalid admin credentials", body = ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = ApiResponse)
    )
)]
pub async fn admin_login_handler(
    State(state): State<AppState>,
    request: Result<Json<AdminLoginRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"username\": string, \"password\": string}"),
    };
    match state.service.admin_login(&request.username, &request.password) {
        Ok(token) => ok(AdminTokenResponse {
            token,
            expires_in: state.service.gate().codec().admin_ttl().num_seconds(),
        }),
        Err(e) => e.into_response(),
    }
}
