use crate::domain::{
    Position, Registration, Stall, StallDraft, StallListing, StallRecord, StockLevel, StockUpdate,
    User, Variety, VarietyDraft,
};
use crate::storage::schema::{AppliedMigration, MigrationReport};
use crate::transport::http::handlers::{admin, auth, health, owner, stalls};
use crate::transport::http::types::{
    AdminLoginRequest, AdminStallRequest, AdminTokenResponse, ApiResponse, AppState,
    AuthResponse, CreatedResponse, DeletedResponse, LoginRequest, StockUpdateRequest,
};
use axum::routing::{get, post, put};
use axum::Router;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        stalls::list_stalls_handler,
        stalls::get_stall_handler,
        stalls::update_stall_handler,
        auth::register_handler,
        auth::login_handler,
        auth::me_handler,
        auth::admin_login_handler,
        owner::my_stall_handler,
        owner::update_my_stall_handler,
        owner::post_stock_handler,
        admin::list_stalls_handler,
        admin::create_stall_handler,
        admin::edit_stall_handler,
        admin::delete_stall_handler,
        admin::migrate_handler
    ),
    components(schemas(
        ApiResponse,
        LoginRequest,
        AdminLoginRequest,
        AuthResponse,
        AdminTokenResponse,
        StockUpdateRequest,
        AdminStallRequest,
        CreatedResponse,
        DeletedResponse,
        Registration,
        Position,
        Stall,
        StallDraft,
        StallListing,
        StallRecord,
        StockLevel,
        StockUpdate,
        Variety,
        VarietyDraft,
        User,
        AppliedMigration,
        MigrationReport
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health::healthcheck_handler))
        .route("/api/stalls", get(stalls::list_stalls_handler))
        .route(
            "/api/stalls/:id",
            get(stalls::get_stall_handler).put(stalls::update_stall_handler),
        )
        .route("/api/auth/register", post(auth::register_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/me", get(auth::me_handler))
        .route("/api/admin/login", post(auth::admin_login_handler))
        .route(
            "/api/my/stall",
            get(owner::my_stall_handler).put(owner::update_my_stall_handler),
        )
        .route("/api/my/stock", post(owner::post_stock_handler))
        .route(
            "/api/admin/stalls",
            get(admin::list_stalls_handler).post(admin::create_stall_handler),
        )
        .route(
            "/api/admin/stalls/:id",
            put(admin::edit_stall_handler).delete(admin::delete_stall_handler),
        )
        .route("/api/admin/migrate", post(admin::migrate_handler))
        .with_state(app_state)
}
