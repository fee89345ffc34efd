// src/bin/api_server.rs

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use durian_runtuh::transport;
use durian_runtuh::{storage, Config, MarketService};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("durian_runtuh=info,tower_http=info")),
        )
        .init();

    // --- Store Initialization ---
    tracing::info!(environment = %config.environment, "connecting to store");
    let store = storage::connect(&config.database_url, config.db_max_connections)
        .await
        .context("failed to connect to DATABASE_URL")?;
    let report = store.migrate().await.context("failed to apply migrations")?;
    tracing::info!(
        applied = report.applied.len(),
        version = report.current_version,
        backend = ?store.backend(),
        "schema is up to date"
    );

    // --- Service Initialization ---
    let service = Arc::new(MarketService::from_config(store, &config)?);
    if config.seed_sample_data {
        service.seed_sample_data().await?;
    }
    if config.is_development() && std::env::var("ADMIN_PASSWORD").is_err() {
        tracing::warn!("ADMIN_PASSWORD is not set; using the development placeholder");
    }

    // --- API Server Initialization ---
    let cors = match config.frontend_url.as_deref() {
        Some(origin) => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .with_context(|| format!("FRONTEND_URL '{}' is not a valid origin", origin))?,
            )
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers(Any),
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };
    let app = transport::http::create_router(transport::http::AppState { service })
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("API server listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://localhost:{}/swagger-ui", config.port);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received, stopping");
        }
    }

    Ok(())
}
