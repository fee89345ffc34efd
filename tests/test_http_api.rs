//! End-to-end HTTP test: serve the router on an ephemeral port and drive it with reqwest.

use chrono::Duration;
use durian_runtuh::app::AdminCredentials;
use durian_runtuh::crypto::TokenCodec;
use durian_runtuh::domain::FALLBACK_POSITION;
use durian_runtuh::{transport, MarketService, SqliteMarketStore};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;

async fn spawn_server() -> Result<String, Box<dyn std::error::Error>> {
    let store = SqliteMarketStore::in_memory().await?;
    let service = MarketService::new(
        Arc::new(store),
        TokenCodec::new("http-test-secret", Duration::hours(2), Duration::days(7)),
        AdminCredentials::new("admin", "durian-admin")?,
        FALLBACK_POSITION,
    );
    let router = transport::http::create_router(transport::http::AppState {
        service: Arc::new(service),
    });

    // Bind to an ephemeral port to avoid conflicts if an API server is already running.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Ok(format!("http://127.0.0.1:{}", port))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn owner_flow_over_http() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = spawn_server().await?;
    let client = reqwest::Client::new();

    let health = client.get(format!("{}/api/health", base_url)).send().await?;
    assert_eq!(health.status(), StatusCode::OK);

    // --- REGISTER ---
    let resp = client
        .post(format!("{}/api/auth/register", base_url))
        .json(&json!({
            "name": "Mei Ling",
            "email": "mei@example.com",
            "password": "durian88",
            "phone": "+60 13-555 0101",
            "stall": {
                "name": "Mei's Musang King",
                "address": "Jalan Tun Sambanthan, Brickfields",
                "state": "Kuala Lumpur",
                "latitude": 3.1300,
                "longitude": 101.6850
            }
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user"]["email"], "mei@example.com");
    let token = body["data"]["token"].as_str().expect("token").to_string();

    // --- POST STOCK ---
    let resp = client
        .post(format!("{}/api/my/stock", base_url))
        .bearer_auth(&token)
        .json(&json!({
            "varieties": [
                { "name": "Musang King", "price": 45, "stock": "high" },
                { "name": "Black Thorn", "price": "35", "stock": "medium" }
            ]
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // --- PUBLIC LIST ---
    let body: Value = client
        .get(format!("{}/api/stalls", base_url))
        .send()
        .await?
        .json()
        .await?;
    let stalls = body["data"].as_array().expect("stall list");
    assert_eq!(stalls.len(), 1);
    let stall = &stalls[0];
    assert_eq!(stall["name"], "Mei's Musang King");
    assert!(stall.get("ownerId").is_none());
    assert_eq!(stall["latestUpdate"]["varieties"][0]["name"], "Musang King");
    assert_eq!(stall["latestUpdate"]["varieties"][0]["price"], 45.0);
    assert_eq!(stall["latestUpdate"]["varieties"][1]["stock"], "medium");
    assert!(stall["latestUpdate"]["lastUpdated"].is_string());
    let stall_id = stall["id"].as_i64().expect("stall id");

    let filtered: Value = client
        .get(format!("{}/api/stalls?state=selangor", base_url))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(filtered["data"].as_array().map(Vec::len), Some(0));

    // --- MY STALL / ME ---
    let resp = client
        .get(format!("{}/api/my/stall", base_url))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = client
        .get(format!("{}/api/auth/me", base_url))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .put(format!("{}/api/stalls/{}", base_url, stall_id))
        .bearer_auth(&token)
        .json(&json!({ "name": "Mei's Durian", "address": "Brickfields" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    // --- FAILURE PATHS ---
    let resp = client
        .post(format!("{}/api/my/stock", base_url))
        .json(&json!({ "varieties": [] }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .post(format!("{}/api/my/stock", base_url))
        .bearer_auth("not-a-jwt")
        .json(&json!({ "varieties": [] }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .post(format!("{}/api/my/stock", base_url))
        .bearer_auth(&token)
        .json(&json!({ "varieties": [{ "name": "D24", "stock": "plenty" }] }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap_or_default().contains("varieties[0]"));

    let resp = client
        .post(format!("{}/api/my/stock", base_url))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = client
        .get(format!("{}/api/admin/stalls", base_url))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = client
        .post(format!("{}/api/auth/login", base_url))
        .json(&json!({ "email": "mei@example.com", "password": "wrong-one" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = client
        .post(format!("{}/api/auth/register", base_url))
        .json(&json!({
            "name": "Mei Again",
            "email": "MEI@example.com",
            "password": "durian88",
            "stall": { "name": "Copy", "address": "Somewhere" }
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = client
        .get(format!("{}/api/stalls/999999", base_url))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn admin_flow_over_http() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = spawn_server().await?;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/admin/login", base_url))
        .json(&json!({ "username": "admin", "password": "wrong" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = client
        .post(format!("{}/api/admin/login", base_url))
        .json(&json!({ "username": "admin", "password": "durian-admin" }))
        .send()
        .await?
        .json()
        .await?;
    let admin = body["data"]["token"].as_str().expect("admin token").to_string();
    assert_eq!(body["data"]["expiresIn"], 7200);

    // --- CREATE ---
    let resp = client
        .post(format!("{}/api/admin/stalls", base_url))
        .bearer_auth(&admin)
        .json(&json!({
            "name": "Raub Orchard Stall",
            "address": "Jalan Lipis, Raub",
            "state": "Pahang",
            "varieties": [{ "name": "D24 Sultan", "price": 25, "stock": "low" }]
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = resp.json().await?;
    let id = body["data"]["id"].as_i64().expect("new stall id");

    // No coordinates: public view uses the fallback, admin view keeps nulls.
    let public: Value = client
        .get(format!("{}/api/stalls/{}", base_url, id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(public["data"]["latitude"], FALLBACK_POSITION.latitude);
    let listed: Value = client
        .get(format!("{}/api/admin/stalls", base_url))
        .bearer_auth(&admin)
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(listed["data"][0]["id"], id);
    assert!(listed["data"][0]["latitude"].is_null());
    assert!(listed["data"][0]["ownerId"].is_null());

    // --- EDIT ---
    let resp = client
        .put(format!("{}/api/admin/stalls/{}", base_url, id))
        .bearer_auth(&admin)
        .json(&json!({
            "name": "Raub Orchard Stall",
            "address": "Jalan Lipis, Raub",
            "state": "Pahang",
            "latitude": 3.7930,
            "longitude": 101.8570,
            "varieties": [{ "name": "D24 Sultan", "price": 25, "stock": "sold-out" }]
        }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let public: Value = client
        .get(format!("{}/api/stalls/{}", base_url, id))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(public["data"]["latitude"], 3.7930);
    assert_eq!(public["data"]["latestUpdate"]["varieties"][0]["stock"], "sold-out");

    let resp = client
        .post(format!("{}/api/admin/migrate", base_url))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    // --- DELETE (idempotent) ---
    for expected in [1, 0] {
        let body: Value = client
            .delete(format!("{}/api/admin/stalls/{}", base_url, id))
            .bearer_auth(&admin)
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(body["data"]["deleted"], expected);
    }

    let resp = client
        .delete(format!("{}/api/admin/stalls/{}", base_url, id))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn malformed_stall_ids_get_the_error_envelope() -> Result<(), Box<dyn std::error::Error>> {
    let base_url = spawn_server().await?;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/stalls/abc", base_url))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap_or_default().contains("stall id"));

    let body: Value = client
        .post(format!("{}/api/admin/login", base_url))
        .json(&json!({ "username": "admin", "password": "durian-admin" }))
        .send()
        .await?
        .json()
        .await?;
    let admin = body["data"]["token"].as_str().expect("admin token").to_string();

    let resp = client
        .delete(format!("{}/api/admin/stalls/not-a-number", base_url))
        .bearer_auth(&admin)
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert_eq!(body["success"], false);

    let resp = client
        .put(format!("{}/api/stalls/12.5", base_url))
        .json(&json!({ "name": "x", "address": "y" }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await?;
    assert_eq!(body["success"], false);

    Ok(())
}
