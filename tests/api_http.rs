// tests/api_http.rs
//
// HTTP-level tests for the Router without opening sockets, via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /api/scrape (bearer auth + report fields)
// - POST /api/admin/cleanup-duplicates
// - GET /debug/runs

mod common;

use std::sync::Arc;

use serde_json::Value as Json;
use http::StatusCode;
use shuttle_axum::axum::{
    body::{self, Body},
    http::Request,
    Router,
};
use tower::ServiceExt as _;

use airdrop_hunter::api::{self, AppState};
use airdrop_hunter::ingest::fetch::StaticFetcher;
use airdrop_hunter::ingest::types::SourceKind;
use airdrop_hunter::store::MemoryStore;
use common::*;

const BODY_LIMIT: usize = 1024 * 1024;
const TOKEN: &str = "s3cret";
const LIST: &str = "https://aggregator.test/list";

async fn test_router(store: Arc<MemoryStore>, token: Option<&str>) -> Router {
    let http = StaticFetcher::new().page(LIST, GENERIC_HTML);
    let p = pipeline(
        store,
        vec![source("aggregator", LIST, SourceKind::Webpage, 5)],
        collector(http),
    )
    .await;
    api::router(AppState::new(p, token.map(String::from)))
}

fn post(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut b = Request::builder().method("POST").uri(uri);
    if let Some(t) = bearer {
        b = b.header("authorization", format!("Bearer {t}"));
    }
    b.body(Body::empty()).expect("build POST")
}

async fn json_body(resp: shuttle_axum::axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    serde_json::from_slice(&bytes).expect("parse json")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router(Arc::new(MemoryStore::new()), Some(TOKEN)).await;
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");

    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(String::from_utf8_lossy(&bytes).trim(), "OK");
}

#[tokio::test]
async fn scrape_rejects_missing_and_wrong_tokens() {
    let store = Arc::new(MemoryStore::new());
    let app = test_router(store.clone(), Some(TOKEN)).await;

    for bearer in [None, Some("nope"), Some("s3cre"), Some("s3cret2")] {
        let resp = app
            .clone()
            .oneshot(post("/api/scrape", bearer))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "bearer {bearer:?}");
        assert_eq!(json_body(resp).await["error"], "Unauthorized");
    }
    assert_eq!(store.record_count(), 0, "no cycle should have run");
}

#[tokio::test]
async fn scrape_without_configured_token_is_always_unauthorized() {
    let app = test_router(Arc::new(MemoryStore::new()), Some("  ")).await;
    let resp = app.oneshot(post("/api/scrape", Some(""))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn scrape_with_token_runs_a_cycle() {
    let store = Arc::new(MemoryStore::new());
    let app = test_router(store.clone(), Some(TOKEN)).await;

    let resp = app
        .clone()
        .oneshot(post("/api/scrape", Some(TOKEN)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["success"], 3);
    assert_eq!(v["duplicates"], 0);
    assert_eq!(v["errors"], 0);
    assert_eq!(v["updated"], 0);
    let ts = v["timestamp"].as_str().expect("timestamp");
    assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    assert_eq!(store.record_count(), 3);

    // run log is visible through the debug route
    let req = Request::builder()
        .uri("/debug/runs?limit=5")
        .body(Body::empty())
        .unwrap();
    let runs = json_body(app.oneshot(req).await.unwrap()).await;
    let runs = runs.as_array().expect("array");
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["source_id"], "aggregator");
    assert_eq!(runs[0]["status"], "success");
}

#[tokio::test]
async fn cleanup_requires_token_and_reports_counts() {
    let store = Arc::new(MemoryStore::new());
    let app = test_router(store, Some(TOKEN)).await;

    let resp = app
        .clone()
        .oneshot(post("/api/admin/cleanup-duplicates", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .oneshot(post("/api/admin/cleanup-duplicates", Some(TOKEN)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = json_body(resp).await;
    assert_eq!(v["cleaned"], 0);
    assert_eq!(v["errors"], 0);
}
