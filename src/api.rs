// src/api.rs
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shuttle_axum::axum::{
    extract::{Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use subtle::ConstantTimeEq;
use tower_http::cors::CorsLayer;

use crate::dedup::{cleanup_duplicates, CleanupReport};
use crate::error::AuthError;
use crate::ingest::{CycleScope, Pipeline};
use crate::model::RunLog;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    /// Bearer token for on-demand triggers; `None` rejects every trigger.
    pub trigger_token: Option<String>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, trigger_token: Option<String>) -> Self {
        Self {
            pipeline,
            trigger_token: trigger_token.filter(|t| !t.trim().is_empty()),
        }
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let expected = self.trigger_token.as_deref().ok_or(AuthError::NotConfigured)?;
        let provided = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Missing)?;
        if tokens_match(provided, expected) {
            Ok(())
        } else {
            Err(AuthError::Invalid)
        }
    }
}

/// Compares fixed-length digests in constant time, so neither content nor length leaks.
fn tokens_match(provided: &str, expected: &str) -> bool {
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.as_slice().ct_eq(b.as_slice()).into()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        tracing::warn!(target: "api", reason = %self, "trigger rejected");
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Unauthorized" })),
        )
            .into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/scrape", post(trigger_scrape))
        .route("/api/admin/cleanup-duplicates", post(admin_cleanup_duplicates))
        .route("/debug/runs", get(debug_runs))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct ScrapeResp {
    success: usize,
    duplicates: usize,
    errors: usize,
    updated: usize,
    timestamp: String,
}

async fn trigger_scrape(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ScrapeResp>, AuthError> {
    state.authorize(&headers)?;
    tracing::info!(target: "api", "on-demand scrape triggered");
    let r = state.pipeline.run_cycle(CycleScope::All).await;
    Ok(Json(ScrapeResp {
        success: r.success,
        duplicates: r.duplicates,
        errors: r.errors,
        updated: r.updated,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

async fn admin_cleanup_duplicates(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AuthError> {
    state.authorize(&headers)?;
    let store = state.pipeline.records();
    let resp = match cleanup_duplicates(store.as_ref()).await {
        Ok(report) => {
            if let Err(e) = store.flush().await {
                tracing::warn!(target: "api", error = %e, "store flush failed after cleanup");
            }
            Json(report).into_response()
        }
        Err(e) => {
            tracing::error!(target: "api", error = %e, "duplicate cleanup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CleanupReport {
                    cleaned: 0,
                    errors: 1,
                }),
            )
                .into_response()
        }
    };
    Ok(resp)
}

#[derive(Deserialize)]
struct RunsQuery {
    limit: Option<usize>,
}

async fn debug_runs(
    State(state): State<AppState>,
    Query(q): Query<RunsQuery>,
) -> Result<Json<Vec<RunLog>>, StatusCode> {
    let limit = q.limit.unwrap_or(20).min(500);
    state
        .pipeline
        .runlog()
        .recent(limit)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!(target: "api", error = %e, "reading run logs failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

#[cfg(test)]
mod tests {
    use super::tokens_match;

    #[test]
    fn token_match_is_exact() {
        assert!(tokens_match("s3cret", "s3cret"));
        assert!(!tokens_match("s3cre", "s3cret"));
        assert!(!tokens_match("s3cret ", "s3cret"));
        assert!(!tokens_match("S3CRET", "s3cret"));
    }
}
