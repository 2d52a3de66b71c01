// src/lib.rs
// Public library surface for integration tests (and the binary).

pub mod api;
pub mod config;
pub mod dedup;
pub mod error;
pub mod ingest;
pub mod maintenance;
pub mod metrics;
pub mod model;
pub mod store;

pub use crate::api::router;

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::axum::Router;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::api::AppState;
use crate::config::AppConfig;
use crate::ingest::config::load_sources_default;
use crate::ingest::fetch::HttpFetcher;
use crate::ingest::providers::social_search::XSearchApi;
use crate::ingest::providers::Collector;
use crate::ingest::registry::SourceRegistry;
use crate::ingest::render::{BrowserlessFetcher, RenderEngine};
use crate::ingest::Pipeline;
use crate::metrics::Metrics;
use crate::store::MemoryStore;

/// Install the global subscriber. `LOG_FORMAT=json` switches to JSON lines.
/// A subscriber installed earlier (e.g. by the hosting runtime) is left in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("airdrop_hunter=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("global tracing subscriber already set");
    }
}

/// Everything the binary serves and schedules.
pub struct App {
    pub router: Router,
    pub pipeline: Pipeline,
    pub renderer: Option<Arc<RenderEngine>>,
}

/// Wire store, registry, collectors and HTTP routes from `cfg`.
pub async fn build(cfg: &AppConfig) -> anyhow::Result<App> {
    let store = match &cfg.snapshot_path {
        Some(p) => Arc::new(MemoryStore::with_snapshot(p.clone()).await?),
        None => Arc::new(MemoryStore::new()),
    };

    let registry = SourceRegistry::new(store.clone());
    let sources = load_sources_default().context("loading source definitions")?;
    registry.seed(sources).await?;

    let http = HttpFetcher::new(cfg.fetch_timeout)?;
    let mut collector = Collector::new(Arc::new(http));

    match &cfg.render_service_url {
        Some(url) => {
            let backend = BrowserlessFetcher::new(
                url,
                cfg.render_service_token.as_deref(),
                cfg.fetch_timeout,
            )?;
            collector = collector
                .with_renderer(RenderEngine::open(Arc::new(backend), cfg.render_max_sessions));
        }
        None => tracing::warn!("RENDER_SERVICE_URL not set; rendered fallback disabled"),
    }

    if let Some(token) = &cfg.x_bearer_token {
        collector = collector.with_search(Arc::new(XSearchApi::new(token, cfg.fetch_timeout)?));
    }

    let pipeline =
        Pipeline::new(store.clone(), store.clone(), registry, collector).with_jitter(cfg.jitter);

    let renderer = pipeline.collector().renderer().cloned();
    let metrics = Metrics::init()?;
    let router = api::router(AppState::new(pipeline.clone(), cfg.trigger_token.clone()))
        .merge(metrics.router());

    Ok(App {
        router,
        pipeline,
        renderer,
    })
}
