// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use airdrop_hunter::error::StoreError;
use airdrop_hunter::ingest::fetch::{PageFetcher, StaticFetcher};
use airdrop_hunter::ingest::providers::Collector;
use airdrop_hunter::ingest::registry::SourceRegistry;
use airdrop_hunter::ingest::render::RenderEngine;
use airdrop_hunter::ingest::types::{ExtractionRules, Locale, Source, SourceKind};
use airdrop_hunter::ingest::{Jitter, Pipeline};
use airdrop_hunter::store::{MemoryStore, SourceStore};

pub const DEFI_DEALS_HTML: &str = include_str!("../fixtures/defi_deals.html");
pub const GENERIC_HTML: &str = include_str!("../fixtures/generic_listing.html");
pub const SPA_SHELL_HTML: &str = include_str!("../fixtures/spa_shell.html");
pub const X_SEARCH_HTML: &str = include_str!("../fixtures/x_search.html");

pub fn source(id: &str, endpoint: &str, kind: SourceKind, priority: i32) -> Source {
    Source {
        id: id.into(),
        name: id.replace('_', " "),
        endpoint: endpoint.into(),
        kind,
        locale: Locale::En,
        priority,
        active: true,
        rules: None,
        query: None,
        last_run_at: None,
    }
}

pub fn defi_deals_rules() -> ExtractionRules {
    ExtractionRules {
        container: Some(".airdrop-card".into()),
        name: Some("h3.airdrop-title".into()),
        description: Some(".airdrop-description".into()),
        category: Some(".airdrop-category".into()),
        chain: Some(".airdrop-chain".into()),
        website: Some(".airdrop-website".into()),
        handle: None,
    }
}

/// Pipeline over an in-memory store with no jitter.
pub async fn pipeline(
    store: Arc<MemoryStore>,
    sources: Vec<Source>,
    collector: Collector,
) -> Pipeline {
    let registry = SourceRegistry::new(store.clone());
    registry.seed(sources).await.expect("seed sources");
    Pipeline::new(store.clone(), store, registry, collector).with_jitter(Jitter::none())
}

pub fn collector(http: StaticFetcher) -> Collector {
    Collector::new(Arc::new(http))
}

pub fn renderer(backend: Arc<StaticFetcher>) -> Arc<RenderEngine> {
    let backend: Arc<dyn PageFetcher> = backend;
    RenderEngine::open(backend, 1)
}

/// Source store whose listing always errors, or panics when `panics` is set.
pub struct BrokenSources {
    pub panics: bool,
}

#[async_trait]
impl SourceStore for BrokenSources {
    async fn upsert(&self, _source: Source) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Source>, StoreError> {
        if self.panics {
            panic!("source listing blew up");
        }
        Err(StoreError::Backend("sources table unavailable".into()))
    }

    async fn touch_last_run(&self, _id: &str, _at: DateTime<Utc>) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Pipeline over `store` for records and run logs, with sources served by `BrokenSources`.
pub fn broken_source_pipeline(store: Arc<MemoryStore>, panics: bool) -> Pipeline {
    let registry = SourceRegistry::new(Arc::new(BrokenSources { panics }));
    Pipeline::new(store.clone(), store, registry, collector(StaticFetcher::new()))
        .with_jitter(Jitter::none())
}
