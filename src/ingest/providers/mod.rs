// src/ingest/providers/mod.rs
//! Source collectors, one module per source kind behind a single `Collector`.

pub mod social_search;
pub mod structured_api;
pub mod webpage;

use std::sync::Arc;

use crate::error::CollectError;
use crate::ingest::fetch::PageFetcher;
use crate::ingest::render::RenderEngine;
use crate::ingest::types::{RawRecord, Source, SourceKind};
use social_search::SearchProvider;

/// Fetches and extracts raw records for any source kind.
#[derive(Clone)]
pub struct Collector {
    http: Arc<dyn PageFetcher>,
    renderer: Option<Arc<RenderEngine>>,
    search: Option<Arc<dyn SearchProvider>>,
}

impl Collector {
    pub fn new(http: Arc<dyn PageFetcher>) -> Self {
        Self {
            http,
            renderer: None,
            search: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<RenderEngine>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn renderer(&self) -> Option<&Arc<RenderEngine>> {
        self.renderer.as_ref()
    }

    pub async fn collect(&self, source: &Source) -> Result<Vec<RawRecord>, CollectError> {
        match source.kind {
            SourceKind::Webpage => {
                webpage::collect(self.http.as_ref(), self.renderer.as_deref(), source).await
            }
            SourceKind::SocialSearch => {
                social_search::collect(self.search.as_deref(), self.renderer.as_deref(), source)
                    .await
            }
            SourceKind::StructuredApi => structured_api::collect(source).await,
        }
    }
}
