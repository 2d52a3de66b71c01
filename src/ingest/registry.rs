// src/ingest/registry.rs
//! Source registry over an injected `SourceStore`.

use std::sync::Arc;

use crate::error::StoreError;
use crate::ingest::types::Source;
use crate::store::SourceStore;

#[derive(Clone)]
pub struct SourceRegistry {
    store: Arc<dyn SourceStore>,
}

impl SourceRegistry {
    pub fn new(store: Arc<dyn SourceStore>) -> Self {
        Self { store }
    }

    /// Idempotent by id.
    pub async fn upsert(&self, source: Source) -> Result<(), StoreError> {
        tracing::debug!(target: "ingest", source = %source.id, kind = source.kind.as_str(), "source upserted");
        self.store.upsert(source).await
    }

    pub async fn seed(&self, sources: Vec<Source>) -> Result<usize, StoreError> {
        let n = sources.len();
        for s in sources {
            self.upsert(s).await?;
        }
        tracing::info!(target: "ingest", sources = n, "source registry seeded");
        Ok(n)
    }

    /// Active sources, highest priority first; ties broken by id for a stable order.
    pub async fn list_active_by_priority_desc(&self) -> Result<Vec<Source>, StoreError> {
        let mut v = self.store.list_active().await?;
        v.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(v)
    }

    pub async fn mark_run(&self, id: &str, at: chrono::DateTime<chrono::Utc>) -> Result<(), StoreError> {
        self.store.touch_last_run(id, at).await
    }
}
