// src/store.rs
//! Collaborator interfaces (canonical record store, run-log sink, source-config store) and an
//! in-memory implementation with optional JSON snapshotting.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::ingest::types::Source;
use crate::model::{CanonicalRecord, NewRecord, RecordPatch, RunLog, Status};

/// Predicate for `select` / `delete`.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordFilter {
    Everything,
    Ids(Vec<Uuid>),
    Status(Status),
    MinPriority(i32),
    Any(Vec<RecordFilter>),
    All(Vec<RecordFilter>),
}

impl RecordFilter {
    pub fn matches(&self, r: &CanonicalRecord) -> bool {
        match self {
            RecordFilter::Everything => true,
            RecordFilter::Ids(ids) => ids.contains(&r.id),
            RecordFilter::Status(s) => r.status == *s,
            RecordFilter::MinPriority(p) => r.priority >= *p,
            RecordFilter::Any(fs) => fs.iter().any(|f| f.matches(r)),
            RecordFilter::All(fs) => fs.iter().all(|f| f.matches(r)),
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: NewRecord) -> Result<Uuid, StoreError>;
    async fn select(&self, filter: &RecordFilter) -> Result<Vec<CanonicalRecord>, StoreError>;
    async fn update_fields(&self, id: Uuid, patch: &RecordPatch) -> Result<(), StoreError>;
    async fn delete(&self, filter: &RecordFilter) -> Result<usize, StoreError>;

    /// Persist buffered state, if the backend buffers anything.
    async fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
pub trait RunLogSink: Send + Sync {
    async fn append(&self, entry: RunLog) -> Result<(), StoreError>;
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
    /// Newest first.
    async fn recent(&self, limit: usize) -> Result<Vec<RunLog>, StoreError>;
}

#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn upsert(&self, source: Source) -> Result<(), StoreError>;
    async fn list_active(&self) -> Result<Vec<Source>, StoreError>;
    async fn touch_last_run(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Inner {
    records: Vec<CanonicalRecord>,
    #[serde(default)]
    logs: Vec<RunLog>,
    #[serde(default)]
    sources: BTreeMap<String, Source>,
}

/// Process-local store implementing all three collaborator interfaces.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `path` if it exists; `flush` writes back to the same path.
    pub async fn with_snapshot(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let inner = match tokio::fs::read_to_string(&path).await {
            Ok(s) => serde_json::from_str(&s)
                .with_context(|| format!("parsing store snapshot {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Inner::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading store snapshot {}", path.display()))
            }
        };
        tracing::info!(
            target: "store",
            path = %path.display(),
            records = inner.records.len(),
            "store snapshot loaded"
        );
        Ok(Self {
            inner: Mutex::new(inner),
            snapshot_path: Some(path),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }

    pub fn record_count(&self) -> usize {
        self.lock().map(|g| g.records.len()).unwrap_or(0)
    }

    async fn write_snapshot(path: &Path, bytes: Vec<u8>) -> Result<(), StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::Backend(format!("snapshot dir: {e}")))?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::Backend(format!("snapshot write: {e}")))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::Backend(format!("snapshot rename: {e}")))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, record: NewRecord) -> Result<Uuid, StoreError> {
        if record.name.trim().is_empty() {
            return Err(StoreError::Invalid("name must not be empty".into()));
        }
        let id = Uuid::new_v4();
        let rec = CanonicalRecord::from_new(record, id, Utc::now());
        self.lock()?.records.push(rec);
        Ok(id)
    }

    async fn select(&self, filter: &RecordFilter) -> Result<Vec<CanonicalRecord>, StoreError> {
        let g = self.lock()?;
        Ok(g.records.iter().filter(|r| filter.matches(r)).cloned().collect())
    }

    async fn update_fields(&self, id: Uuid, patch: &RecordPatch) -> Result<(), StoreError> {
        let mut g = self.lock()?;
        let rec = g
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        if let Some(next) = patch.status {
            if next.rank() < rec.status.rank() {
                tracing::debug!(target: "store", %id, from = ?rec.status, to = ?next, "status moved backwards");
            }
        }
        patch.apply(rec);
        rec.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, filter: &RecordFilter) -> Result<usize, StoreError> {
        let mut g = self.lock()?;
        let before = g.records.len();
        g.records.retain(|r| !filter.matches(r));
        Ok(before - g.records.len())
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let bytes = {
            let g = self.lock()?;
            serde_json::to_vec_pretty(&*g)
                .map_err(|e| StoreError::Backend(format!("snapshot encode: {e}")))?
        };
        Self::write_snapshot(path, bytes).await
    }
}

#[async_trait]
impl RunLogSink for MemoryStore {
    async fn append(&self, entry: RunLog) -> Result<(), StoreError> {
        self.lock()?.logs.push(entry);
        Ok(())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut g = self.lock()?;
        let before = g.logs.len();
        g.logs.retain(|l| l.ts >= cutoff);
        Ok(before - g.logs.len())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<RunLog>, StoreError> {
        let g = self.lock()?;
        Ok(g.logs.iter().rev().take(limit).cloned().collect())
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn upsert(&self, mut source: Source) -> Result<(), StoreError> {
        let mut g = self.lock()?;
        if let Some(prev) = g.sources.get(&source.id) {
            source.last_run_at = source.last_run_at.or(prev.last_run_at);
        }
        g.sources.insert(source.id.clone(), source);
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Source>, StoreError> {
        let g = self.lock()?;
        Ok(g.sources.values().filter(|s| s.active).cloned().collect())
    }

    async fn touch_last_run(&self, id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut g = self.lock()?;
        let src = g
            .sources
            .get_mut(id)
            .ok_or_else(|| StoreError::SourceNotFound(id.to_string()))?;
        src.last_run_at = Some(at);
        Ok(())
    }
}
