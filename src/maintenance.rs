// src/maintenance.rs
//! Store-only jobs: urgent check, run-log retention, featured recompute.
//!
//! None of these touch the network. Each writes one aggregate `RunLog`.

use std::time::Instant;

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;

use crate::error::StoreError;
use crate::model::{CanonicalRecord, RecordPatch, RunLog, RunStatus, Status};
use crate::store::{RecordFilter, RecordStore, RunLogSink};

pub const URGENT_SOURCE_ID: &str = "urgent_check";
pub const MAINTENANCE_SOURCE_ID: &str = "maintenance";

pub const URGENT_MIN_PRIORITY: i32 = 8;
pub const URGENT_LIMIT: usize = 10;

pub const FEATURED_THRESHOLD: i32 = 8;
pub const FEATURED_TOP_K: usize = 10;
pub const FEATURED_EVALUATED: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeaturedPolicy {
    pub threshold: i32,
    pub top_k: usize,
    /// Cap on the evaluated set; `None` evaluates every candidate.
    pub limit: Option<usize>,
}

impl Default for FeaturedPolicy {
    fn default() -> Self {
        Self {
            threshold: FEATURED_THRESHOLD,
            top_k: FEATURED_TOP_K,
            limit: Some(FEATURED_EVALUATED),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeaturedReport {
    pub evaluated: usize,
    pub featured: usize,
    pub unfeatured: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub purged_logs: usize,
    pub featured: FeaturedReport,
}

/// Priority descending, newest first on ties.
fn by_priority_desc(records: &mut [CanonicalRecord]) {
    records.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

/// High-priority pending records, without scraping.
pub async fn urgent_check(store: &dyn RecordStore) -> Result<Vec<CanonicalRecord>, StoreError> {
    let filter = RecordFilter::All(vec![
        RecordFilter::Status(Status::Upcoming),
        RecordFilter::MinPriority(URGENT_MIN_PRIORITY),
    ]);
    let mut hits = store.select(&filter).await?;
    by_priority_desc(&mut hits);
    hits.truncate(URGENT_LIMIT);
    Ok(hits)
}

/// Urgent check plus its aggregate run log.
pub async fn run_urgent_check(store: &dyn RecordStore, runlog: &dyn RunLogSink) -> RunLog {
    let t0 = Instant::now();
    let entry = match urgent_check(store).await {
        Ok(hits) => {
            for r in &hits {
                tracing::info!(target: "maintenance", name = %r.name, priority = r.priority, "high-priority airdrop pending");
            }
            aggregate(URGENT_SOURCE_ID, RunStatus::Success, hits.len(), None, t0)
        }
        Err(e) => {
            tracing::warn!(target: "maintenance", error = %e, "urgent check failed");
            aggregate(URGENT_SOURCE_ID, RunStatus::Failed, 0, Some(e.to_string()), t0)
        }
    };
    append(runlog, entry).await
}

pub async fn purge_run_logs(runlog: &dyn RunLogSink, retention_days: i64) -> Result<usize, StoreError> {
    let cutoff = Utc::now() - ChronoDuration::days(retention_days);
    let n = runlog.purge_older_than(cutoff).await?;
    tracing::info!(target: "maintenance", purged = n, retention_days, "old run logs purged");
    Ok(n)
}

/// Mark the top `top_k` of the evaluated set featured and the rest of that set unfeatured.
/// Records outside the evaluated set are left alone.
pub async fn recompute_featured(
    store: &dyn RecordStore,
    policy: FeaturedPolicy,
) -> Result<FeaturedReport, StoreError> {
    let filter = RecordFilter::Any(vec![
        RecordFilter::MinPriority(policy.threshold),
        RecordFilter::Status(Status::Upcoming),
    ]);
    let mut candidates = store.select(&filter).await?;
    by_priority_desc(&mut candidates);
    if let Some(limit) = policy.limit {
        candidates.truncate(limit);
    }

    let mut report = FeaturedReport {
        evaluated: candidates.len(),
        ..FeaturedReport::default()
    };
    for (i, rec) in candidates.iter().enumerate() {
        let on = i < policy.top_k;
        match store.update_fields(rec.id, &RecordPatch::featured(on)).await {
            Ok(()) if on => report.featured += 1,
            Ok(()) => report.unfeatured += 1,
            Err(e) => {
                tracing::warn!(target: "maintenance", name = %rec.name, error = %e, "featured update failed");
                report.failed += 1;
            }
        }
    }
    tracing::info!(
        target: "maintenance",
        evaluated = report.evaluated,
        featured = report.featured,
        failed = report.failed,
        "featured recomputed"
    );
    Ok(report)
}

/// Purge, recompute featured, flush, and write one aggregate run log.
pub async fn run_maintenance(
    store: &dyn RecordStore,
    runlog: &dyn RunLogSink,
    retention_days: i64,
) -> (MaintenanceReport, RunLog) {
    let t0 = Instant::now();
    let mut report = MaintenanceReport::default();
    let mut errors: Vec<String> = Vec::new();

    match purge_run_logs(runlog, retention_days).await {
        Ok(n) => report.purged_logs = n,
        Err(e) => errors.push(format!("purge: {e}")),
    }
    match recompute_featured(store, FeaturedPolicy::default()).await {
        Ok(f) => {
            if f.failed > 0 {
                errors.push(format!("{} featured updates failed", f.failed));
            }
            report.featured = f;
        }
        Err(e) => errors.push(format!("featured: {e}")),
    }
    if let Err(e) = store.flush().await {
        errors.push(format!("flush: {e}"));
    }

    let status = if errors.is_empty() {
        RunStatus::Success
    } else if report.featured.evaluated > 0 || report.purged_logs > 0 {
        RunStatus::Partial
    } else {
        RunStatus::Failed
    };
    let message = (!errors.is_empty()).then(|| errors.join("; "));
    let entry = aggregate(
        MAINTENANCE_SOURCE_ID,
        status,
        report.featured.evaluated,
        message,
        t0,
    );
    (report, append(runlog, entry).await)
}

fn aggregate(
    source_id: &str,
    status: RunStatus,
    items_found: usize,
    error_message: Option<String>,
    t0: Instant,
) -> RunLog {
    RunLog {
        source_id: source_id.to_string(),
        status,
        items_found,
        records_inserted: 0,
        duration_ms: t0.elapsed().as_millis() as u64,
        error_message,
        ts: Utc::now(),
    }
}

async fn append(runlog: &dyn RunLogSink, entry: RunLog) -> RunLog {
    if let Err(e) = runlog.append(entry.clone()).await {
        tracing::warn!(target: "maintenance", source = %entry.source_id, error = %e, "run log append failed");
    }
    entry
}
