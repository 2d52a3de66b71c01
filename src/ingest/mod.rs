// src/ingest/mod.rs
pub mod config;
pub mod fetch;
pub mod normalize;
pub mod providers;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod types;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::dedup::{BatchDedup, BatchHit, DedupAction, Deduplicator};
use crate::error::{CollectError, StoreError};
use crate::ingest::normalize::normalize_record;
use crate::ingest::providers::Collector;
use crate::ingest::registry::SourceRegistry;
use crate::ingest::types::{Source, SourceKind};
use crate::model::{NewRecord, RecordPatch, RunLog, RunStatus};
use crate::store::{RecordFilter, RecordStore, RunLogSink};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_records_total", "Raw records extracted from sources.");
        describe_counter!(
            "ingest_rejected_total",
            "Candidates rejected by validation heuristics."
        );
        describe_counter!("ingest_inserted_total", "Canonical records inserted.");
        describe_counter!(
            "ingest_duplicates_total",
            "Candidates dropped as duplicates, by tier."
        );
        describe_counter!(
            "ingest_updated_total",
            "Stored records enriched from a duplicate candidate."
        );
        describe_counter!("ingest_source_errors_total", "Source fetch/extraction errors.");
        describe_counter!("ingest_store_errors_total", "Canonical store failures.");
        describe_histogram!("ingest_source_ms", "Per-source run time in milliseconds.");
        describe_histogram!("ingest_parse_ms", "Page extraction time in milliseconds.");
        describe_gauge!(
            "ingest_cycle_last_run_ts",
            "Unix ts when a collection cycle last finished."
        );
        describe_gauge!("render_sessions_open", "Rendering sessions currently held.");
        describe_counter!("scheduler_runs_total", "Scheduled runs fired, by job.");
    });
}

/// Run-log id for a cycle that failed before reaching any source.
pub const CYCLE_SOURCE_ID: &str = "cycle";

/// Which sources a cycle covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleScope {
    All,
    Kinds(Vec<SourceKind>),
}

impl CycleScope {
    /// Webpage and social sources only.
    pub fn secondary() -> Self {
        CycleScope::Kinds(vec![SourceKind::Webpage, SourceKind::SocialSearch])
    }

    fn includes(&self, kind: SourceKind) -> bool {
        match self {
            CycleScope::All => true,
            CycleScope::Kinds(kinds) => kinds.contains(&kind),
        }
    }
}

/// Randomized pause between sources, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl Default for Jitter {
    fn default() -> Self {
        Self {
            min_ms: 1_000,
            max_ms: 3_000,
        }
    }
}

impl Jitter {
    pub fn none() -> Self {
        Self { min_ms: 0, max_ms: 0 }
    }

    fn sample(&self) -> Duration {
        if self.max_ms == 0 {
            return Duration::ZERO;
        }
        let lo = self.min_ms.min(self.max_ms);
        Duration::from_millis(rand::rng().random_range(lo..=self.max_ms))
    }
}

/// Merge candidate left for review instead of being inserted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingMerge {
    pub candidate: String,
    pub source_id: String,
    pub existing_id: Option<Uuid>,
    pub existing_name: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    /// Records inserted.
    pub success: usize,
    pub duplicates: usize,
    pub errors: usize,
    pub updated: usize,
    pub rejected: usize,
    pub pending_merges: Vec<PendingMerge>,
    pub sources: Vec<RunLog>,
}

#[derive(Debug, Default)]
struct SourceTally {
    inserted: usize,
    store_errors: usize,
    last_store_error: Option<String>,
}

/// The collection pipeline: registry -> collector -> normalizer -> deduplicator -> store.
#[derive(Clone)]
pub struct Pipeline {
    records: Arc<dyn RecordStore>,
    runlog: Arc<dyn RunLogSink>,
    registry: SourceRegistry,
    collector: Collector,
    dedup: Deduplicator,
    jitter: Jitter,
}

impl Pipeline {
    pub fn new(
        records: Arc<dyn RecordStore>,
        runlog: Arc<dyn RunLogSink>,
        registry: SourceRegistry,
        collector: Collector,
    ) -> Self {
        Self {
            dedup: Deduplicator::new(Arc::clone(&records)),
            records,
            runlog,
            registry,
            collector,
            jitter: Jitter::default(),
        }
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    pub fn runlog(&self) -> &Arc<dyn RunLogSink> {
        &self.runlog
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    /// Run one cycle over the active sources in `scope`, strictly sequentially and
    /// priority-descending. A failing source is logged and the cycle moves on.
    pub async fn run_cycle(&self, scope: CycleScope) -> CycleReport {
        ensure_metrics_described();
        let mut report = CycleReport::default();

        let sources: Vec<Source> = match self.registry.list_active_by_priority_desc().await {
            Ok(v) => v.into_iter().filter(|s| scope.includes(s.kind)).collect(),
            Err(e) => {
                tracing::error!(target: "ingest", error = %e, "listing sources failed");
                counter!("ingest_store_errors_total").increment(1);
                report.errors += 1;
                let entry = RunLog {
                    source_id: CYCLE_SOURCE_ID.to_string(),
                    status: RunStatus::Failed,
                    items_found: 0,
                    records_inserted: 0,
                    duration_ms: 0,
                    error_message: Some(e.to_string()),
                    ts: Utc::now(),
                };
                if let Err(e) = self.runlog.append(entry.clone()).await {
                    tracing::warn!(target: "ingest", error = %e, "run log append failed");
                }
                report.sources.push(entry);
                return report;
            }
        };
        tracing::info!(target: "ingest", sources = sources.len(), scope = ?scope, "cycle started");

        let mut batch = BatchDedup::new();
        for (i, source) in sources.iter().enumerate() {
            if i > 0 {
                let pause = self.jitter.sample();
                if !pause.is_zero() {
                    tokio::time::sleep(pause).await;
                }
            }
            let entry = self.run_source(source, &mut batch, &mut report).await;
            if let Err(e) = self.runlog.append(entry.clone()).await {
                tracing::warn!(target: "ingest", source = %source.id, error = %e, "run log append failed");
                counter!("ingest_store_errors_total").increment(1);
            }
            if let Err(e) = self.registry.mark_run(&source.id, entry.ts).await {
                tracing::debug!(target: "ingest", source = %source.id, error = %e, "last_run_at not updated");
            }
            report.sources.push(entry);
        }

        if let Err(e) = self.records.flush().await {
            tracing::warn!(target: "ingest", error = %e, "store flush failed");
            counter!("ingest_store_errors_total").increment(1);
        }

        gauge!("ingest_cycle_last_run_ts").set(Utc::now().timestamp().max(0) as f64);
        tracing::info!(
            target: "ingest",
            inserted = report.success,
            duplicates = report.duplicates,
            updated = report.updated,
            rejected = report.rejected,
            errors = report.errors,
            pending_merges = report.pending_merges.len(),
            "cycle finished"
        );
        report
    }

    async fn run_source(
        &self,
        source: &Source,
        batch: &mut BatchDedup,
        report: &mut CycleReport,
    ) -> RunLog {
        let t0 = Instant::now();
        let collected = self.collector.collect(source).await;
        let (status, items_found, mut error_message, tally) = match collected {
            Ok(raw) => {
                let n = raw.len();
                counter!("ingest_records_total").increment(n as u64);
                let tally = self.ingest_batch(source, raw, batch, report).await;
                let status = if n == 0 || tally.store_errors > 0 {
                    RunStatus::Partial
                } else {
                    RunStatus::Success
                };
                (status, n, None, tally)
            }
            Err(CollectError::Extraction(msg)) => {
                tracing::warn!(target: "ingest", source = %source.id, error = %msg, "extraction failed");
                counter!("ingest_source_errors_total", "kind" => "extraction").increment(1);
                (RunStatus::Partial, 0, Some(msg), SourceTally::default())
            }
            Err(CollectError::Fetch(e)) => {
                tracing::warn!(target: "ingest", source = %source.id, error = %e, "source fetch failed");
                counter!("ingest_source_errors_total", "kind" => "fetch").increment(1);
                report.errors += 1;
                (RunStatus::Failed, 0, Some(e.to_string()), SourceTally::default())
            }
        };
        if error_message.is_none() {
            error_message = tally.last_store_error.clone();
        }

        let elapsed = t0.elapsed();
        histogram!("ingest_source_ms", "source" => source.id.clone())
            .record(elapsed.as_secs_f64() * 1_000.0);
        tracing::info!(
            target: "ingest",
            source = %source.id,
            status = ?status,
            items = items_found,
            inserted = tally.inserted,
            ms = elapsed.as_millis() as u64,
            "source done"
        );

        RunLog {
            source_id: source.id.clone(),
            status,
            items_found,
            records_inserted: tally.inserted,
            duration_ms: elapsed.as_millis() as u64,
            error_message,
            ts: Utc::now(),
        }
    }

    async fn ingest_batch(
        &self,
        source: &Source,
        raw: Vec<types::RawRecord>,
        batch: &mut BatchDedup,
        report: &mut CycleReport,
    ) -> SourceTally {
        let mut tally = SourceTally::default();
        for r in raw {
            let candidate = match normalize_record(r, source) {
                Ok(c) => c,
                Err(reason) => {
                    tracing::trace!(target: "ingest", source = %source.id, %reason, "candidate rejected");
                    counter!("ingest_rejected_total", "reason" => "validation").increment(1);
                    report.rejected += 1;
                    continue;
                }
            };

            if let Err(hit) = batch.admit(&candidate) {
                let tier = match hit {
                    BatchHit::Name => "batch_name",
                    BatchHit::Website => "batch_website",
                    BatchHit::Fingerprint => "batch_fingerprint",
                };
                counter!("ingest_duplicates_total", "tier" => tier).increment(1);
                report.duplicates += 1;
                continue;
            }

            match self.store_candidate(source, candidate, report).await {
                Ok(true) => tally.inserted += 1,
                Ok(false) => {}
                Err(e) => {
                    counter!("ingest_store_errors_total").increment(1);
                    report.errors += 1;
                    tally.store_errors += 1;
                    tally.last_store_error = Some(e.to_string());
                }
            }
        }
        tally
    }

    /// Cross-store check, then insert / enrich / report. `Ok(true)` when a record was inserted.
    async fn store_candidate(
        &self,
        source: &Source,
        candidate: NewRecord,
        report: &mut CycleReport,
    ) -> Result<bool, StoreError> {
        let verdict = self.dedup.check(&candidate).await.map_err(|e| {
            tracing::warn!(target: "dedup", name = %candidate.name, error = %e, "duplicate check failed");
            e
        })?;

        let Some(m) = verdict.matched else {
            let name = candidate.name.clone();
            let id = self.records.insert(candidate).await.map_err(|e| {
                tracing::warn!(target: "ingest", %name, error = %e, "insert failed");
                e
            })?;
            counter!("ingest_inserted_total").increment(1);
            report.success += 1;
            tracing::debug!(target: "ingest", %name, %id, "record inserted");
            return Ok(true);
        };

        match m.action {
            DedupAction::Skip => {
                counter!("ingest_duplicates_total", "tier" => m.match_type.as_str()).increment(1);
                report.duplicates += 1;
            }
            DedupAction::UpdateExisting => {
                counter!("ingest_duplicates_total", "tier" => m.match_type.as_str()).increment(1);
                report.duplicates += 1;
                if let Some(id) = m.existing_id {
                    let existing = self.records.select(&RecordFilter::Ids(vec![id])).await?;
                    if let Some(rec) = existing.first() {
                        let patch = RecordPatch::fill_missing(rec, &candidate);
                        if !patch.is_empty() {
                            self.records.update_fields(id, &patch).await?;
                            counter!("ingest_updated_total").increment(1);
                            report.updated += 1;
                            tracing::info!(target: "ingest", name = %rec.name, %id, "stored record enriched");
                        }
                    }
                }
            }
            DedupAction::Merge => {
                tracing::info!(
                    target: "dedup",
                    candidate = %candidate.name,
                    existing = ?m.existing_name,
                    score = m.similarity,
                    tier = m.match_type.as_str(),
                    "merge candidate held for review"
                );
                report.pending_merges.push(PendingMerge {
                    candidate: candidate.name,
                    source_id: source.id.clone(),
                    existing_id: m.existing_id,
                    existing_name: m.existing_name,
                    score: m.similarity,
                });
            }
        }
        Ok(false)
    }
}
