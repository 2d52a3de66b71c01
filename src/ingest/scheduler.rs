// src/ingest/scheduler.rs
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::ingest::{CycleScope, Pipeline};
use crate::maintenance;
use crate::model::{RunLog, RunStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobKind {
    FullCycle,
    SecondaryCycle,
    UrgentCheck,
    Maintenance,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::FullCycle,
        JobKind::SecondaryCycle,
        JobKind::UrgentCheck,
        JobKind::Maintenance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::FullCycle => "full_cycle",
            JobKind::SecondaryCycle => "secondary_cycle",
            JobKind::UrgentCheck => "urgent_check",
            JobKind::Maintenance => "maintenance",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub full_interval: Duration,
    pub secondary_interval: Duration,
    pub urgent_interval: Duration,
    pub maintenance_interval: Duration,
    /// Fire every job once immediately instead of after the first interval.
    pub run_on_start: bool,
    pub retention_days: i64,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            full_interval: Duration::from_secs(6 * 3600),
            secondary_interval: Duration::from_secs(8 * 3600),
            urgent_interval: Duration::from_secs(2 * 3600),
            maintenance_interval: Duration::from_secs(24 * 3600),
            run_on_start: true,
            retention_days: 30,
        }
    }
}

impl SchedulerCfg {
    pub fn interval(&self, job: JobKind) -> Duration {
        match job {
            JobKind::FullCycle => self.full_interval,
            JobKind::SecondaryCycle => self.secondary_interval,
            JobKind::UrgentCheck => self.urgent_interval,
            JobKind::Maintenance => self.maintenance_interval,
        }
    }
}

/// Running jobs. Dropping the handle leaves them running; call `shutdown` to stop.
pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop timers and wait for in-flight runs to finish.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        for t in self.tasks {
            let _ = t.await;
        }
        tracing::info!(target: "scheduler", "scheduler stopped");
    }

    pub fn jobs(&self) -> usize {
        self.tasks.len()
    }
}

/// Spawn the four recurring jobs, each on its own timer. Runs of different jobs may overlap.
pub fn spawn_scheduler(pipeline: Pipeline, cfg: SchedulerCfg) -> SchedulerHandle {
    let (stop, rx) = watch::channel(false);
    let tasks = JobKind::ALL
        .into_iter()
        .map(|job| spawn_job(pipeline.clone(), cfg, job, rx.clone()))
        .collect();
    tracing::info!(target: "scheduler", run_on_start = cfg.run_on_start, "scheduler started");
    SchedulerHandle { stop, tasks }
}

fn spawn_job(
    pipeline: Pipeline,
    cfg: SchedulerCfg,
    job: JobKind,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = cfg.interval(job).max(Duration::from_millis(1));
        let start = if cfg.run_on_start {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                // Err means the handle was dropped; only an explicit shutdown stops the job.
                Ok(()) = stop.changed() => {
                    if *stop.borrow_and_update() {
                        break;
                    }
                    continue;
                }
            }
            counter!("scheduler_runs_total", "job" => job.as_str()).increment(1);

            // A panicking run must not take the timer down with it.
            let p = pipeline.clone();
            let retention = cfg.retention_days;
            let outcome = tokio::spawn(async move { run_job(&p, job, retention).await }).await;
            if let Err(e) = outcome {
                tracing::error!(target: "scheduler", job = job.as_str(), error = %e, "scheduled run aborted");
                let entry = RunLog {
                    source_id: job.as_str().to_string(),
                    status: RunStatus::Failed,
                    items_found: 0,
                    records_inserted: 0,
                    duration_ms: 0,
                    error_message: Some(e.to_string()),
                    ts: Utc::now(),
                };
                if let Err(e) = pipeline.runlog().append(entry).await {
                    tracing::warn!(target: "scheduler", error = %e, "run log append failed");
                }
            }
        }
    })
}

/// Execute one run of `job`.
pub async fn run_job(pipeline: &Pipeline, job: JobKind, retention_days: i64) {
    let t0 = std::time::Instant::now();
    match job {
        JobKind::FullCycle => {
            let r = pipeline.run_cycle(CycleScope::All).await;
            tracing::info!(target: "scheduler", job = job.as_str(), inserted = r.success, errors = r.errors, "run finished");
        }
        JobKind::SecondaryCycle => {
            let r = pipeline.run_cycle(CycleScope::secondary()).await;
            tracing::info!(target: "scheduler", job = job.as_str(), inserted = r.success, errors = r.errors, "run finished");
        }
        JobKind::UrgentCheck => {
            let log = maintenance::run_urgent_check(
                pipeline.records().as_ref(),
                pipeline.runlog().as_ref(),
            )
            .await;
            tracing::info!(target: "scheduler", job = job.as_str(), pending = log.items_found, "run finished");
        }
        JobKind::Maintenance => {
            let (r, _) = maintenance::run_maintenance(
                pipeline.records().as_ref(),
                pipeline.runlog().as_ref(),
                retention_days,
            )
            .await;
            tracing::info!(target: "scheduler", job = job.as_str(), purged = r.purged_logs, featured = r.featured.featured, "run finished");
        }
    }
    tracing::debug!(target: "scheduler", job = job.as_str(), ms = t0.elapsed().as_millis() as u64, "run timing");
}
