// tests/ingest_scheduler.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use airdrop_hunter::ingest::fetch::StaticFetcher;
use airdrop_hunter::ingest::scheduler::{run_job, spawn_scheduler, JobKind, SchedulerCfg};
use airdrop_hunter::ingest::types::SourceKind;
use airdrop_hunter::maintenance::{MAINTENANCE_SOURCE_ID, URGENT_SOURCE_ID};
use airdrop_hunter::model::{RunLog, RunStatus};
use airdrop_hunter::store::{MemoryStore, RunLogSink};
use common::*;

const LIST: &str = "https://aggregator.test/list";

fn hourly(run_on_start: bool) -> SchedulerCfg {
    let hour = Duration::from_secs(3600);
    SchedulerCfg {
        full_interval: hour,
        secondary_interval: hour,
        urgent_interval: hour,
        maintenance_interval: hour,
        run_on_start,
        retention_days: 30,
    }
}

/// Full cycle every 50ms, everything else hourly, nothing on start.
fn fast_full_cycle() -> SchedulerCfg {
    SchedulerCfg {
        full_interval: Duration::from_millis(50),
        ..hourly(false)
    }
}

async fn wait_for_logs(store: &MemoryStore, want: impl Fn(&[RunLog]) -> bool) -> Vec<RunLog> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let logs = store.recent(50).await.unwrap();
            if want(&logs) {
                return logs;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("expected scheduled runs did not happen")
}

async fn aggregator_pipeline(store: Arc<MemoryStore>) -> airdrop_hunter::ingest::Pipeline {
    let http = StaticFetcher::new().page(LIST, GENERIC_HTML);
    pipeline(
        store,
        vec![source("aggregator", LIST, SourceKind::Webpage, 5)],
        collector(http),
    )
    .await
}

#[tokio::test]
async fn run_on_start_fires_every_job_once() {
    let store = Arc::new(MemoryStore::new());
    let p = aggregator_pipeline(store.clone()).await;

    let handle = spawn_scheduler(p, hourly(true));
    assert_eq!(handle.jobs(), 4);

    // full + secondary each log the source; urgent and maintenance log one aggregate each
    let logs = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let logs = store.recent(50).await.unwrap();
            if logs.len() >= 4 {
                return logs;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("scheduled runs did not finish");
    handle.shutdown().await;

    let ids: Vec<&str> = logs.iter().map(|l| l.source_id.as_str()).collect();
    assert_eq!(ids.iter().filter(|id| **id == "aggregator").count(), 2);
    assert!(ids.contains(&URGENT_SOURCE_ID));
    assert!(ids.contains(&MAINTENANCE_SOURCE_ID));
    // full and secondary may race on check-then-insert
    assert!(store.record_count() >= 3);
}

#[tokio::test]
async fn delayed_start_runs_nothing_before_shutdown() {
    let store = Arc::new(MemoryStore::new());
    let p = aggregator_pipeline(store.clone()).await;

    let handle = spawn_scheduler(p, hourly(false));
    tokio::time::sleep(Duration::from_millis(50)).await;
    tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
        .await
        .expect("shutdown should not wait for the next tick");

    assert!(store.recent(10).await.unwrap().is_empty());
    assert_eq!(store.record_count(), 0);
}

#[tokio::test]
async fn urgent_job_reports_high_priority_upcoming_records() {
    let store = Arc::new(MemoryStore::new());
    let http = StaticFetcher::new().page(LIST, DEFI_DEALS_HTML);
    let mut deals = source("defi_deals", LIST, SourceKind::Webpage, 8);
    deals.rules = Some(defi_deals_rules());
    let p = pipeline(store.clone(), vec![deals], collector(http)).await;

    run_job(&p, JobKind::FullCycle, 30).await;
    run_job(&p, JobKind::UrgentCheck, 30).await;

    let latest = &store.recent(1).await.unwrap()[0];
    assert_eq!(latest.source_id, URGENT_SOURCE_ID);
    // Blast (Layer2, 9) and Hyperliquid (DeFi, 8)
    assert_eq!(latest.items_found, 2);
}

#[tokio::test]
async fn dropping_the_handle_keeps_jobs_running() {
    let store = Arc::new(MemoryStore::new());
    let p = aggregator_pipeline(store.clone()).await;

    let handle = spawn_scheduler(p, fast_full_cycle());
    drop(handle);

    let logs = wait_for_logs(&store, |logs| {
        logs.iter().filter(|l| l.source_id == "aggregator").count() >= 2
    })
    .await;
    assert!(logs.iter().all(|l| l.status == RunStatus::Success));
}

#[tokio::test]
async fn panicking_run_is_logged_failed_and_timer_keeps_firing() {
    let store = Arc::new(MemoryStore::new());
    let p = broken_source_pipeline(store.clone(), true);

    let handle = spawn_scheduler(p, fast_full_cycle());
    let logs = wait_for_logs(&store, |logs| {
        logs.iter()
            .filter(|l| l.source_id == JobKind::FullCycle.as_str())
            .count()
            >= 2
    })
    .await;
    handle.shutdown().await;

    let failed: Vec<&RunLog> = logs
        .iter()
        .filter(|l| l.source_id == JobKind::FullCycle.as_str())
        .collect();
    assert!(failed.len() >= 2);
    for l in failed {
        assert_eq!(l.status, RunStatus::Failed);
        assert!(l.error_message.as_deref().is_some_and(|m| m.contains("panicked")));
    }
}
