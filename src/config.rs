// src/config.rs
//! Runtime settings read from the environment (after `.env` is loaded).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::ingest::scheduler::SchedulerCfg;
use crate::ingest::Jitter;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bearer token guarding the on-demand trigger and admin routes.
    pub trigger_token: Option<String>,
    pub render_service_url: Option<String>,
    pub render_service_token: Option<String>,
    pub render_max_sessions: usize,
    pub x_bearer_token: Option<String>,
    pub fetch_timeout: Duration,
    pub schedule: SchedulerCfg,
    pub jitter: Jitter,
    pub snapshot_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            trigger_token: None,
            render_service_url: None,
            render_service_token: None,
            render_max_sessions: 2,
            x_bearer_token: None,
            fetch_timeout: Duration::from_secs(10),
            schedule: SchedulerCfg::default(),
            jitter: Jitter::default(),
            snapshot_path: None,
        }
    }
}

fn opt_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match opt_string(key) {
        Some(v) => v
            .parse::<T>()
            .with_context(|| format!("{key} has invalid value `{v}`")),
        None => Ok(default),
    }
}

fn secs(key: &str, default: Duration) -> Result<Duration> {
    parsed(key, default.as_secs()).map(Duration::from_secs)
}

fn flag(key: &str, default: bool) -> bool {
    match opt_string(key).map(|v| v.to_ascii_lowercase()) {
        Some(v) => matches!(v.as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let schedule = SchedulerCfg {
            full_interval: secs("FULL_CYCLE_INTERVAL_SECS", d.schedule.full_interval)?,
            secondary_interval: secs("SECONDARY_CYCLE_INTERVAL_SECS", d.schedule.secondary_interval)?,
            urgent_interval: secs("URGENT_CHECK_INTERVAL_SECS", d.schedule.urgent_interval)?,
            maintenance_interval: secs("MAINTENANCE_INTERVAL_SECS", d.schedule.maintenance_interval)?,
            run_on_start: flag("RUN_ON_START", d.schedule.run_on_start),
            retention_days: parsed("LOG_RETENTION_DAYS", d.schedule.retention_days)?,
        };
        let jitter = Jitter {
            min_ms: parsed("JITTER_MIN_MS", d.jitter.min_ms)?,
            max_ms: parsed("JITTER_MAX_MS", d.jitter.max_ms)?,
        };
        Ok(Self {
            trigger_token: opt_string("SCRAPER_API_KEY"),
            render_service_url: opt_string("RENDER_SERVICE_URL"),
            render_service_token: opt_string("RENDER_SERVICE_TOKEN"),
            render_max_sessions: parsed("RENDER_MAX_SESSIONS", d.render_max_sessions)?,
            x_bearer_token: opt_string("X_BEARER_TOKEN"),
            fetch_timeout: secs("FETCH_TIMEOUT_SECS", d.fetch_timeout)?,
            schedule,
            jitter,
            snapshot_path: opt_string("STORE_SNAPSHOT_PATH").map(PathBuf::from),
        })
    }
}
