// src/ingest/fetch.rs
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Anything that can turn a URL into page content.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
    fn name(&self) -> &'static str;
}

/// Lightweight fetch: one GET with a bounded timeout, no retries.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| FetchError::Http {
                url: String::new(),
                message: format!("building http client: {e}"),
            })?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, self.timeout, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, self.timeout, e))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Canned responses keyed by URL; unknown URLs fail with HTTP 404. Records every request.
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, Result<String, StaticFailure>>,
    pub calls: Mutex<Vec<String>>,
}

#[derive(Debug, Clone, Copy)]
pub enum StaticFailure {
    Timeout,
    Status(u16),
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), Ok(body.to_string()));
        self
    }

    pub fn failing(mut self, url: &str, failure: StaticFailure) -> Self {
        self.pages.insert(url.to_string(), Err(failure));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(url.to_string());
        }
        match self.pages.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(StaticFailure::Timeout)) => Err(FetchError::Timeout {
                url: url.to_string(),
                after: Duration::from_secs(10),
            }),
            Some(Err(StaticFailure::Status(status))) => Err(FetchError::Status {
                url: url.to_string(),
                status: *status,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
