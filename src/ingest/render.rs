// src/ingest/render.rs
//! Rendering-capable fetch (headless browser semantics via a render service).
//!
//! One `RenderEngine` is opened at pipeline start and closed at shutdown. Each page fetch
//! holds a `RenderSession`; dropping the session releases it on every exit path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::gauge;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::FetchError;
use crate::ingest::fetch::PageFetcher;

pub struct RenderEngine {
    backend: Arc<dyn PageFetcher>,
    permits: Arc<Semaphore>,
    open_sessions: Arc<AtomicUsize>,
}

impl RenderEngine {
    pub fn open(backend: Arc<dyn PageFetcher>, max_sessions: usize) -> Arc<Self> {
        tracing::info!(
            target: "render",
            backend = backend.name(),
            max_sessions,
            "rendering engine opened"
        );
        Arc::new(Self {
            backend,
            permits: Arc::new(Semaphore::new(max_sessions.max(1))),
            open_sessions: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Wait for a free session slot. Fails once the engine is closed.
    pub async fn session(&self) -> Result<RenderSession, FetchError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| FetchError::NoRenderer)?;
        let n = self.open_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        gauge!("render_sessions_open").set(n as f64);
        Ok(RenderSession {
            backend: Arc::clone(&self.backend),
            open_sessions: Arc::clone(&self.open_sessions),
            _permit: permit,
        })
    }

    /// Render one page inside a scoped session.
    pub async fn render(&self, url: &str) -> Result<String, FetchError> {
        let session = self.session().await?;
        session.content(url).await
    }

    pub fn close(&self) {
        self.permits.close();
        tracing::info!(target: "render", "rendering engine closed");
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}

pub struct RenderSession {
    backend: Arc<dyn PageFetcher>,
    open_sessions: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl RenderSession {
    pub async fn content(&self, url: &str) -> Result<String, FetchError> {
        self.backend.fetch(url).await
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        let n = self.open_sessions.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        gauge!("render_sessions_open").set(n as f64);
        tracing::trace!(target: "render", open = n, "render session released");
    }
}

/// Browserless-style `/content` endpoint returning fully rendered HTML.
pub struct BrowserlessFetcher {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl BrowserlessFetcher {
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Render {
                url: base_url.to_string(),
                message: format!("building client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
            timeout,
        })
    }
}

#[async_trait]
impl PageFetcher for BrowserlessFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(token) = &self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        let resp = self
            .client
            .post(&endpoint)
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(|e| match FetchError::from_reqwest(url, self.timeout, e) {
                timeout @ FetchError::Timeout { .. } => timeout,
                other => FetchError::Render {
                    url: url.to_string(),
                    message: other.to_string(),
                },
            })?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(FetchError::Render {
                url: url.to_string(),
                message: format!("HTTP {}: {}", status.as_u16(), message.trim()),
            });
        }
        resp.text().await.map_err(|e| FetchError::Render {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "browserless"
    }
}
