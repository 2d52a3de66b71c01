// src/ingest/providers/social_search.rs
//! Social search collector.
//!
//! Uses the platform search API when credentials are configured; on provider error or missing
//! credentials it falls back to scraping the rendered search-results page for the same query.
//! Each post becomes one candidate; posts without a domain keyword are dropped here.

use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::error::{CollectError, FetchError};
use crate::ingest::normalize::ellipsize;
use crate::ingest::render::RenderEngine;
use crate::ingest::types::{RawRecord, Source};

pub const DEFAULT_QUERY: &str = "#airdrop crypto";
pub const MAX_RESULTS: usize = 100;
pub const DESCRIPTION_MAX: usize = 200;

/// A post is kept only if it mentions at least one of these.
pub const POST_KEYWORDS: [&str; 11] = [
    "airdrop",
    "claim",
    "free",
    "token",
    "crypto",
    "blockchain",
    "ethereum",
    "btc",
    "solana",
    "arbitrum",
    "optimism",
];

const POST_SELECTOR: &str = "article";
const TEXT_SELECTOR: &str = r#"[data-testid="tweetText"]"#;
const AUTHOR_SELECTOR: &str = r#"[data-testid="User-Name"]"#;
const LINK_SELECTOR: &str = r#"a[href*="/status/"]"#;

static RE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Z][A-Za-z0-9 ]+?)\s+(?i:airdrop|claim|free)\b").expect("valid name regex")
});
static RE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s]+").expect("valid url regex"));

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchItem {
    pub text: String,
    pub author: String,
    pub url: Option<String>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchItem>, FetchError>;
    fn name(&self) -> &'static str;
}

/// X (Twitter) v2 recent search.
pub struct XSearchApi {
    client: reqwest::Client,
    bearer: String,
    base_url: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct XResponse {
    #[serde(default)]
    data: Vec<XTweet>,
    #[serde(default)]
    includes: Option<XIncludes>,
}

#[derive(Deserialize)]
struct XTweet {
    id: String,
    text: String,
    #[serde(default)]
    author_id: Option<String>,
}

#[derive(Deserialize)]
struct XIncludes {
    #[serde(default)]
    users: Vec<XUser>,
}

#[derive(Deserialize)]
struct XUser {
    id: String,
    username: String,
}

impl XSearchApi {
    pub const DEFAULT_BASE: &'static str = "https://api.twitter.com/2";

    pub fn new(bearer: &str, timeout: Duration) -> Result<Self, FetchError> {
        Self::with_base(Self::DEFAULT_BASE, bearer, timeout)
    }

    pub fn with_base(base_url: &str, bearer: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Search(format!("building client: {e}")))?;
        Ok(Self {
            client,
            bearer: bearer.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl SearchProvider for XSearchApi {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchItem>, FetchError> {
        let url = format!("{}/tweets/search/recent", self.base_url);
        // API accepts 10..=100
        let max = max_results.clamp(10, 100).to_string();
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer)
            .query(&[
                ("query", query),
                ("max_results", max.as_str()),
                ("expansions", "author_id"),
                ("user.fields", "username"),
            ])
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, self.timeout, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Search(format!("HTTP {}", status.as_u16())));
        }
        let body: XResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::Search(format!("decoding response: {e}")))?;

        let users = body.includes.map(|i| i.users).unwrap_or_default();
        Ok(body
            .data
            .into_iter()
            .map(|t| {
                let author = t
                    .author_id
                    .as_deref()
                    .and_then(|aid| users.iter().find(|u| u.id == aid))
                    .map(|u| u.username.clone())
                    .unwrap_or_default();
                let url = (!author.is_empty())
                    .then(|| format!("https://twitter.com/{author}/status/{}", t.id));
                SearchItem {
                    text: t.text,
                    author,
                    url,
                }
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "x-api"
    }
}

pub async fn collect(
    search: Option<&dyn SearchProvider>,
    renderer: Option<&RenderEngine>,
    source: &Source,
) -> Result<Vec<RawRecord>, CollectError> {
    let query = source
        .query
        .as_deref()
        .filter(|q| !q.trim().is_empty())
        .unwrap_or(DEFAULT_QUERY);

    let items = match search {
        Some(provider) => match provider.search(query, MAX_RESULTS).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(
                    target: "ingest",
                    source = %source.id,
                    provider = provider.name(),
                    error = %e,
                    "search api failed; falling back to rendered page"
                );
                scrape_rendered(renderer, source, query).await?
            }
        },
        None => {
            tracing::debug!(target: "ingest", source = %source.id, "no search credentials; using rendered page");
            scrape_rendered(renderer, source, query).await?
        }
    };

    let total = items.len();
    let records: Vec<RawRecord> = items
        .iter()
        .filter_map(|it| record_from_item(it, &source.id))
        .collect();
    let dropped = total - records.len();
    if dropped > 0 {
        counter!("ingest_rejected_total", "reason" => "no_keyword").increment(dropped as u64);
    }
    tracing::debug!(target: "ingest", source = %source.id, total, kept = records.len(), "social search collected");
    Ok(records)
}

async fn scrape_rendered(
    renderer: Option<&RenderEngine>,
    source: &Source,
    query: &str,
) -> Result<Vec<SearchItem>, FetchError> {
    let renderer = renderer.ok_or(FetchError::NoRenderer)?;
    let url = search_page_url(&source.endpoint, query);
    let html = renderer.render(&url).await?;
    Ok(parse_rendered_posts(&html))
}

/// Adds `q=<query>` to the results page unless the endpoint already carries one.
pub fn search_page_url(endpoint: &str, query: &str) -> String {
    match url::Url::parse(endpoint) {
        Ok(mut u) => {
            if !u.query_pairs().any(|(k, _)| k == "q") {
                u.query_pairs_mut().append_pair("q", query);
            }
            u.to_string()
        }
        Err(_) => endpoint.to_string(),
    }
}

pub fn parse_rendered_posts(html: &str) -> Vec<SearchItem> {
    let (Ok(post), Ok(text), Ok(author), Ok(link)) = (
        Selector::parse(POST_SELECTOR),
        Selector::parse(TEXT_SELECTOR),
        Selector::parse(AUTHOR_SELECTOR),
        Selector::parse(LINK_SELECTOR),
    ) else {
        return Vec::new();
    };
    let doc = Html::parse_document(html);
    doc.select(&post)
        .filter_map(|el| {
            let body = el
                .select(&text)
                .next()
                .map(|t| t.text().collect::<Vec<_>>().join(" "))?;
            let author = el
                .select(&author)
                .next()
                .map(|a| a.text().collect::<Vec<_>>().join(" "))
                .unwrap_or_default();
            let url = el
                .select(&link)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|h| {
                    if h.starts_with('/') {
                        format!("https://twitter.com{h}")
                    } else {
                        h.to_string()
                    }
                });
            Some(SearchItem {
                text: body.split_whitespace().collect::<Vec<_>>().join(" "),
                author: author.trim().to_string(),
                url,
            })
        })
        .collect()
}

fn has_post_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    POST_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Leading capitalised phrase before "airdrop"/"claim"/"free", else the first three words.
pub fn infer_name(text: &str) -> String {
    if let Some(c) = RE_NAME.captures(text) {
        return c[1].trim().to_string();
    }
    text.split_whitespace().take(3).collect::<Vec<_>>().join(" ")
}

pub fn record_from_item(item: &SearchItem, source_id: &str) -> Option<RawRecord> {
    if !has_post_keyword(&item.text) {
        return None;
    }
    let website = RE_URL.find(&item.text).map(|m| m.as_str().to_string());
    Some(RawRecord {
        source_id: source_id.to_string(),
        name: infer_name(&item.text),
        description: Some(ellipsize(&item.text, DESCRIPTION_MAX)),
        category: Some("Other".into()),
        chain: None,
        website,
        handle: (!item.author.is_empty()).then(|| item.author.clone()),
        contract_address: None,
        source_url: item.url.clone(),
    })
}
