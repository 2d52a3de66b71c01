// tests/ingest_social.rs
mod common;

use std::sync::Arc;

use airdrop_hunter::error::FetchError;
use airdrop_hunter::ingest::fetch::StaticFetcher;
use airdrop_hunter::ingest::providers::social_search::{SearchItem, SearchProvider, DEFAULT_QUERY};
use airdrop_hunter::ingest::types::SourceKind;
use airdrop_hunter::ingest::CycleScope;
use airdrop_hunter::model::{Category, RunStatus};
use airdrop_hunter::store::{MemoryStore, RecordFilter, RecordStore};
use async_trait::async_trait;
use parking_lot::Mutex;
use common::*;

const SEARCH_PAGE: &str = "https://twitter.com/search?f=live";

struct MockSearch {
    items: Result<Vec<SearchItem>, ()>,
    queries: Mutex<Vec<(String, usize)>>,
}

impl MockSearch {
    fn ok(items: Vec<SearchItem>) -> Self {
        Self {
            items: Ok(items),
            queries: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            items: Err(()),
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchItem>, FetchError> {
        self.queries.lock().push((query.to_string(), max_results));
        self.items
            .clone()
            .map_err(|_| FetchError::Search("HTTP 429".into()))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn item(text: &str, author: &str) -> SearchItem {
    SearchItem {
        text: text.into(),
        author: author.into(),
        url: Some(format!("https://twitter.com/{author}/status/1")),
    }
}

#[tokio::test]
async fn api_results_become_records() {
    let store = Arc::new(MemoryStore::new());
    let search = Arc::new(MockSearch::ok(vec![
        item("Linea Airdrop is live, check https://linea.build/hub now", "LineaBuild"),
        item("good morning to everyone", "someone"),
        item("zkSync free token drop for early users", "zksync"),
    ]));
    let p = pipeline(
        store.clone(),
        vec![source("x_search", SEARCH_PAGE, SourceKind::SocialSearch, 10)],
        collector(StaticFetcher::new()).with_search(search.clone()),
    )
    .await;

    let report = p.run_cycle(CycleScope::All).await;

    assert_eq!(report.sources[0].status, RunStatus::Success);
    assert_eq!(report.sources[0].items_found, 2);
    assert_eq!(report.success, 2);
    assert_eq!(
        search.queries.lock().clone(),
        vec![(DEFAULT_QUERY.to_string(), 100)]
    );

    let all = store.select(&RecordFilter::Everything).await.unwrap();
    let linea = all.iter().find(|r| r.name == "Linea").unwrap();
    assert_eq!(linea.links.website.as_deref(), Some("https://linea.build/hub"));
    assert_eq!(linea.links.twitter.as_deref(), Some("@LineaBuild"));
    assert_eq!(linea.category, Category::Other);
    assert_eq!(linea.priority, 3);

    let zk = all.iter().find(|r| r.name == "zkSync free token").unwrap();
    assert_eq!(zk.chain, "Ethereum");
    assert_eq!(zk.links.twitter.as_deref(), Some("@zksync"));
}

#[tokio::test]
async fn provider_failure_falls_back_to_rendered_page() {
    let store = Arc::new(MemoryStore::new());
    let rendered_url = "https://twitter.com/search?f=live&q=%23airdrop+crypto";
    let backend = Arc::new(StaticFetcher::new().page(rendered_url, X_SEARCH_HTML));
    let engine = renderer(backend.clone());
    let p = pipeline(
        store.clone(),
        vec![source("x_search", SEARCH_PAGE, SourceKind::SocialSearch, 10)],
        collector(StaticFetcher::new())
            .with_search(Arc::new(MockSearch::failing()))
            .with_renderer(engine.clone()),
    )
    .await;

    let report = p.run_cycle(CycleScope::All).await;

    assert_eq!(backend.calls(), vec![rendered_url.to_string()]);
    assert_eq!(report.success, 2);
    let all = store.select(&RecordFilter::Everything).await.unwrap();
    let monad = all.iter().find(|r| r.name == "Monad").unwrap();
    assert_eq!(monad.links.twitter.as_deref(), Some("@monad_xyz"));
    assert_eq!(monad.links.website.as_deref(), Some("https://monad.xyz/claim"));
    assert!(monad
        .eligibility_criteria
        .iter()
        .any(|c| c.contains("Testnet")));
    assert!(all.iter().any(|r| r.name == "Berachain"));
    assert_eq!(engine.open_sessions(), 0);
}

#[tokio::test]
async fn no_credentials_and_no_renderer_fails_the_source() {
    let store = Arc::new(MemoryStore::new());
    let p = pipeline(
        store,
        vec![source("x_search", SEARCH_PAGE, SourceKind::SocialSearch, 10)],
        collector(StaticFetcher::new()),
    )
    .await;

    let report = p.run_cycle(CycleScope::All).await;
    assert_eq!(report.sources[0].status, RunStatus::Failed);
    assert_eq!(report.errors, 1);
}
