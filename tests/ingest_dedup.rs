// tests/ingest_dedup.rs
use std::sync::Arc;

use airdrop_hunter::dedup::{DedupAction, Deduplicator, MatchType};
use airdrop_hunter::ingest::normalize::normalize_record;
use airdrop_hunter::ingest::types::{Locale, RawRecord, Source, SourceKind};
use airdrop_hunter::model::NewRecord;
use airdrop_hunter::store::{MemoryStore, RecordStore};

fn src() -> Source {
    Source {
        id: "t".into(),
        name: "T".into(),
        endpoint: "https://t.test".into(),
        kind: SourceKind::Webpage,
        locale: Locale::En,
        priority: 5,
        active: true,
        rules: None,
        query: None,
        last_run_at: None,
    }
}

fn rec(name: &str, desc: Option<&str>, website: Option<&str>) -> NewRecord {
    normalize_record(
        RawRecord {
            source_id: "t".into(),
            name: name.into(),
            description: desc.map(String::from),
            website: website.map(String::from),
            ..Default::default()
        },
        &src(),
    )
    .expect("valid candidate")
}

async fn dedup_with(stored: Vec<NewRecord>) -> Deduplicator {
    let store = Arc::new(MemoryStore::new());
    for r in stored {
        store.insert(r).await.unwrap();
    }
    Deduplicator::new(store)
}

#[tokio::test]
async fn case_and_spacing_variants_are_exact_name_duplicates() {
    let d = dedup_with(vec![rec("ZK Sync Era", None, None)]).await;
    let v = d.check(&rec("zksync era", None, None)).await.unwrap();
    assert!(v.is_duplicate);
    let m = v.matched.unwrap();
    assert_eq!(m.match_type, MatchType::ExactName);
    assert_eq!(m.action, DedupAction::Skip);
    assert_eq!(m.similarity, 1.0);
}

#[tokio::test]
async fn same_registrable_domain_updates_existing() {
    let d = dedup_with(vec![rec("Blast", None, Some("https://www.blast.io"))]).await;
    let v = d
        .check(&rec("Blast Points Program", None, Some("https://blast.io/airdrop")))
        .await
        .unwrap();
    let m = v.matched.unwrap();
    assert_eq!(m.match_type, MatchType::SameWebsite);
    assert_eq!(m.action, DedupAction::UpdateExisting);
    assert_eq!(v.confidence, 0.9);
}

#[tokio::test]
async fn shared_lexicon_keywords_recommend_merge() {
    let d = dedup_with(vec![rec(
        "Orbiter Finance",
        Some("Bridge airdrop: token claim, reward and staking for users"),
        Some("https://orbiter.finance"),
    )])
    .await;
    let v = d
        .check(&rec(
            "Galxe Quest",
            Some("Complete the quest to claim an airdrop token reward"),
            Some("https://galxe.com"),
        ))
        .await
        .unwrap();
    let m = v.matched.unwrap();
    assert_eq!(m.match_type, MatchType::SimilarContent);
    assert_eq!(m.action, DedupAction::Merge);
    assert!(m.similarity >= 0.7);
}

#[tokio::test]
async fn unrelated_record_is_unique() {
    let d = dedup_with(vec![rec(
        "Orbiter Finance",
        Some("Bridge airdrop"),
        Some("https://orbiter.finance"),
    )])
    .await;
    let v = d
        .check(&rec("Kamino", Some("Lending vaults on Solana"), Some("https://kamino.finance")))
        .await
        .unwrap();
    assert!(!v.is_duplicate);
    assert_eq!(v.confidence, 0.0);
    assert!(v.matched.is_none());
}

#[tokio::test]
async fn descriptions_without_lexicon_words_do_not_merge() {
    let d = dedup_with(vec![rec("Kamino Lend", Some("Vaults on Solana"), None)]).await;
    let v = d
        .check(&rec("Drift Protocol v2", Some("Perpetuals on Solana"), None))
        .await
        .unwrap();
    // "protocol" sits in the name, not the description
    assert!(!v.is_duplicate);
}
