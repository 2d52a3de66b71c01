// src/dedup/mod.rs
//! Duplicate detection.
//!
//! - Phase A (`BatchDedup`): names, websites and fingerprints seen earlier in the current run.
//!   The first occurrence wins; sources run priority-descending, so that is the
//!   highest-priority source.
//! - Phase B (`Deduplicator`): tiered match against the canonical store, short-circuiting on
//!   the first qualifying tier: exact name, fuzzy name, website domain, social handle,
//!   contract address, description keywords.
//!
//! Missing or empty candidate fields never match.

pub mod similarity;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::StoreError;
use crate::ingest::normalize::name_key;
use crate::model::{CanonicalRecord, NewRecord};
use crate::store::{RecordFilter, RecordStore};
use similarity::{jaccard, keyword_set, name_tokens, registrable_domain};

const FUZZY_SKIP: f64 = 0.9;
const FUZZY_MERGE: f64 = 0.8;
const CONTENT_MERGE: f64 = 0.7;
const WEBSITE_SCORE: f64 = 0.9;
const HANDLE_SCORE: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactName,
    SimilarName,
    SameWebsite,
    SameHandle,
    SameContract,
    SimilarContent,
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::ExactName => "exact_name",
            MatchType::SimilarName => "similar_name",
            MatchType::SameWebsite => "same_website",
            MatchType::SameHandle => "same_handle",
            MatchType::SameContract => "same_contract",
            MatchType::SimilarContent => "similar_content",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupAction {
    Skip,
    Merge,
    UpdateExisting,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub existing_id: Option<Uuid>,
    pub existing_name: Option<String>,
    pub match_type: MatchType,
    pub similarity: f64,
    pub action: DedupAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DedupVerdict {
    pub is_duplicate: bool,
    pub confidence: f64,
    pub matched: Option<MatchResult>,
}

impl DedupVerdict {
    pub fn unique() -> Self {
        Self {
            is_duplicate: false,
            confidence: 0.0,
            matched: None,
        }
    }

    fn hit(existing: &CanonicalRecord, match_type: MatchType, similarity: f64, action: DedupAction) -> Self {
        Self {
            is_duplicate: true,
            confidence: similarity,
            matched: Some(MatchResult {
                existing_id: Some(existing.id),
                existing_name: Some(existing.name.clone()),
                match_type,
                similarity,
                action,
            }),
        }
    }

    pub fn action(&self) -> Option<DedupAction> {
        self.matched.as_ref().map(|m| m.action)
    }
}

/// Why a record was dropped inside the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchHit {
    Name,
    Website,
    Fingerprint,
}

/// Run-scoped sets for intra-batch duplicates.
#[derive(Debug, Default)]
pub struct BatchDedup {
    names: HashSet<String>,
    websites: HashSet<String>,
    fingerprints: HashSet<String>,
}

impl BatchDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `rec` unless one of its keys was already seen.
    pub fn admit(&mut self, rec: &NewRecord) -> Result<(), BatchHit> {
        let name = name_key(&rec.name);
        let website = rec
            .links
            .website
            .as_deref()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty());

        if self.names.contains(&name) {
            return Err(BatchHit::Name);
        }
        if website.as_ref().is_some_and(|w| self.websites.contains(w)) {
            return Err(BatchHit::Website);
        }
        if self.fingerprints.contains(&rec.content_hash) {
            return Err(BatchHit::Fingerprint);
        }

        self.names.insert(name);
        if let Some(w) = website {
            self.websites.insert(w);
        }
        self.fingerprints.insert(rec.content_hash.clone());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

fn handle_key(h: &str) -> String {
    h.trim().trim_start_matches('@').to_lowercase()
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

/// Evaluate the tiers in order against a snapshot of stored records.
pub fn check_against(candidate: &NewRecord, stored: &[CanonicalRecord]) -> DedupVerdict {
    // 1) exact name
    let key = name_key(&candidate.name);
    if !key.is_empty() {
        if let Some(hit) = stored.iter().find(|r| name_key(&r.name) == key) {
            return DedupVerdict::hit(hit, MatchType::ExactName, 1.0, DedupAction::Skip);
        }
    }

    // 2) fuzzy name; a name with no usable tokens counts as missing
    let tokens = name_tokens(&candidate.name);
    let best = stored
        .iter()
        .filter(|_| !tokens.is_empty())
        .map(|r| (r, jaccard(&tokens, &name_tokens(&r.name))))
        .max_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((rec, score)) = best {
        if score > FUZZY_SKIP {
            return DedupVerdict::hit(rec, MatchType::SimilarName, score, DedupAction::Skip);
        }
        if score > FUZZY_MERGE {
            return DedupVerdict::hit(rec, MatchType::SimilarName, score, DedupAction::Merge);
        }
    }

    // 3) website domain
    if let Some(domain) = non_empty(candidate.links.website.as_deref()).and_then(registrable_domain) {
        let hit = stored.iter().find(|r| {
            non_empty(r.links.website.as_deref())
                .and_then(registrable_domain)
                .is_some_and(|d| d.contains(&domain))
        });
        if let Some(rec) = hit {
            return DedupVerdict::hit(rec, MatchType::SameWebsite, WEBSITE_SCORE, DedupAction::UpdateExisting);
        }
    }

    // 4) social handle
    if let Some(handle) = non_empty(candidate.links.twitter.as_deref()).map(handle_key) {
        if !handle.is_empty() {
            let hit = stored.iter().find(|r| {
                non_empty(r.links.twitter.as_deref())
                    .map(handle_key)
                    .is_some_and(|h| h.contains(&handle))
            });
            if let Some(rec) = hit {
                return DedupVerdict::hit(rec, MatchType::SameHandle, HANDLE_SCORE, DedupAction::UpdateExisting);
            }
        }
    }

    // 5) contract address
    if let Some(addr) = non_empty(candidate.contract_address.as_deref()) {
        let hit = stored.iter().find(|r| {
            non_empty(r.contract_address.as_deref()).is_some_and(|a| a.eq_ignore_ascii_case(addr))
        });
        if let Some(rec) = hit {
            return DedupVerdict::hit(rec, MatchType::SameContract, 1.0, DedupAction::Skip);
        }
    }

    // 6) description keywords
    let keywords = non_empty(candidate.description.as_deref())
        .map(keyword_set)
        .filter(|k| !k.is_empty());
    if let Some(keywords) = keywords {
        let best = stored
            .iter()
            .filter_map(|r| {
                non_empty(r.description.as_deref()).map(|d| (r, jaccard(&keywords, &keyword_set(d))))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((rec, score)) = best {
            if score > CONTENT_MERGE {
                return DedupVerdict::hit(rec, MatchType::SimilarContent, score, DedupAction::Merge);
            }
        }
    }

    DedupVerdict::unique()
}

/// Cross-store checker. Reads the store at call time; no transaction spans check and insert.
#[derive(Clone)]
pub struct Deduplicator {
    store: Arc<dyn RecordStore>,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn check(&self, candidate: &NewRecord) -> Result<DedupVerdict, StoreError> {
        let stored = self.store.select(&RecordFilter::Everything).await?;
        let verdict = check_against(candidate, &stored);
        if let Some(m) = &verdict.matched {
            tracing::debug!(
                target: "dedup",
                name = %candidate.name,
                existing = ?m.existing_name,
                tier = m.match_type.as_str(),
                score = m.similarity,
                "duplicate candidate"
            );
        }
        Ok(verdict)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub cleaned: usize,
    pub errors: usize,
}

/// Admin cleanup: among stored records sharing a name key, keep the newest and delete the rest.
pub async fn cleanup_duplicates(store: &dyn RecordStore) -> Result<CleanupReport, StoreError> {
    let mut records = store.select(&RecordFilter::Everything).await?;
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut seen: HashMap<String, Uuid> = HashMap::new();
    let mut report = CleanupReport::default();
    for rec in records {
        let key = name_key(&rec.name);
        if seen.contains_key(&key) {
            match store.delete(&RecordFilter::Ids(vec![rec.id])).await {
                Ok(n) => {
                    tracing::info!(target: "dedup", name = %rec.name, id = %rec.id, "removed duplicate record");
                    report.cleaned += n;
                }
                Err(e) => {
                    tracing::warn!(target: "dedup", name = %rec.name, error = %e, "duplicate cleanup failed");
                    report.errors += 1;
                }
            }
        } else {
            seen.insert(key, rec.id);
        }
    }
    Ok(report)
}
