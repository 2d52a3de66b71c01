// src/model.rs
//! Canonical record model: closed taxonomies, the stored record, and run-log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed category taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Layer2,
    DeFi,
    Gaming,
    Infrastructure,
    Social,
    #[serde(rename = "NFT")]
    Nft,
    #[serde(rename = "DAO")]
    Dao,
    Other,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Layer2,
        Category::DeFi,
        Category::Gaming,
        Category::Infrastructure,
        Category::Social,
        Category::Nft,
        Category::Dao,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Layer2 => "Layer2",
            Category::DeFi => "DeFi",
            Category::Gaming => "Gaming",
            Category::Infrastructure => "Infrastructure",
            Category::Social => "Social",
            Category::Nft => "NFT",
            Category::Dao => "DAO",
            Category::Other => "Other",
        }
    }

    /// Default priority score for freshly collected records.
    pub fn priority(self) -> i32 {
        match self {
            Category::Layer2 => 9,
            Category::DeFi => 8,
            Category::Infrastructure => 7,
            Category::Gaming => 6,
            Category::Social => 5,
            Category::Nft | Category::Dao => 4,
            Category::Other => 3,
        }
    }

    pub fn potential_rating(self) -> Rating {
        match self {
            Category::Layer2 => Rating::VeryHigh,
            Category::DeFi | Category::Infrastructure => Rating::High,
            Category::Gaming | Category::Social | Category::Nft => Rating::Medium,
            Category::Dao | Category::Other => Rating::Low,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status. Transitions are not validated; see `rank` for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Upcoming,
    Confirmed,
    Distributed,
    Ended,
}

impl Status {
    /// Position in the nominal `upcoming -> confirmed -> distributed -> ended` sequence.
    pub fn rank(self) -> u8 {
        match self {
            Status::Upcoming => 0,
            Status::Confirmed => 1,
            Status::Distributed => 2,
            Status::Ended => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Low,
    Medium,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficialLinks {
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub discord: Option<String>,
    pub telegram: Option<String>,
}

/// A normalized candidate, ready for deduplication and insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub status: Status,
    pub chain: String,
    pub token_symbol: Option<String>,
    pub estimated_value: Option<String>,
    pub eligibility_criteria: Vec<String>,
    pub requirements: Vec<String>,
    pub links: OfficialLinks,
    pub contract_address: Option<String>,
    pub priority: i32,
    pub potential_rating: Rating,
    pub restricted: bool,
    pub content_hash: String,
    pub source_id: Option<String>,
    pub source_url: Option<String>,
}

/// The stored, deduplicated record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Category,
    pub status: Status,
    pub chain: String,
    pub token_symbol: Option<String>,
    pub estimated_value: Option<String>,
    pub eligibility_criteria: Vec<String>,
    pub requirements: Vec<String>,
    pub links: OfficialLinks,
    pub contract_address: Option<String>,
    pub priority: i32,
    pub potential_rating: Rating,
    pub restricted: bool,
    pub featured: bool,
    pub content_hash: String,
    pub source_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalRecord {
    pub fn from_new(new: NewRecord, id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name,
            description: new.description,
            category: new.category,
            status: new.status,
            chain: new.chain,
            token_symbol: new.token_symbol,
            estimated_value: new.estimated_value,
            eligibility_criteria: new.eligibility_criteria,
            requirements: new.requirements,
            links: new.links,
            contract_address: new.contract_address,
            priority: new.priority,
            potential_rating: new.potential_rating,
            restricted: new.restricted,
            featured: false,
            content_hash: new.content_hash,
            source_id: new.source_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update applied through `RecordStore::update_fields`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    pub description: Option<String>,
    pub status: Option<Status>,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub token_symbol: Option<String>,
    pub estimated_value: Option<String>,
    pub contract_address: Option<String>,
    pub priority: Option<i32>,
    pub featured: Option<bool>,
}

impl RecordPatch {
    pub fn featured(on: bool) -> Self {
        Self {
            featured: Some(on),
            ..Self::default()
        }
    }

    /// Fill fields the stored record lacks from a newer candidate.
    pub fn fill_missing(existing: &CanonicalRecord, candidate: &NewRecord) -> Self {
        fn gap(current: &Option<String>, incoming: &Option<String>) -> Option<String> {
            match (current.as_deref(), incoming) {
                (None | Some(""), Some(v)) if !v.is_empty() => Some(v.clone()),
                _ => None,
            }
        }
        Self {
            description: gap(&existing.description, &candidate.description),
            website: gap(&existing.links.website, &candidate.links.website),
            twitter: gap(&existing.links.twitter, &candidate.links.twitter),
            token_symbol: gap(&existing.token_symbol, &candidate.token_symbol),
            estimated_value: gap(&existing.estimated_value, &candidate.estimated_value),
            contract_address: gap(&existing.contract_address, &candidate.contract_address),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, rec: &mut CanonicalRecord) {
        if let Some(v) = &self.description {
            rec.description = Some(v.clone());
        }
        if let Some(v) = self.status {
            rec.status = v;
        }
        if let Some(v) = &self.website {
            rec.links.website = Some(v.clone());
        }
        if let Some(v) = &self.twitter {
            rec.links.twitter = Some(v.clone());
        }
        if let Some(v) = &self.token_symbol {
            rec.token_symbol = Some(v.clone());
        }
        if let Some(v) = &self.estimated_value {
            rec.estimated_value = Some(v.clone());
        }
        if let Some(v) = &self.contract_address {
            rec.contract_address = Some(v.clone());
        }
        if let Some(v) = self.priority {
            rec.priority = v;
        }
        if let Some(v) = self.featured {
            rec.featured = v;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
    Partial,
}

/// Append-only run log entry; one per source per cycle, or one per aggregate job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    pub source_id: String,
    pub status: RunStatus,
    pub items_found: usize,
    pub records_inserted: usize,
    pub duration_ms: u64,
    pub error_message: Option<String>,
    pub ts: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_serializes_to_taxonomy_names() {
        let v = serde_json::to_string(&Category::ALL).unwrap();
        assert_eq!(
            v,
            r#"["Layer2","DeFi","Gaming","Infrastructure","Social","NFT","DAO","Other"]"#
        );
    }

    #[test]
    fn category_scoring_tables() {
        assert_eq!(Category::Layer2.priority(), 9);
        assert_eq!(Category::Dao.priority(), 4);
        assert_eq!(Category::Layer2.potential_rating(), Rating::VeryHigh);
        assert_eq!(Category::Other.potential_rating(), Rating::Low);
        assert_eq!(
            serde_json::to_string(&Rating::VeryHigh).unwrap(),
            r#""very_high""#
        );
    }

    #[test]
    fn status_rank_follows_lifecycle() {
        assert!(Status::Upcoming.rank() < Status::Confirmed.rank());
        assert!(Status::Distributed.rank() < Status::Ended.rank());
    }

    #[test]
    fn fill_missing_only_touches_gaps() {
        let new = NewRecord {
            name: "Blast".into(),
            description: Some("new desc".into()),
            category: Category::Layer2,
            status: Status::Upcoming,
            chain: "Ethereum".into(),
            token_symbol: Some("BLAST".into()),
            estimated_value: None,
            eligibility_criteria: vec![],
            requirements: vec![],
            links: OfficialLinks {
                website: Some("https://blast.io".into()),
                ..Default::default()
            },
            contract_address: None,
            priority: 9,
            potential_rating: Rating::VeryHigh,
            restricted: true,
            content_hash: "0123456789abcdef".into(),
            source_id: None,
            source_url: None,
        };
        let mut existing = CanonicalRecord::from_new(new.clone(), Uuid::new_v4(), Utc::now());
        existing.description = Some("old desc".into());
        existing.links.website = None;
        existing.token_symbol = None;

        let patch = RecordPatch::fill_missing(&existing, &new);
        assert_eq!(patch.description, None);
        assert_eq!(patch.website.as_deref(), Some("https://blast.io"));
        assert_eq!(patch.token_symbol.as_deref(), Some("BLAST"));

        patch.apply(&mut existing);
        assert_eq!(existing.description.as_deref(), Some("old desc"));
        assert_eq!(existing.links.website.as_deref(), Some("https://blast.io"));
    }
}
