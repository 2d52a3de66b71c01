// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    SocialSearch,
    Webpage,
    StructuredApi,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::SocialSearch => "social-search",
            SourceKind::Webpage => "webpage",
            SourceKind::StructuredApi => "structured-api",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Zh,
    #[serde(other)]
    Other,
}

/// Field locators (CSS selectors) applied inside each container element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRules {
    pub container: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub chain: Option<String>,
    pub website: Option<String>,
    pub handle: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    pub kind: SourceKind,
    #[serde(default)]
    pub locale: Locale,
    /// Higher runs first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub rules: Option<ExtractionRules>,
    /// Search query for social sources.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

/// Raw candidate extracted from a single fetch. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source_id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub chain: Option<String>,
    pub website: Option<String>,
    pub handle: Option<String>,
    pub contract_address: Option<String>,
    pub source_url: Option<String>,
}
