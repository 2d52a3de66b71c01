// src/ingest/normalize.rs
//! Raw -> canonical mapping: taxonomy rules, text/URL cleanup, requirement and eligibility
//! extraction, and the content fingerprint.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::ValidationError;
use crate::ingest::types::{Locale, RawRecord, Source};
use crate::model::{Category, NewRecord, OfficialLinks, Status};

pub const DEFAULT_CHAIN: &str = "Ethereum";
pub const NO_REQUIREMENTS: &str = "Check official website for requirements";
pub const NO_CRITERIA: &str = "No specific criteria mentioned";

const NAME_MAX_CHARS: usize = 50;
const TEXT_MAX_CHARS: usize = 1500;

/// Ordered substring rules; first match wins.
const CATEGORY_RULES: &[(&[&str], Category)] = &[
    (&["layer", "l2"], Category::Layer2),
    (&["defi", "finance"], Category::DeFi),
    (&["game", "gaming"], Category::Gaming),
    (&["social", "community"], Category::Social),
    (&["infra"], Category::Infrastructure),
    (&["nft"], Category::Nft),
    (&["dao"], Category::Dao),
];

/// Checked before the generic `eth` rule so L2 names containing "eth" map to the L2.
const CHAIN_RULES: &[(&[&str], &str)] = &[
    (&["zksync"], "zkSync"),
    (&["arbitrum"], "Arbitrum"),
    (&["optimism"], "Optimism"),
    (&["polygon", "matic"], "Polygon"),
    (&["bsc", "bnb"], "BSC"),
    (&["avalanche", "avax"], "Avalanche"),
    (&["solana"], "Solana"),
    (&["base"], "Base"),
    (&["ethereum", "eth"], DEFAULT_CHAIN),
];

const REQUIREMENT_VERBS: [&str; 6] = ["follow", "retweet", "like", "join", "connect", "hold"];

const ELIGIBILITY_KEYWORDS: [(&str, &str); 4] = [
    ("whitelist", "Whitelist required"),
    ("snapshot", "Snapshot based"),
    ("hold", "Token holding required"),
    ("testnet", "Testnet interaction required"),
];

/// Placeholder blocklist for the legitimacy heuristic.
const PLACEHOLDER_WORDS: [&str; 5] = ["test", "demo", "example", "sample", "placeholder"];
const CONTENT_WORDS: [&str; 5] = ["airdrop", "token", "crypto", "claim", "free"];

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("ws regex"));
static RE_REQUIREMENTS: Lazy<Vec<Regex>> = Lazy::new(|| {
    REQUIREMENT_VERBS
        .iter()
        .map(|v| Regex::new(&format!(r"(?i)\b{v}\s+[^\n.;!]+")).expect("requirement regex"))
        .collect()
});

pub fn normalize_category(raw: &str) -> Category {
    let lower = raw.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
        .map(|(_, c)| *c)
        .unwrap_or(Category::Other)
}

pub fn normalize_chain(raw: &str) -> String {
    let lower = raw.to_lowercase();
    CHAIN_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
        .map(|(_, c)| *c)
        .unwrap_or(DEFAULT_CHAIN)
        .to_string()
}

/// Decode entities, strip tags, fold typographic quotes, collapse whitespace, trim.
pub fn clean_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let stripped = RE_TAGS.replace_all(&decoded, "");
    let folded = stripped
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    let out = RE_WS.replace_all(&folded, " ").trim().to_string();
    truncate_chars(&out, TEXT_MAX_CHARS)
}

/// Bare domains gain `https://`, protocol-relative URLs become `https:`, absolute URLs pass.
pub fn clean_url(s: &str) -> String {
    let t = s.trim();
    if t.is_empty() {
        return String::new();
    }
    let lower = t.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        t.to_string()
    } else if let Some(rest) = t.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        format!("https://{t}")
    }
}

/// Cut to `max` chars, appending "..." when something was dropped.
pub fn ellipsize(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max).collect();
        format!("{}...", head.trim_end())
    } else {
        s.to_string()
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect()
    } else {
        s.to_string()
    }
}

pub fn extract_requirements(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for re in RE_REQUIREMENTS.iter() {
        for m in re.find_iter(text) {
            let phrase = m.as_str().trim().to_string();
            if !out.contains(&phrase) {
                out.push(phrase);
            }
        }
    }
    if out.is_empty() {
        out.push(NO_REQUIREMENTS.to_string());
    }
    out
}

pub fn extract_eligibility(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut out: Vec<String> = ELIGIBILITY_KEYWORDS
        .iter()
        .filter(|(kw, _)| lower.contains(kw))
        .map(|(_, label)| label.to_string())
        .collect();
    if out.is_empty() {
        out.push(NO_CRITERIA.to_string());
    }
    out
}

/// 16 hex chars of SHA-256 over `name` and `description` concatenated with no separator,
/// lowercased and whitespace-collapsed.
pub fn fingerprint(name: &str, description: &str) -> String {
    let joined = format!("{name}{description}").to_lowercase();
    let normalized = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    let digest = Sha256::digest(normalized.as_bytes());
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Key used for exact-name comparison: lowercase alphanumerics only.
pub fn name_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Placeholder blocklist + minimum-content heuristic.
pub fn validate_candidate(name: &str, description: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let name_l = name.to_lowercase();
    let desc_l = description.to_lowercase();
    // Whole words only, so "testnet" or "latest" stay valid.
    let words = |s: &str| -> Vec<String> {
        s.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect()
    };
    let (name_words, desc_words) = (words(&name_l), words(&desc_l));
    if let Some(bad) = PLACEHOLDER_WORDS
        .iter()
        .find(|w| name_words.iter().chain(&desc_words).any(|t| t.as_str() == **w))
    {
        return Err(ValidationError::Placeholder(*bad));
    }
    let has_content_word = CONTENT_WORDS
        .iter()
        .any(|w| name_l.contains(w) || desc_l.contains(w));
    if has_content_word || name.chars().count() > 3 {
        Ok(())
    } else {
        Err(ValidationError::TooShort)
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

/// Prefer an explicit `@handle` token; author fields often carry a display name first.
fn clean_handle(h: &str) -> Option<String> {
    let t = clean_text(h);
    let token = t
        .split_whitespace()
        .find(|w| w.starts_with('@'))
        .or_else(|| t.split_whitespace().next())?;
    let bare: String = token
        .trim_start_matches('@')
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!bare.is_empty()).then(|| format!("@{bare}"))
}

/// Map one raw record into a canonical candidate.
pub fn normalize_record(raw: RawRecord, source: &Source) -> Result<NewRecord, ValidationError> {
    let name = ellipsize(&clean_text(&raw.name), NAME_MAX_CHARS);
    let description = non_empty(raw.description.as_deref().map(clean_text));
    let desc_text = description.as_deref().unwrap_or_default();
    validate_candidate(&name, desc_text)?;

    let category = normalize_category(raw.category.as_deref().unwrap_or_default());
    let chain = normalize_chain(raw.chain.as_deref().unwrap_or_default());
    let website = non_empty(raw.website.as_deref().map(clean_url));
    let twitter = raw.handle.as_deref().and_then(clean_handle);
    let contract_address = non_empty(raw.contract_address.map(|c| c.trim().to_lowercase()));

    Ok(NewRecord {
        content_hash: fingerprint(&name, desc_text),
        requirements: extract_requirements(desc_text),
        eligibility_criteria: extract_eligibility(desc_text),
        name,
        description,
        category,
        status: Status::Upcoming,
        chain,
        token_symbol: None,
        estimated_value: None,
        links: OfficialLinks {
            website,
            twitter,
            ..OfficialLinks::default()
        },
        contract_address,
        priority: category.priority(),
        potential_rating: category.potential_rating(),
        restricted: source.locale != Locale::Zh,
        source_id: Some(source.id.clone()),
        source_url: raw.source_url,
    })
}
