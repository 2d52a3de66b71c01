// src/dedup/similarity.rs
//! Set-similarity primitives used by the fuzzy-name and content tiers.

use std::collections::HashSet;
use std::hash::Hash;

/// Domain lexicon for description keyword sets.
pub const DOMAIN_LEXICON: [&str; 26] = [
    "airdrop",
    "token",
    "crypto",
    "blockchain",
    "ethereum",
    "bitcoin",
    "defi",
    "nft",
    "dao",
    "web3",
    "smart",
    "contract",
    "wallet",
    "metamask",
    "claim",
    "free",
    "distribution",
    "reward",
    "staking",
    "farming",
    "liquidity",
    "yield",
    "governance",
    "protocol",
    "dex",
    "cex",
];

/// Jaccard index. Two empty sets count as a full match; one empty set as none.
pub fn jaccard<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count();
    let union = a.len() + b.len() - inter;
    inter as f64 / union as f64
}

/// Lowercased words longer than two characters.
pub fn name_tokens(name: &str) -> HashSet<String> {
    name.split_whitespace()
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 2)
        .collect()
}

/// Lexicon words present in `text`, matched on alphanumeric word boundaries.
pub fn keyword_set(text: &str) -> HashSet<&'static str> {
    let words: HashSet<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    DOMAIN_LEXICON
        .iter()
        .copied()
        .filter(|k| words.contains(*k))
        .collect()
}

/// Host without a leading `www.`; bare domains are accepted.
pub fn registrable_domain(website: &str) -> Option<String> {
    let t = website.trim();
    if t.is_empty() {
        return None;
    }
    let with_scheme = if t.contains("://") {
        t.to_string()
    } else {
        format!("https://{}", t.trim_start_matches("//"))
    };
    let host = url::Url::parse(&with_scheme)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))?;
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    (!host.is_empty()).then_some(host)
}
