// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::types::{ExtractionRules, Locale, Source, SourceKind};

const ENV_PATH: &str = "SOURCES_CONFIG_PATH";

/// Load source definitions from an explicit path. Supports TOML or JSON formats.
pub fn load_sources_from(path: &Path) -> Result<Vec<Source>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
        .with_context(|| format!("parsing sources from {}", path.display()))
}

/// Load sources using env var + fallbacks:
/// 1) $SOURCES_CONFIG_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
/// 4) built-in seed
pub fn load_sources_default() -> Result<Vec<Source>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("SOURCES_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(default_seed())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<Source>> {
    let try_toml = hint_ext == "toml" || s.contains("[[sources]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported sources format"))
}

fn parse_toml(s: &str) -> Result<Vec<Source>> {
    #[derive(serde::Deserialize)]
    struct TomlSources {
        sources: Vec<Source>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(clean_sources(v.sources))
}

fn parse_json(s: &str) -> Result<Vec<Source>> {
    let v: Vec<Source> = serde_json::from_str(s)?;
    Ok(clean_sources(v))
}

/// Trim ids, drop empty ones; on duplicate ids the last definition wins (first position kept).
fn clean_sources(items: Vec<Source>) -> Vec<Source> {
    let mut out: Vec<Source> = Vec::with_capacity(items.len());
    for mut src in items {
        src.id = src.id.trim().to_string();
        if src.id.is_empty() {
            tracing::warn!(target: "ingest", name = %src.name, "source without id ignored");
            continue;
        }
        if let Some(pos) = out.iter().position(|s| s.id == src.id) {
            out[pos] = src;
        } else {
            out.push(src);
        }
    }
    out
}

fn webpage(
    id: &str,
    name: &str,
    endpoint: &str,
    priority: i32,
    rules: ExtractionRules,
) -> Source {
    Source {
        id: id.into(),
        name: name.into(),
        endpoint: endpoint.into(),
        kind: SourceKind::Webpage,
        locale: Locale::En,
        priority,
        active: true,
        rules: Some(rules),
        query: None,
        last_run_at: None,
    }
}

fn rules(
    container: &str,
    name: &str,
    description: &str,
    category: &str,
    chain: &str,
    website: Option<&str>,
) -> ExtractionRules {
    ExtractionRules {
        container: Some(container.into()),
        name: Some(name.into()),
        description: Some(description.into()),
        category: Some(category.into()),
        chain: Some(chain.into()),
        website: website.map(String::from),
        handle: None,
    }
}

/// Sources used when no configuration file is present.
pub fn default_seed() -> Vec<Source> {
    vec![
        Source {
            id: "x_com_airdrops".into(),
            name: "X.com Airdrop Hunters".into(),
            endpoint: "https://twitter.com/search?q=%23airdrop%20%23crypto&src=typed_query".into(),
            kind: SourceKind::SocialSearch,
            locale: Locale::En,
            priority: 10,
            active: true,
            rules: None,
            query: Some("#airdrop crypto".into()),
            last_run_at: None,
        },
        webpage(
            "airdrop_alert",
            "Airdrop Alert",
            "https://airdropalert.com",
            9,
            rules(".card-airdrop", ".card-title", ".card-text", ".badge-category", ".badge-chain", None),
        ),
        webpage(
            "defi_deals",
            "DeFi Deals Airdrops",
            "https://defi-deals.com/airdrops",
            8,
            rules(
                ".airdrop-card",
                "h3.airdrop-title",
                ".airdrop-description",
                ".airdrop-category",
                ".airdrop-chain",
                Some(".airdrop-website"),
            ),
        ),
        webpage(
            "alpha_airdrops",
            "Alpha Airdrops",
            "https://alpha.airdrops.io",
            8,
            rules(".airdrop-item", ".project-name", ".project-desc", ".project-category", ".project-chain", None),
        ),
        webpage(
            "crypto_potato",
            "CryptoPotato Airdrops",
            "https://cryptopotato.com/crypto-airdrops/",
            7,
            rules(".airdrop-entry", "h3", "p", ".category-tag", ".chain-tag", None),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn toml_and_json_formats_work() {
        let toml = r#"
            [[sources]]
            id = " defi_deals "
            name = "DeFi Deals"
            endpoint = "https://defi-deals.com/airdrops"
            kind = "webpage"
            priority = 8

            [sources.rules]
            container = ".airdrop-card"
            name = "h3"

            [[sources]]
            id = ""
            name = "nameless"
            endpoint = "https://x.test"
            kind = "webpage"
        "#;
        let out = parse_toml(toml).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "defi_deals");
        assert!(out[0].active);
        assert_eq!(out[0].locale, Locale::En);
        assert_eq!(
            out[0].rules.as_ref().and_then(|r| r.container.as_deref()),
            Some(".airdrop-card")
        );

        let json = r#"[
            {"id": "cn", "name": "CN", "endpoint": "https://cn.test", "kind": "webpage", "locale": "zh", "priority": 1},
            {"id": "cn", "name": "CN v2", "endpoint": "https://cn.test", "kind": "structured-api", "active": false}
        ]"#;
        let out = parse_json(json).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "CN v2");
        assert_eq!(out[0].kind, SourceKind::StructuredApi);
        assert!(!out[0].active);
    }

    #[test]
    fn seed_is_priority_ordered_and_unique() {
        let seed = default_seed();
        assert_eq!(seed.len(), 5);
        let prios: Vec<i32> = seed.iter().map(|s| s.priority).collect();
        assert_eq!(prios, vec![10, 9, 8, 8, 7]);
        assert_eq!(clean_sources(seed.clone()).len(), seed.len());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_PATH);

        // no files in CWD -> seed
        let v = load_sources_default().unwrap();
        assert_eq!(v.len(), default_seed().len());

        // env wins
        let p_json = tmp.path().join("sources.json");
        fs::write(
            &p_json,
            r#"[{"id":"only","name":"Only","endpoint":"https://o.test","kind":"webpage"}]"#,
        )
        .unwrap();
        env::set_var(ENV_PATH, p_json.display().to_string());
        let v2 = load_sources_default().unwrap();
        assert_eq!(v2.len(), 1);
        assert_eq!(v2[0].id, "only");

        env::set_var(ENV_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(load_sources_default().is_err());
        env::remove_var(ENV_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
