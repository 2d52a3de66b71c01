// src/ingest/providers/webpage.rs
//! Webpage collector: lightweight GET first, rendered fetch when the page fails to load or
//! lacks the container elements, then locator-driven extraction.

use metrics::histogram;
use scraper::{ElementRef, Html, Selector};

use crate::error::CollectError;
use crate::ingest::fetch::PageFetcher;
use crate::ingest::render::RenderEngine;
use crate::ingest::types::{ExtractionRules, RawRecord, Source};

pub const GENERIC_CONTAINER: &str = r#".airdrop, .airdrop-item, [class*="airdrop"]"#;
pub const GENERIC_NAME: &str = "h1, h2, h3, .title, .name";
pub const GENERIC_DESCRIPTION: &str = "p, .description, .desc";
pub const GENERIC_CATEGORY: &str = ".category, .tag, .badge";
pub const GENERIC_CHAIN: &str = ".blockchain, .chain, .network";
pub const GENERIC_WEBSITE: &str = r#"a[href*="http"], a[href^="/"], .website, .link"#;

struct Locators {
    container: Selector,
    name: Selector,
    description: Selector,
    category: Selector,
    chain: Selector,
    website: Selector,
    handle: Option<Selector>,
}

fn parse_selector(field: &str, css: &str) -> Result<Selector, CollectError> {
    Selector::parse(css)
        .map_err(|e| CollectError::Extraction(format!("invalid {field} locator `{css}`: {e}")))
}

impl Locators {
    /// Configured locators override the generic ones field by field.
    fn compile(rules: Option<&ExtractionRules>) -> Result<Self, CollectError> {
        let pick = |configured: Option<&String>, generic: &'static str| -> String {
            configured
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .unwrap_or(generic)
                .to_string()
        };
        let r = rules.cloned().unwrap_or_default();
        Ok(Self {
            container: parse_selector("container", &pick(r.container.as_ref(), GENERIC_CONTAINER))?,
            name: parse_selector("name", &pick(r.name.as_ref(), GENERIC_NAME))?,
            description: parse_selector(
                "description",
                &pick(r.description.as_ref(), GENERIC_DESCRIPTION),
            )?,
            category: parse_selector("category", &pick(r.category.as_ref(), GENERIC_CATEGORY))?,
            chain: parse_selector("chain", &pick(r.chain.as_ref(), GENERIC_CHAIN))?,
            website: parse_selector("website", &pick(r.website.as_ref(), GENERIC_WEBSITE))?,
            handle: r
                .handle
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(|css| parse_selector("handle", css))
                .transpose()?,
        })
    }
}

fn first_text(el: &ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel)
        .next()
        .map(|e| e.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

fn first_href(el: &ElementRef<'_>, sel: &Selector, base: &str) -> Option<String> {
    let found = el.select(sel).next()?;
    let raw = found
        .value()
        .attr("href")
        .map(str::to_string)
        .or_else(|| Some(found.text().collect::<String>()))?;
    resolve_href(base, raw.trim())
}

/// Root-relative links resolve against the page; everything else is left to URL cleanup.
fn resolve_href(base: &str, href: &str) -> Option<String> {
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    if href.starts_with('/') && !href.starts_with("//") {
        return url::Url::parse(base)
            .and_then(|b| b.join(href))
            .map(|u| u.to_string())
            .ok();
    }
    Some(href.to_string())
}

/// Extract records from `html`. `Ok(None)` means the container locator matched nothing.
pub fn extract_records(
    html: &str,
    rules: Option<&ExtractionRules>,
    source: &Source,
) -> Result<Option<Vec<RawRecord>>, CollectError> {
    let loc = Locators::compile(rules)?;
    let doc = Html::parse_document(html);

    let containers: Vec<ElementRef<'_>> = doc.select(&loc.container).collect();
    if containers.is_empty() {
        return Ok(None);
    }

    let mut out = Vec::with_capacity(containers.len());
    for el in containers {
        let Some(name) = first_text(&el, &loc.name) else {
            continue;
        };
        out.push(RawRecord {
            source_id: source.id.clone(),
            name,
            description: first_text(&el, &loc.description),
            category: first_text(&el, &loc.category),
            chain: first_text(&el, &loc.chain),
            website: first_href(&el, &loc.website, &source.endpoint),
            handle: loc.handle.as_ref().and_then(|h| first_text(&el, h)),
            contract_address: None,
            source_url: Some(source.endpoint.clone()),
        });
    }
    Ok(Some(out))
}

pub async fn collect(
    http: &dyn PageFetcher,
    renderer: Option<&RenderEngine>,
    source: &Source,
) -> Result<Vec<RawRecord>, CollectError> {
    let t0 = std::time::Instant::now();
    let rules = source.rules.as_ref();
    // Reject bad locators before touching the network.
    Locators::compile(rules)?;

    let light_err = match http.fetch(&source.endpoint).await {
        Ok(body) => match extract_records(&body, rules, source)? {
            Some(records) => {
                record_parse(t0, records.len(), "http");
                return Ok(records);
            }
            None => {
                tracing::debug!(target: "ingest", source = %source.id, "no containers in lightweight fetch");
                None
            }
        },
        Err(e) => {
            tracing::debug!(target: "ingest", source = %source.id, error = %e, "lightweight fetch failed");
            Some(e)
        }
    };

    let Some(renderer) = renderer else {
        return match light_err {
            Some(e) => Err(e.into()),
            None => Ok(Vec::new()),
        };
    };

    match renderer.render(&source.endpoint).await {
        Ok(body) => {
            let records = extract_records(&body, rules, source)?.unwrap_or_default();
            record_parse(t0, records.len(), "render");
            Ok(records)
        }
        Err(render_err) => {
            tracing::warn!(target: "ingest", source = %source.id, error = %render_err, "rendered fetch failed");
            Err(light_err.unwrap_or(render_err).into())
        }
    }
}

fn record_parse(t0: std::time::Instant, n: usize, via: &'static str) {
    histogram!("ingest_parse_ms", "via" => via).record(t0.elapsed().as_secs_f64() * 1_000.0);
    tracing::debug!(target: "ingest", records = n, via, "page extracted");
}
