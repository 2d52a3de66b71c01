// tests/ingest_config.rs
use std::path::Path;
use std::sync::Arc;

use airdrop_hunter::ingest::config::{default_seed, load_sources_from};
use airdrop_hunter::ingest::registry::SourceRegistry;
use airdrop_hunter::ingest::types::SourceKind;
use airdrop_hunter::store::MemoryStore;

fn shipped() -> Vec<airdrop_hunter::ingest::types::Source> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/sources.toml");
    load_sources_from(&path).expect("shipped config/sources.toml parses")
}

#[test]
fn shipped_config_matches_builtin_seed() {
    let file = shipped();
    assert_eq!(file.len(), 6);

    for seed in default_seed() {
        let f = file
            .iter()
            .find(|s| s.id == seed.id)
            .unwrap_or_else(|| panic!("{} missing from config file", seed.id));
        assert_eq!(f.kind, seed.kind, "{}", seed.id);
        assert_eq!(f.priority, seed.priority, "{}", seed.id);
        assert_eq!(f.rules, seed.rules, "{}", seed.id);
        assert!(f.active);
    }

    let api = file.iter().find(|s| s.id == "chain_registry").unwrap();
    assert_eq!(api.kind, SourceKind::StructuredApi);
    assert!(!api.active);
}

#[tokio::test]
async fn registry_orders_shipped_sources() {
    let registry = SourceRegistry::new(Arc::new(MemoryStore::new()));
    assert_eq!(registry.seed(shipped()).await.unwrap(), 6);

    let active = registry.list_active_by_priority_desc().await.unwrap();
    let ids: Vec<&str> = active.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "x_com_airdrops",
            "airdrop_alert",
            "alpha_airdrops",
            "defi_deals",
            "crypto_potato"
        ]
    );
}
