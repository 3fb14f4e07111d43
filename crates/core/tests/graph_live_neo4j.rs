//! Registry properties against a real Neo4j server.
//!
//! Set `GREF_NEO_TEST_HOST` (and optionally `GREF_NEO_TEST_PORT`,
//! `GREF_NEO_TEST_USER`, `GREF_NEO_TEST_PASS`) to run. Tests skip gracefully
//! when no server is configured. Each test uses its own label so runs do not
//! interfere; the label's nodes are removed afterwards.

use gref_core::backend::{Backend, GraphBackend, Vocabulary};
use gref_core::config::GraphConfig;
use gref_core::models::{Mapping, Status};

fn live_config() -> Option<GraphConfig> {
    let host = std::env::var("GREF_NEO_TEST_HOST").ok()?;
    let mut config = GraphConfig {
        host,
        ..GraphConfig::default()
    };
    if let Some(port) = std::env::var("GREF_NEO_TEST_PORT").ok().and_then(|p| p.parse().ok()) {
        config.port = port;
    }
    if let Ok(user) = std::env::var("GREF_NEO_TEST_USER") {
        config.username = user;
    }
    config.password = std::env::var("GREF_NEO_TEST_PASS").ok();
    Some(config)
}

async fn booted(label: &str) -> Option<GraphBackend> {
    let Some(config) = live_config() else {
        eprintln!("GREF_NEO_TEST_HOST not set, skipping live Neo4j test");
        return None;
    };
    let names = Vocabulary::new(
        vec!["salesforce".into(), "zuora".into()],
        vec![label.to_string()],
    );
    let mut backend = GraphBackend::new(config, names);
    backend.boot().await.expect("boot live neo4j");
    cleanup(&backend, label).await;
    Some(backend)
}

async fn cleanup(backend: &GraphBackend, label: &str) {
    backend
        .execute(&[format!("MATCH (o:{label}) DETACH DELETE o")])
        .await
        .expect("cleanup");
}

async fn count(backend: &GraphBackend, label: &str, canonical: &str) -> usize {
    let lookup = Mapping::for_canonical(label, canonical);
    backend
        .canonical_info(&lookup, "http://live")
        .await
        .map(|(m, _)| m.len())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_uniqueness_and_round_trip() {
    let label = "gref_live_unique";
    let Some(backend) = booted(label).await else {
        return;
    };

    let mut first = Mapping::for_source(label, "salesforce", "SF-1");
    assert_eq!(backend.map_create(&mut first).await.unwrap(), Status::Created);

    let mut second = Mapping::for_source(label, "salesforce", "SF-1");
    second.canonical = "different".into();
    assert_eq!(backend.map_create(&mut second).await.unwrap(), Status::Conflict);
    assert_eq!(second.canonical, first.canonical);

    let mut lookup = Mapping::for_source(label, "salesforce", "SF-1");
    let (canonical, _) = backend.source_info(&mut lookup).await.unwrap();
    assert_eq!(canonical, first.canonical);

    let mut retry = Mapping::for_source(label, "salesforce", "SF-1");
    retry.canonical = first.canonical.clone();
    assert_eq!(backend.map_create(&mut retry).await.unwrap(), Status::Conflict);

    let mut missing = Mapping::for_source(label, "salesforce", "nope");
    let err = backend.source_info(&mut missing).await.unwrap_err();
    assert_eq!(err.status(), Status::NotFound);

    cleanup(&backend, label).await;
}

#[tokio::test]
async fn test_extension_and_idempotent_upsert() {
    let label = "gref_live_extend";
    let Some(backend) = booted(label).await else {
        return;
    };

    let mut m = Mapping::for_source(label, "salesforce", "SF-1");
    backend.map_create(&mut m).await.unwrap();

    let mut ext = Mapping::for_canonical(label, m.canonical.clone());
    ext.source = "zuora".into();
    ext.source_id = "Z-1".into();
    backend.map_update(&ext).await.unwrap();
    backend.map_update(&ext).await.unwrap();

    let (mappings, _) = backend
        .canonical_info(&Mapping::for_canonical(label, m.canonical.clone()), "http://live")
        .await
        .unwrap();
    let mut pairs: Vec<(String, String)> = mappings
        .into_iter()
        .map(|m| (m.source, m.source_id))
        .collect();
    pairs.sort();
    assert_eq!(
        pairs,
        vec![
            ("salesforce".to_string(), "SF-1".to_string()),
            ("zuora".to_string(), "Z-1".to_string()),
        ]
    );
    assert_eq!(count(&backend, label, &m.canonical).await, 2);

    let mut other = Mapping::for_source(label, "salesforce", "SF-2");
    backend.map_create(&mut other).await.unwrap();
    let mut steal = Mapping::for_canonical(label, other.canonical.clone());
    steal.source = "salesforce".into();
    steal.source_id = "SF-1".into();
    let err = backend.map_update(&steal).await.unwrap_err();
    assert_eq!(err.status(), Status::Conflict);
    assert_eq!(count(&backend, label, &other.canonical).await, 1);

    cleanup(&backend, label).await;
}
