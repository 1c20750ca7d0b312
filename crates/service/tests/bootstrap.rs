use std::fs;
use std::sync::Arc;

use catalog::{CatalogError, ListingCatalog, LoadOrigin};
use core_types::config::AppConfig;
use core_types::{ListingRecord, SelectionEvent, SessionKey};
use semantic_index::{Embedder, FlatIndex, HashEmbedder, IndexError};
use service::{BootstrapError, HomeMatch};

fn config_in(dir: &std::path::Path) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.app.data_dir = dir.to_string_lossy().into_owned();
    cfg.index.dimension = 32;
    cfg.metrics.enabled = false;
    cfg
}

#[tokio::test]
async fn loads_csv_writes_snapshot_and_serves() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(
        dir.path().join("listings.csv"),
        "id,description,price\n1,Cozy cottage with garden,300000\n2,Glass tower penthouse,900000\n",
    )?;
    let cfg = config_in(dir.path());

    let app = HomeMatch::from_config(&cfg)?;
    assert_eq!(app.catalog().len(), 2);
    assert_eq!(app.health().vectors, 2);
    assert_eq!(app.health().dimension, 32);
    assert!(matches!(app.catalog().origin(), LoadOrigin::Source { snapshot_written: true }));
    assert!(dir.path().join("listings_cache.bin").is_file());

    let session = SessionKey::generate();
    let prefs = core_types::PreferenceQuery::from_raw("", "", "", "garden, cottage", "");
    let outcome = app.search(session, &prefs).await?;
    assert_eq!(outcome.hits.len(), 2);
    assert_eq!(outcome.hits[0].listing_id.as_str(), "1");
    assert_eq!(
        app.select(session, SelectionEvent { index: 0 }),
        "Cozy cottage with garden"
    );
    assert!(app.end_session(session));
    Ok(())
}

#[test]
fn missing_listing_table_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = HomeMatch::from_config(&config_in(dir.path())).err();
    assert!(matches!(
        err,
        Some(BootstrapError::Catalog(CatalogError::SourceMissing(_)))
    ));
}

#[test]
fn vector_file_with_wrong_dimension_is_fatal() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("listings.csv"), "id,description\n1,one\n")?;
    fs::write(
        dir.path().join("vectors.jsonl"),
        "{\"embedder\": \"fnv1a-32\"}\n{\"id\": 1, \"embedding\": [0.1, 0.2]}\n",
    )?;
    let mut cfg = config_in(dir.path());
    cfg.index.vectors_path = "vectors.jsonl".into();

    let err = HomeMatch::from_config(&cfg).err();
    assert!(matches!(
        err,
        Some(BootstrapError::Index(IndexError::DimensionMismatch { .. }))
    ));
    Ok(())
}

fn write_vectors(dir: &std::path::Path, embedder_id: &str, docs: &[(u64, &str)]) -> anyhow::Result<()> {
    let embedder = HashEmbedder::new(32);
    let mut out = format!("{{\"embedder\": \"{embedder_id}\"}}\n");
    for (id, text) in docs {
        let v = embedder.embed(text)?;
        out.push_str(&serde_json::to_string(&serde_json::json!({ "id": id, "embedding": v.0 }))?);
        out.push('\n');
    }
    fs::write(dir.join("vectors.jsonl"), out)?;
    Ok(())
}

#[tokio::test]
async fn precomputed_vectors_from_matching_embedder_are_searchable() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(
        dir.path().join("listings.csv"),
        "id,description\n1,Cozy cottage with garden\n2,Glass tower penthouse\n",
    )?;
    write_vectors(
        dir.path(),
        "fnv1a-32",
        &[(1, "Cozy cottage with garden"), (2, "Glass tower penthouse")],
    )?;
    let mut cfg = config_in(dir.path());
    cfg.index.vectors_path = "vectors.jsonl".into();

    let app = HomeMatch::from_config(&cfg)?;
    assert_eq!(app.health().vectors, 2);
    let session = SessionKey::generate();
    let prefs = core_types::PreferenceQuery::from_raw("", "", "", "garden, cottage", "");
    let outcome = app.search(session, &prefs).await?;
    assert_eq!(outcome.hits[0].listing_id.as_str(), "1");
    Ok(())
}

#[test]
fn vectors_from_another_embedder_are_fatal() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("listings.csv"), "id,description\n1,one\n")?;
    write_vectors(dir.path(), "open-clip-vit-b32", &[(1, "one")])?;
    let mut cfg = config_in(dir.path());
    cfg.index.vectors_path = "vectors.jsonl".into();

    let err = HomeMatch::from_config(&cfg).err();
    assert!(matches!(
        err,
        Some(BootstrapError::Index(IndexError::EmbedderMismatch { .. }))
    ));
    Ok(())
}

#[test]
fn empty_index_fails_health_check() -> anyhow::Result<()> {
    let catalog = ListingCatalog::from_records(vec![ListingRecord::new("1", "one")])?;
    let index = FlatIndex::new(Arc::new(HashEmbedder::new(8)));
    let err = HomeMatch::from_parts(&AppConfig::default(), Arc::new(catalog), Arc::new(index)).err();
    assert!(matches!(err, Some(BootstrapError::Index(IndexError::Empty))));
    Ok(())
}
