use std::fs;

use ivfserve::error::Result;
use ivfserve::persistence;
use ivfserve::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

fn random_vectors(seed: u64, count: usize, dimension: usize) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..dimension).map(|_| rng.random_range(-1.0..1.0)).collect())
        .collect()
}

fn build(config: IndexConfig, vectors: &[Vec<f32>]) -> Result<IndexSnapshot> {
    let mut builder = IndexBuilder::new(config)?;
    builder.add_batch(vectors)?;
    builder.build()
}

#[test]
fn test_round_trip_preserves_vectors_and_results() -> Result<()> {
    let dir = TempDir::new()?;
    let vectors = random_vectors(1, 400, 16);
    let queries = random_vectors(2, 10, 16);

    let configs = [
        IndexConfig::new(16),
        IndexConfig::new(16).with_metric(DistanceMetric::Cosine),
        IndexConfig::new(16).partitioned(IvfParams::new(12, 3)),
        IndexConfig::new(16)
            .with_metric(DistanceMetric::Cosine)
            .partitioned(IvfParams::new(5, 2)),
    ];

    for (i, config) in configs.into_iter().enumerate() {
        let path = dir.path().join(format!("index-{i}.ivfs"));
        let snapshot = build(config, &vectors)?;
        snapshot.save(&path)?;
        let loaded = IndexSnapshot::load(&path)?;

        assert_eq!(loaded.store().as_slice(), snapshot.store().as_slice());
        assert_eq!(loaded.metric(), snapshot.metric());
        assert_eq!(loaded.stats(), snapshot.stats());
        for query in &queries {
            let params = SearchParams::new(7);
            assert_eq!(loaded.search(query, &params)?, snapshot.search(query, &params)?);
        }
    }
    Ok(())
}

#[test]
fn test_file_size_matches_layout() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("flat.ivfs");
    let vectors = random_vectors(3, 10, 4);
    build(IndexConfig::new(4), &vectors)?.save(&path)?;

    let len = fs::metadata(&path)?.len() as usize;
    assert_eq!(len, persistence::HEADER_LEN + 10 * 4 * 4 + 4);
    Ok(())
}

#[test]
fn test_corrupted_file_is_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("index.ivfs");
    let vectors = random_vectors(4, 50, 3);
    build(IndexConfig::new(3).partitioned(IvfParams::new(4, 1)), &vectors)?.save(&path)?;

    let mut bytes = fs::read(&path)?;
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0x5a;
    fs::write(&path, &bytes)?;

    assert!(matches!(
        IndexSnapshot::load(&path),
        Err(IvfServeError::CorruptFormat(_))
    ));

    fs::write(&path, b"not an index")?;
    assert!(matches!(
        IndexSnapshot::load(&path),
        Err(IvfServeError::CorruptFormat(_))
    ));
    Ok(())
}

#[test]
fn test_empty_partitioned_index_round_trips() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("empty.ivfs");
    build(IndexConfig::new(8).partitioned(IvfParams::default()), &[])?.save(&path)?;

    let loaded = IndexSnapshot::load(&path)?;
    assert!(loaded.is_empty());
    assert_eq!(loaded.stats().n_partitions, 0);
    assert!(loaded.search(&[0.0; 8], &SearchParams::new(3))?.is_empty());
    Ok(())
}

#[test]
fn test_service_reload_swaps_in_saved_index() -> Result<()> {
    let dir = TempDir::new()?;
    let first = dir.path().join("first.ivfs");
    let second = dir.path().join("second.ivfs");
    build(IndexConfig::new(2), &[vec![0.0, 0.0]])?.save(&first)?;
    build(IndexConfig::new(2), &[vec![1.0, 1.0], vec![2.0, 2.0]])?.save(&second)?;

    let service = QueryService::open(&first, ServiceConfig::default())?;
    assert_eq!(service.len(), 1);

    let previous = service.reload(&second)?;
    assert_eq!(previous.len(), 1);
    assert_eq!(service.len(), 2);
    assert_eq!(service.search(&[2.0, 2.0], 1)?[0].id, 1);
    Ok(())
}
