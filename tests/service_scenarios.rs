use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ivfserve::error::Result;
use ivfserve::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

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
fn test_concurrent_searches_match_sequential() -> Result<()> {
    let vectors = random_vectors(1, 2_000, 16);
    let queries = random_vectors(2, 32, 16);
    let config = ServiceConfig {
        parallel_threshold: 500,
        chunk_size: 128,
        ..ServiceConfig::default()
    };
    let snapshot = build(IndexConfig::new(16).partitioned(IvfParams::new(8, 3)), &vectors)?;
    let service = Arc::new(QueryService::new(snapshot, config)?);

    let expected = queries
        .iter()
        .map(|q| service.search(q, 10))
        .collect::<Result<Vec<_>>>()?;

    thread::scope(|scope| {
        for _ in 0..8 {
            let service = service.clone();
            let queries = &queries;
            let expected = &expected;
            scope.spawn(move || {
                for (query, want) in queries.iter().zip(expected) {
                    assert_eq!(&service.search(query, 10).unwrap(), want);
                }
            });
        }
    });

    assert_eq!(service.search_batch(&queries, 10)?, expected);
    Ok(())
}

#[test]
fn test_swap_during_queries() -> Result<()> {
    let old_vectors = random_vectors(3, 300, 4);
    let new_vectors = random_vectors(4, 50, 4);
    let service = Arc::new(QueryService::new(
        build(IndexConfig::new(4), &old_vectors)?,
        ServiceConfig::default(),
    )?);
    let replacement = build(IndexConfig::new(4), &new_vectors)?;

    thread::scope(|scope| {
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let service = service.clone();
                scope.spawn(move || {
                    for _ in 0..200 {
                        // Each query sees either the old or the new index, never a mix.
                        let snapshot = service.snapshot();
                        let results = snapshot.search(&[0.0; 4], &SearchParams::new(400)).unwrap();
                        assert!(results.len() == 300 || results.len() == 50);
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(1));
        service.swap(replacement);

        for reader in readers {
            reader.join().unwrap();
        }
    });

    assert_eq!(service.len(), 50);
    Ok(())
}

#[test]
fn test_deadline_exceeded_is_an_error() -> Result<()> {
    let vectors = random_vectors(5, 100, 4);
    let service = QueryService::new(
        build(IndexConfig::new(4), &vectors)?,
        ServiceConfig::default().with_query_timeout(Duration::ZERO),
    )?;

    let err = service.search(&[0.0; 4], 5).unwrap_err();
    assert!(matches!(err, IvfServeError::DeadlineExceeded { .. }));
    assert!(err.is_retryable());

    // Explicit parameters bypass the configured timeout.
    assert_eq!(service.search_with(&[0.0; 4], &SearchParams::new(5))?.len(), 5);
    Ok(())
}

#[test]
fn test_non_finite_queries_are_rejected() -> Result<()> {
    let vectors = random_vectors(6, 64, 2);
    let service = QueryService::new(
        build(IndexConfig::new(2).partitioned(IvfParams::new(4, 4)), &vectors)?,
        ServiceConfig::default(),
    )?;

    for query in [[f32::NAN, 0.0], [0.0, f32::INFINITY], [f32::NEG_INFINITY, 1.0]] {
        assert!(matches!(
            service.search(&query, 2),
            Err(IvfServeError::InvalidArgument(_))
        ));
        assert!(matches!(
            service.search_with(&query, &SearchParams::new(2)),
            Err(IvfServeError::InvalidArgument(_))
        ));
    }

    let batch = vec![vec![0.0f32, 0.0], vec![f32::NAN, 0.0]];
    assert!(matches!(
        service.search_batch(&batch, 2),
        Err(IvfServeError::InvalidArgument(_))
    ));

    // Snapshots reject them too when searched directly.
    let snapshot = service.snapshot();
    assert!(snapshot.search(&[f32::NAN, 0.0], &SearchParams::new(2)).is_err());

    let results = service.search(&[0.0, 0.0], 2)?;
    assert!(results.iter().all(|r| r.distance.is_finite() && r.distance >= 0.0));
    Ok(())
}

#[test]
fn test_handler_end_to_end() -> Result<()> {
    let vectors = random_vectors(6, 64, 3);
    let service = Arc::new(QueryService::new(
        build(IndexConfig::new(3), &vectors)?,
        ServiceConfig::default(),
    )?);
    let handler = SearchHandler::new(service.clone(), Arc::new(PrecomputedEmbedder::new(3)));

    let queries: Vec<String> = vectors[..4]
        .iter()
        .map(|v| serde_json::to_string(v).unwrap())
        .collect();

    let responses = tokio_test::block_on(futures::future::join_all(
        queries
            .iter()
            .map(|q| handler.handle(SearchRequest::new(q.clone()).with_top_k(3))),
    ));

    for (i, response) in responses.into_iter().enumerate() {
        let response = response?;
        assert_eq!(response.query, queries[i]);
        assert_eq!(response.results.len(), 3);
        assert_eq!(response.results[0].index, i as u64);
    }

    let missing_k = tokio_test::block_on(handler.handle(SearchRequest::new(queries[0].clone())))?;
    assert_eq!(missing_k.results.len(), 5);

    let bad = tokio_test::block_on(handler.handle(SearchRequest::new("[1.0, 2.0]")));
    assert!(matches!(bad, Err(IvfServeError::DimensionMismatch { .. })));
    Ok(())
}
