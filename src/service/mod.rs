//! Concurrent query serving over an atomically swappable snapshot.

pub mod config;

use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use parking_lot::RwLock;
use rayon::prelude::*;

use crate::error::{IvfServeError, Result};
use crate::vector::index::builder::IndexBuilder;
use crate::vector::index::check_finite;
use crate::vector::index::config::IndexConfig;
use crate::vector::index::snapshot::{IndexSnapshot, IndexStats};
use crate::vector::search::{SearchParams, SearchResult};

pub use config::ServiceConfig;

/// Serves top-k queries against the current [`IndexSnapshot`].
///
/// Each query clones the `Arc` of the current snapshot under a short read
/// lock and then runs without holding any lock. [`QueryService::swap`]
/// replaces the snapshot for later queries while in-flight ones finish on the
/// snapshot they started with.
#[derive(Debug)]
pub struct QueryService {
    current: RwLock<Arc<IndexSnapshot>>,
    config: ServiceConfig,
}

impl QueryService {
    pub fn new(snapshot: IndexSnapshot, config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            current: RwLock::new(Arc::new(snapshot)),
            config,
        })
    }

    /// Load an index file and serve it.
    pub fn open<P: AsRef<Path>>(path: P, config: ServiceConfig) -> Result<Self> {
        Self::new(IndexSnapshot::load(path)?, config)
    }

    /// The snapshot new queries run against.
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.current.read().clone()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Top-`k` neighbors of `query` using the configured probe count and timeout.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.search_with(query, &self.config.search_params(k))
    }

    /// Top-k search with explicit parameters.
    pub fn search_with(&self, query: &[f32], params: &SearchParams) -> Result<Vec<SearchResult>> {
        let snapshot = self.snapshot();
        Self::check_request(&snapshot, query, params)?;
        snapshot.search(query, params)
    }

    /// Run several queries in parallel. Results come back in input order.
    ///
    /// All queries see the same snapshot and share one deadline.
    pub fn search_batch<V>(&self, queries: &[V], k: usize) -> Result<Vec<Vec<SearchResult>>>
    where
        V: AsRef<[f32]> + Sync,
    {
        let snapshot = self.snapshot();
        let params = self.config.search_params(k);
        for query in queries {
            Self::check_request(&snapshot, query.as_ref(), &params)?;
        }

        queries
            .par_iter()
            .map(|query| snapshot.search(query.as_ref(), &params))
            .collect()
    }

    /// Replace the served snapshot and return the previous one.
    pub fn swap(&self, snapshot: IndexSnapshot) -> Arc<IndexSnapshot> {
        let snapshot = Arc::new(snapshot);
        let previous = {
            let mut guard = self.current.write();
            std::mem::replace(&mut *guard, snapshot.clone())
        };

        if previous.dimension() != snapshot.dimension() {
            warn!(
                "Swapped index changes dimension from {} to {}",
                previous.dimension(),
                snapshot.dimension()
            );
        }
        info!(
            "Swapped in {} index with {} vectors (previous had {})",
            snapshot.index().mode().name(),
            snapshot.len(),
            previous.len()
        );
        previous
    }

    /// Load `path` without disturbing queries, then swap it in.
    pub fn reload<P: AsRef<Path>>(&self, path: P) -> Result<Arc<IndexSnapshot>> {
        let snapshot = IndexSnapshot::load(path)?;
        Ok(self.swap(snapshot))
    }

    /// Build a new index from `vectors`, persist it to `path`, then swap it in.
    ///
    /// Queries keep running against the old snapshot for the whole build.
    pub fn rebuild<V, P>(
        &self,
        config: IndexConfig,
        vectors: &[V],
        path: P,
    ) -> Result<Arc<IndexSnapshot>>
    where
        V: AsRef<[f32]>,
        P: AsRef<Path>,
    {
        let mut builder = IndexBuilder::with_capacity(config, vectors.len())?;
        builder.add_batch(vectors)?;
        let snapshot = builder.build()?;
        snapshot.save(path)?;
        Ok(self.swap(snapshot))
    }

    pub fn dimension(&self) -> usize {
        self.snapshot().dimension()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        self.snapshot().stats()
    }

    fn check_request(snapshot: &IndexSnapshot, query: &[f32], params: &SearchParams) -> Result<()> {
        if query.len() != snapshot.dimension() {
            return Err(IvfServeError::dimension_mismatch(
                snapshot.dimension(),
                query.len(),
            ));
        }
        check_finite(query)?;
        params.validate()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::vector::index::config::IvfParams;

    fn example_snapshot() -> IndexSnapshot {
        let mut builder = IndexBuilder::new(IndexConfig::new(2)).unwrap();
        builder
            .add_batch(&[[0.0f32, 0.0], [1.0, 0.0], [0.0, 1.0], [5.0, 5.0]])
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_search_worked_example() {
        let service = QueryService::new(example_snapshot(), ServiceConfig::default()).unwrap();
        let results = service.search(&[0.0, 0.1], 2).unwrap();

        let ids: Vec<_> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert!((results[0].distance - 0.01).abs() < 1e-6);
        assert!((results[1].distance - 0.81).abs() < 1e-6);
    }

    #[test]
    fn test_request_validation() {
        let service = QueryService::new(example_snapshot(), ServiceConfig::default()).unwrap();
        assert!(matches!(
            service.search(&[0.0, 0.0, 0.0], 1),
            Err(IvfServeError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
        assert!(matches!(
            service.search(&[0.0, 0.0], 0),
            Err(IvfServeError::InvalidArgument(_))
        ));

        // k larger than the collection returns everything.
        assert_eq!(service.search(&[0.0, 0.0], 100).unwrap().len(), 4);
    }

    #[test]
    fn test_batch_preserves_input_order() {
        let service = QueryService::new(example_snapshot(), ServiceConfig::default()).unwrap();
        let queries = vec![vec![5.0f32, 5.0], vec![0.0, 0.0], vec![1.0, 0.1]];

        let results = service.search_batch(&queries, 1).unwrap();
        let top: Vec<_> = results.iter().map(|r| r[0].id).collect();
        assert_eq!(top, vec![3, 0, 1]);

        let bad = vec![vec![0.0f32, 0.0], vec![1.0]];
        assert!(service.search_batch(&bad, 1).is_err());
    }

    #[test]
    fn test_swap_keeps_old_snapshot_alive() {
        let service = QueryService::new(example_snapshot(), ServiceConfig::default()).unwrap();
        let held = service.snapshot();

        let mut builder = IndexBuilder::new(IndexConfig::new(2)).unwrap();
        builder.add(&[9.0, 9.0]).unwrap();
        let previous = service.swap(builder.build().unwrap());

        assert!(Arc::ptr_eq(&previous, &held));
        assert_eq!(held.len(), 4);
        assert_eq!(service.len(), 1);
        assert_eq!(service.search(&[0.0, 0.0], 5).unwrap().len(), 1);
    }

    #[test]
    fn test_rebuild_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rebuilt.ivfs");
        let service = QueryService::new(example_snapshot(), ServiceConfig::default()).unwrap();

        let vectors: Vec<Vec<f32>> = (0..20).map(|i| vec![i as f32, (i % 3) as f32]).collect();
        let config = IndexConfig::new(2).partitioned(IvfParams::new(4, 4));
        service.rebuild(config, &vectors, &path).unwrap();

        assert_eq!(service.len(), 20);
        assert!(service.stats().is_partitioned());

        let before = service.search(&[7.2, 1.0], 3).unwrap();
        service.reload(&path).unwrap();
        assert_eq!(service.search(&[7.2, 1.0], 3).unwrap(), before);
    }

    #[test]
    fn test_query_timeout() {
        let config = ServiceConfig::default().with_query_timeout(Duration::ZERO);
        let service = QueryService::new(example_snapshot(), config).unwrap();

        let err = service.search(&[0.0, 0.0], 1).unwrap_err();
        assert!(err.is_retryable());
    }
}
