//! Offline construction of index snapshots.

use std::ops::Range;

use log::info;

use crate::error::{IvfServeError, Result};
use crate::vector::index::config::{IndexConfig, IndexKind};
use crate::vector::index::flat::FlatIndex;
use crate::vector::index::ivf::IvfIndex;
use crate::vector::index::snapshot::IndexSnapshot;
use crate::vector::index::VectorIndex;
use crate::vector::store::{VectorId, VectorStore};

/// Builder that accumulates vectors and produces an [`IndexSnapshot`].
///
/// Flat indexes are ready immediately. Partitioned indexes collect vectors
/// until [`IndexBuilder::train`] (or [`IndexBuilder::build`]) clusters them;
/// vectors added after training go straight to their nearest partition.
#[derive(Debug)]
pub struct IndexBuilder {
    config: IndexConfig,
    store: VectorStore,
    index: Option<VectorIndex>,
}

impl IndexBuilder {
    pub fn new(config: IndexConfig) -> Result<Self> {
        Self::with_capacity(config, 0)
    }

    /// Pre-size the store for `capacity` vectors.
    pub fn with_capacity(config: IndexConfig, capacity: usize) -> Result<Self> {
        config.validate()?;
        let store = VectorStore::with_capacity(config.dimension, capacity);
        let index = match &config.kind {
            IndexKind::Flat => Some(VectorIndex::Flat(FlatIndex::new(config.metric))),
            IndexKind::Partitioned(_) => None,
        };
        Ok(Self {
            config,
            store,
            index,
        })
    }

    /// Add one vector and return its id.
    pub fn add(&mut self, vector: &[f32]) -> Result<VectorId> {
        let ids = self.add_batch(&[vector])?;
        Ok(ids.start)
    }

    /// Add several vectors. Either all are added or none.
    pub fn add_batch<V: AsRef<[f32]>>(&mut self, vectors: &[V]) -> Result<Range<VectorId>> {
        if let Some(position) = vectors
            .iter()
            .position(|v| v.as_ref().iter().any(|x| !x.is_finite()))
        {
            return Err(IvfServeError::invalid_argument(format!(
                "vector {position} of the batch contains NaN or infinite values"
            )));
        }

        let ids = self.store.add_batch(vectors)?;
        if let Some(index) = &mut self.index {
            index.add(&self.store, ids.clone())?;
        }
        Ok(ids)
    }

    /// Cluster the vectors added so far. No-op for flat indexes or when
    /// already trained.
    pub fn train(&mut self) -> Result<()> {
        if self.index.is_some() {
            return Ok(());
        }
        let IndexKind::Partitioned(params) = &self.config.kind else {
            return Ok(());
        };

        let mut ivf = IvfIndex::train(&self.store, self.config.metric, params)?;
        ivf.add(&self.store, 0..self.store.size() as VectorId)?;
        let removed = ivf.remove_empty_partitions()?;
        if removed > 0 {
            info!("Removed {removed} empty partitions left by duplicate vectors");
        }
        info!(
            "Trained partitioned index: {} partitions over {} vectors",
            ivf.n_partitions(),
            self.store.size()
        );
        self.index = Some(VectorIndex::Partitioned(ivf));
        Ok(())
    }

    pub fn is_trained(&self) -> bool {
        self.index.is_some()
    }

    pub fn len(&self) -> usize {
        self.store.size()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Finish the build, training first if needed.
    pub fn build(mut self) -> Result<IndexSnapshot> {
        self.train()?;
        let index = self.index.ok_or_else(|| {
            IvfServeError::invalid_argument("index was not trained before building")
        })?;

        info!(
            "Built {} index with {} vectors of dimension {} ({})",
            index.mode().name(),
            self.store.size(),
            self.store.dimension(),
            index.metric()
        );
        IndexSnapshot::new(self.store, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::index::config::IvfParams;
    use crate::vector::search::SearchParams;

    #[test]
    fn test_flat_build() {
        let mut builder = IndexBuilder::new(IndexConfig::new(2)).unwrap();
        assert!(builder.is_trained());
        assert_eq!(builder.add(&[1.0, 2.0]).unwrap(), 0);
        assert_eq!(builder.add_batch(&[[3.0f32, 4.0], [5.0, 6.0]]).unwrap(), 1..3);

        let snapshot = builder.build().unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.store().get(2).unwrap(), &[5.0, 6.0]);
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut builder = IndexBuilder::new(IndexConfig::new(2)).unwrap();
        assert!(builder.add(&[f32::NAN, 0.0]).is_err());
        assert!(builder.is_empty());
    }

    #[test]
    fn test_partitioned_add_after_training() {
        let config = IndexConfig::new(2).partitioned(IvfParams::new(2, 1));
        let mut builder = IndexBuilder::new(config).unwrap();
        builder
            .add_batch(&[[0.0f32, 0.0], [0.1, 0.0], [10.0, 10.0], [10.1, 10.0]])
            .unwrap();
        assert!(!builder.is_trained());

        builder.train().unwrap();
        assert!(builder.is_trained());
        builder.add(&[9.9, 10.2]).unwrap();

        let snapshot = builder.build().unwrap();
        let ivf = snapshot.index().as_partitioned().unwrap();
        assert_eq!(ivf.n_partitions(), 2);
        let mut sizes = ivf.partition_sizes();
        sizes.sort();
        assert_eq!(sizes, vec![2, 3]);

        let results = snapshot
            .search(&[10.0, 10.0], &SearchParams::new(3))
            .unwrap();
        let mut ids: Vec<_> = results.iter().map(|r| r.id).collect();
        ids.sort();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn test_duplicate_vectors_leave_no_empty_partition() {
        let config = IndexConfig::new(2).partitioned(IvfParams::new(3, 1));
        let mut builder = IndexBuilder::new(config).unwrap();
        for _ in 0..10 {
            builder.add(&[0.0, 0.0]).unwrap();
        }
        for _ in 0..10 {
            builder.add(&[1.0, 1.0]).unwrap();
        }

        let snapshot = builder.build().unwrap();
        let ivf = snapshot.index().as_partitioned().unwrap();
        let sizes = ivf.partition_sizes();
        assert!(sizes.iter().all(|&size| size > 0), "sizes: {sizes:?}");
        assert_eq!(sizes.iter().sum::<usize>(), 20);
        assert_eq!(ivf.centroids().size(), ivf.n_partitions());
        assert!(ivf.n_probe() <= ivf.n_partitions());

        let results = snapshot
            .search(&[1.0, 1.0], &SearchParams::new(10).with_n_probe(3))
            .unwrap();
        assert!(results.iter().all(|r| r.id >= 10 && r.distance == 0.0));
    }

    #[test]
    fn test_partitioned_empty_build() {
        let config = IndexConfig::new(3).partitioned(IvfParams::default());
        let snapshot = IndexBuilder::new(config).unwrap().build().unwrap();
        assert!(snapshot.is_empty());
        let results = snapshot
            .search(&[0.0, 0.0, 0.0], &SearchParams::new(5))
            .unwrap();
        assert!(results.is_empty());
    }
}
