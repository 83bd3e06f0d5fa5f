//! Immutable store/index pairs served to queries.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IvfServeError, Result};
use crate::persistence;
use crate::vector::core::distance::DistanceMetric;
use crate::vector::index::{IndexMode, VectorIndex};
use crate::vector::search::{SearchParams, SearchResult};
use crate::vector::store::VectorStore;

/// A fully built `(VectorStore, VectorIndex)` pair.
///
/// Snapshots are never mutated once constructed. Serving code shares them
/// behind an `Arc`, and a rebuild produces a new snapshot rather than
/// touching an existing one.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    store: VectorStore,
    index: VectorIndex,
}

impl IndexSnapshot {
    /// Pair a store with the index built over it.
    pub fn new(store: VectorStore, index: VectorIndex) -> Result<Self> {
        if let VectorIndex::Partitioned(ivf) = &index {
            let assigned: usize = ivf.partition_sizes().iter().sum();
            if assigned != store.size() {
                return Err(IvfServeError::invalid_argument(format!(
                    "partitioned index covers {} of {} vectors",
                    assigned,
                    store.size()
                )));
            }
            if ivf.is_trained() && ivf.centroids().dimension() != store.dimension() {
                return Err(IvfServeError::dimension_mismatch(
                    store.dimension(),
                    ivf.centroids().dimension(),
                ));
            }
        }
        Ok(Self { store, index })
    }

    /// Read a snapshot written by [`IndexSnapshot::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        persistence::load(path)
    }

    /// Persist this snapshot to a single file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        persistence::save(&self.store, &self.index, path)
    }

    pub fn search(&self, query: &[f32], params: &SearchParams) -> Result<Vec<SearchResult>> {
        self.index.search(&self.store, query, params)
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    pub fn len(&self) -> usize {
        self.store.size()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn metric(&self) -> DistanceMetric {
        self.index.metric()
    }

    pub fn into_parts(self) -> (VectorStore, VectorIndex) {
        (self.store, self.index)
    }

    /// Summary statistics for inspection and logging.
    pub fn stats(&self) -> IndexStats {
        let (n_partitions, n_probe, sizes) = match &self.index {
            VectorIndex::Flat(_) => (0, 0, Vec::new()),
            VectorIndex::Partitioned(ivf) => {
                (ivf.n_partitions(), ivf.n_probe(), ivf.partition_sizes())
            }
        };

        IndexStats {
            vector_count: self.store.size(),
            dimension: self.store.dimension(),
            metric: self.metric(),
            mode: self.index.mode().name().to_string(),
            n_partitions,
            n_probe,
            min_partition_size: sizes.iter().copied().min(),
            max_partition_size: sizes.iter().copied().max(),
            memory_usage_bytes: self.store.memory_usage() + self.index.memory_usage(),
        }
    }
}

/// Index statistics for analysis and debugging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub vector_count: usize,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub mode: String,
    pub n_partitions: usize,
    pub n_probe: usize,
    pub min_partition_size: Option<usize>,
    pub max_partition_size: Option<usize>,
    pub memory_usage_bytes: usize,
}

impl IndexStats {
    pub fn is_partitioned(&self) -> bool {
        self.mode == IndexMode::Partitioned.name()
    }
}
