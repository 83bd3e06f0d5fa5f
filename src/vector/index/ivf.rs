//! IVF (inverted file) vector index.
//!
//! Vectors are clustered into partitions around k-means centroids. A query is
//! compared against every centroid, and only the `nprobe` closest partitions
//! are scanned exhaustively.
//!
//! # Approximation
//!
//! Results are approximate: if a true nearest neighbor was assigned to a
//! partition that is not among the `nprobe` probed ones, it is missed. Recall
//! grows with `nprobe`, and with `nprobe == n_partitions` every stored vector
//! is scanned, so the result equals a flat search.

pub mod builder;


use std::ops::Range;

use log::warn;
use rayon::prelude::*;

use crate::error::{IvfServeError, Result};
use crate::vector::core::distance::DistanceMetric;
use crate::vector::index::config::IvfParams;
use crate::vector::index::ivf::builder::{CentroidTrainer, nearest_centroid};
use crate::vector::index::validate_query;
use crate::vector::search::{SearchParams, SearchResult, TopKCollector};
use crate::vector::store::{VectorId, VectorStore};

/// Partitioned index: centroids plus one sorted id list per partition.
#[derive(Debug, Clone, PartialEq)]
pub struct IvfIndex {
    metric: DistanceMetric,
    n_probe: usize,
    centroids: VectorStore,
    lists: Vec<Vec<VectorId>>,
}

impl IvfIndex {
    /// Train centroids on `store`. The returned index has empty lists; call
    /// [`IvfIndex::add`] to assign vectors.
    pub fn train(store: &VectorStore, metric: DistanceMetric, params: &IvfParams) -> Result<Self> {
        params.validate()?;
        if !store.is_empty() && params.n_partitions > store.size() {
            warn!(
                "Requested {} partitions for {} vectors; using {}",
                params.n_partitions,
                store.size(),
                store.size()
            );
        }
        let centroids = CentroidTrainer::new(store, metric, params).train()?;
        let n_partitions = centroids.size();

        Ok(Self {
            metric,
            n_probe: params.n_probe.min(n_partitions.max(1)),
            centroids,
            lists: vec![Vec::new(); n_partitions],
        })
    }

    /// Reassemble an index from persisted parts.
    ///
    /// `lists` must be a disjoint cover of `0..store_size`, each list sorted.
    pub fn from_parts(
        metric: DistanceMetric,
        n_probe: usize,
        centroids: VectorStore,
        lists: Vec<Vec<VectorId>>,
        store_size: usize,
    ) -> Result<Self> {
        if lists.len() != centroids.size() {
            return Err(IvfServeError::corrupt_format(format!(
                "{} inverted lists for {} centroids",
                lists.len(),
                centroids.size()
            )));
        }

        let mut seen = vec![false; store_size];
        for list in &lists {
            for window in list.windows(2) {
                if window[0] >= window[1] {
                    return Err(IvfServeError::corrupt_format(
                        "inverted list ids are not strictly ascending",
                    ));
                }
            }
            for &id in list {
                let slot = seen.get_mut(id as usize).ok_or_else(|| {
                    IvfServeError::corrupt_format(format!(
                        "inverted list references id {id} beyond store size {store_size}"
                    ))
                })?;
                if *slot {
                    return Err(IvfServeError::corrupt_format(format!(
                        "id {id} appears in more than one partition"
                    )));
                }
                *slot = true;
            }
        }
        if let Some(missing) = seen.iter().position(|present| !present) {
            return Err(IvfServeError::corrupt_format(format!(
                "id {missing} is not assigned to any partition"
            )));
        }

        Ok(Self {
            metric,
            n_probe,
            centroids,
            lists,
        })
    }

    /// Assign already-stored vectors to their nearest partitions.
    pub fn add(&mut self, store: &VectorStore, ids: Range<VectorId>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        if ids.end > store.size() as u64 {
            return Err(IvfServeError::out_of_range(ids.end - 1, store.size()));
        }
        if !self.is_trained() {
            return Err(IvfServeError::invalid_argument(
                "cannot add vectors to an untrained partitioned index",
            ));
        }

        let rows = ids.start as usize..ids.end as usize;
        let assignments: Vec<usize> = rows
            .into_par_iter()
            .map(|row| nearest_centroid(&self.centroids, self.metric, store.row(row)).0)
            .collect();

        for (id, partition) in ids.zip(assignments) {
            let list = &mut self.lists[partition];
            debug_assert!(list.last().is_none_or(|&last| last < id));
            list.push(id);
        }
        Ok(())
    }

    /// Drop partitions that ended up without vectors and renumber the rest.
    ///
    /// Coinciding centroids send every tied vector to the lower partition
    /// index, which can leave the other one empty after the final assignment.
    /// Returns the number of partitions removed.
    pub fn remove_empty_partitions(&mut self) -> Result<usize> {
        if self.lists.iter().all(|list| !list.is_empty()) {
            return Ok(0);
        }

        let mut centroids = VectorStore::with_capacity(self.centroids.dimension(), self.lists.len());
        let mut lists = Vec::with_capacity(self.lists.len());
        for ((_, centroid), list) in self.centroids.iter().zip(self.lists.drain(..)) {
            if !list.is_empty() {
                centroids.add(centroid)?;
                lists.push(list);
            }
        }

        let removed = self.centroids.size() - centroids.size();
        self.centroids = centroids;
        self.lists = lists;
        self.n_probe = self.n_probe.min(self.lists.len().max(1));
        Ok(removed)
    }

    /// Approximate top-k search over the nearest `nprobe` partitions.
    pub fn search(
        &self,
        store: &VectorStore,
        query: &[f32],
        params: &SearchParams,
    ) -> Result<Vec<SearchResult>> {
        validate_query(store, query, params)?;
        if self.lists.is_empty() || store.is_empty() {
            return Ok(Vec::new());
        }

        let n_probe = params.n_probe.unwrap_or(self.n_probe);
        let probes = self.nearest_partitions(query, n_probe);
        let candidates: usize = probes.iter().map(|&p| self.lists[p].len()).sum();

        let collector = if probes.len() > 1 && candidates >= params.parallel_threshold {
            let partials = probes
                .par_iter()
                .map(|&partition| {
                    params.check_deadline()?;
                    Ok(self.scan_partition(store, query, partition, params.k))
                })
                .collect::<Result<Vec<_>>>()?;

            let mut merged = TopKCollector::new(params.k);
            for partial in partials {
                merged.merge(partial);
            }
            merged
        } else {
            let mut collector = TopKCollector::new(params.k);
            for &partition in &probes {
                params.check_deadline()?;
                collector.merge(self.scan_partition(store, query, partition, params.k));
            }
            collector
        };

        Ok(collector.into_sorted_vec())
    }

    /// Indices of the `n_probe` partitions whose centroids are closest to `query`.
    ///
    /// `n_probe` is clamped to the number of partitions; ties go to the lower index.
    pub fn nearest_partitions(&self, query: &[f32], n_probe: usize) -> Vec<usize> {
        let mut ranked: Vec<(f32, usize)> = self
            .centroids
            .iter()
            .map(|(i, centroid)| (self.metric.distance_unchecked(query, centroid), i as usize))
            .collect();

        let n_probe = n_probe.min(ranked.len());
        ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        ranked.truncate(n_probe);
        ranked.into_iter().map(|(_, i)| i).collect()
    }

    fn scan_partition(
        &self,
        store: &VectorStore,
        query: &[f32],
        partition: usize,
        k: usize,
    ) -> TopKCollector {
        let mut collector = TopKCollector::new(k);
        for &id in &self.lists[partition] {
            let distance = self.metric.distance_unchecked(query, store.row(id as usize));
            collector.collect(id, distance);
        }
        collector
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Default number of partitions probed per query.
    pub fn n_probe(&self) -> usize {
        self.n_probe
    }

    /// Change the default probe count. Zero is rejected.
    pub fn set_n_probe(&mut self, n_probe: usize) -> Result<()> {
        if n_probe == 0 {
            return Err(IvfServeError::invalid_argument("nprobe must be at least 1"));
        }
        self.n_probe = n_probe;
        Ok(())
    }

    pub fn n_partitions(&self) -> usize {
        self.lists.len()
    }

    pub fn is_trained(&self) -> bool {
        !self.centroids.is_empty()
    }

    pub fn centroids(&self) -> &VectorStore {
        &self.centroids
    }

    pub fn lists(&self) -> &[Vec<VectorId>] {
        &self.lists
    }

    /// Number of vectors in each partition.
    pub fn partition_sizes(&self) -> Vec<usize> {
        self.lists.iter().map(Vec::len).collect()
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.centroids.memory_usage()
            + self
                .lists
                .iter()
                .map(|l| l.len() * std::mem::size_of::<VectorId>())
                .sum::<usize>()
    }
}
