//! Flat (exhaustive) vector index.
//!
//! Every stored vector is scored against the query. Results are exact, which
//! makes this mode the correctness baseline for the partitioned index and the
//! right choice for small collections.

use rayon::prelude::*;

use crate::error::Result;
use crate::vector::core::distance::DistanceMetric;
use crate::vector::index::validate_query;
use crate::vector::search::{SearchParams, SearchResult, TopKCollector};
use crate::vector::store::{VectorId, VectorStore};

/// Flat index over a [`VectorStore`]. Holds no structure besides the metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatIndex {
    metric: DistanceMetric,
}

impl FlatIndex {
    pub fn new(metric: DistanceMetric) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Exact top-k search.
    ///
    /// Large stores are split into `params.chunk_size` row ranges scored on the
    /// rayon pool; the deadline is checked before each range.
    pub fn search(
        &self,
        store: &VectorStore,
        query: &[f32],
        params: &SearchParams,
    ) -> Result<Vec<SearchResult>> {
        validate_query(store, query, params)?;

        let n = store.size();
        if n == 0 {
            return Ok(Vec::new());
        }

        let chunk = params.chunk_size.max(1);
        let collector = if n >= params.parallel_threshold && n > chunk {
            let starts: Vec<usize> = (0..n).step_by(chunk).collect();
            let partials = starts
                .par_iter()
                .map(|&start| {
                    params.check_deadline()?;
                    Ok(self.scan_range(store, query, start, (start + chunk).min(n), params.k))
                })
                .collect::<Result<Vec<_>>>()?;

            let mut merged = TopKCollector::new(params.k);
            for partial in partials {
                merged.merge(partial);
            }
            merged
        } else {
            let mut collector = TopKCollector::new(params.k);
            let mut start = 0;
            while start < n {
                params.check_deadline()?;
                let end = (start + chunk).min(n);
                collector.merge(self.scan_range(store, query, start, end, params.k));
                start = end;
            }
            collector
        };

        Ok(collector.into_sorted_vec())
    }

    fn scan_range(
        &self,
        store: &VectorStore,
        query: &[f32],
        start: usize,
        end: usize,
        k: usize,
    ) -> TopKCollector {
        let mut collector = TopKCollector::new(k);
        for row in start..end {
            let distance = self.metric.distance_unchecked(query, store.row(row));
            collector.collect(row as VectorId, distance);
        }
        collector
    }
}
