//! Index structures over a [`VectorStore`].
//!
//! [`VectorIndex`] is a tagged union over the two supported layouts so that
//! build and search logic stays inspectable: [`FlatIndex`] scans everything
//! and is exact, [`IvfIndex`] probes a subset of k-means partitions and is
//! approximate.

pub mod builder;
pub mod config;
pub mod flat;
pub mod ivf;
pub mod snapshot;

use std::ops::Range;

use crate::error::{IvfServeError, Result};
use crate::vector::core::distance::DistanceMetric;
use crate::vector::search::{SearchParams, SearchResult};
use crate::vector::store::{VectorId, VectorStore};

pub use builder::IndexBuilder;
pub use config::{IndexConfig, IndexKind, IvfParams};
pub use flat::FlatIndex;
pub use ivf::IvfIndex;
pub use snapshot::{IndexSnapshot, IndexStats};

/// Layout identifier, as written to index files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    Flat,
    Partitioned,
}

impl IndexMode {
    pub fn id(&self) -> u8 {
        match self {
            IndexMode::Flat => 0,
            IndexMode::Partitioned => 1,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(IndexMode::Flat),
            1 => Some(IndexMode::Partitioned),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IndexMode::Flat => "flat",
            IndexMode::Partitioned => "partitioned",
        }
    }
}

/// Search structure built over a vector store.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorIndex {
    Flat(FlatIndex),
    Partitioned(IvfIndex),
}

impl VectorIndex {
    pub fn metric(&self) -> DistanceMetric {
        match self {
            VectorIndex::Flat(index) => index.metric(),
            VectorIndex::Partitioned(index) => index.metric(),
        }
    }

    pub fn mode(&self) -> IndexMode {
        match self {
            VectorIndex::Flat(_) => IndexMode::Flat,
            VectorIndex::Partitioned(_) => IndexMode::Partitioned,
        }
    }

    /// Register vectors that were just appended to `store`.
    pub fn add(&mut self, store: &VectorStore, ids: Range<VectorId>) -> Result<()> {
        match self {
            VectorIndex::Flat(_) => {
                if ids.end > store.size() as u64 {
                    return Err(IvfServeError::out_of_range(ids.end - 1, store.size()));
                }
                Ok(())
            }
            VectorIndex::Partitioned(index) => index.add(store, ids),
        }
    }

    /// Top-k search, ascending by distance with ties broken by ascending id.
    pub fn search(
        &self,
        store: &VectorStore,
        query: &[f32],
        params: &SearchParams,
    ) -> Result<Vec<SearchResult>> {
        match self {
            VectorIndex::Flat(index) => index.search(store, query, params),
            VectorIndex::Partitioned(index) => index.search(store, query, params),
        }
    }

    pub fn as_partitioned(&self) -> Option<&IvfIndex> {
        match self {
            VectorIndex::Partitioned(index) => Some(index),
            VectorIndex::Flat(_) => None,
        }
    }

    pub(crate) fn memory_usage(&self) -> usize {
        match self {
            VectorIndex::Flat(_) => 0,
            VectorIndex::Partitioned(index) => index.memory_usage(),
        }
    }
}

/// Shared argument checks for every search entry point.
pub(crate) fn validate_query(
    store: &VectorStore,
    query: &[f32],
    params: &SearchParams,
) -> Result<()> {
    params.validate()?;
    if query.len() != store.dimension() {
        return Err(IvfServeError::dimension_mismatch(
            store.dimension(),
            query.len(),
        ));
    }
    check_finite(query)
}

/// Reject queries with NaN or infinite components.
pub(crate) fn check_finite(query: &[f32]) -> Result<()> {
    match query.iter().position(|x| !x.is_finite()) {
        Some(i) => Err(IvfServeError::invalid_argument(format!(
            "query component {i} is {}",
            query[i]
        ))),
        None => Ok(()),
    }
}
