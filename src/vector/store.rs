//! Contiguous storage for fixed-dimension vectors.

use std::ops::Range;

use crate::error::{IvfServeError, Result};

/// Identifier of a stored vector: its 0-based insertion position.
pub type VectorId = u64;

/// Append-only, row-major storage of vectors sharing one dimension.
///
/// Vector `i` occupies `data[i * dimension..(i + 1) * dimension]`. Ids are
/// never reused because there is no removal; dropping vectors means building
/// a new store.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStore {
    dimension: usize,
    data: Vec<f32>,
}

impl VectorStore {
    /// Create an empty store for vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Create an empty store with room for `capacity` vectors.
    pub fn with_capacity(dimension: usize, capacity: usize) -> Self {
        Self {
            dimension,
            data: Vec::with_capacity(dimension * capacity),
        }
    }

    /// Rebuild a store from raw row-major data.
    pub fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 {
            if !data.is_empty() {
                return Err(IvfServeError::invalid_argument(
                    "zero-dimensional store cannot hold data",
                ));
            }
        } else if data.len() % dimension != 0 {
            return Err(IvfServeError::invalid_argument(format!(
                "raw data length {} is not a multiple of dimension {}",
                data.len(),
                dimension
            )));
        }
        Ok(Self { dimension, data })
    }

    /// Append a vector and return its id.
    pub fn add(&mut self, vector: &[f32]) -> Result<VectorId> {
        if vector.len() != self.dimension {
            return Err(IvfServeError::dimension_mismatch(
                self.dimension,
                vector.len(),
            ));
        }
        let id = self.size() as VectorId;
        self.data.extend_from_slice(vector);
        Ok(id)
    }

    /// Append several vectors. Either all are added or none.
    pub fn add_batch<V: AsRef<[f32]>>(&mut self, vectors: &[V]) -> Result<Range<VectorId>> {
        if let Some(bad) = vectors.iter().find(|v| v.as_ref().len() != self.dimension) {
            return Err(IvfServeError::dimension_mismatch(
                self.dimension,
                bad.as_ref().len(),
            ));
        }

        let start = self.size() as VectorId;
        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector.as_ref());
        }
        Ok(start..self.size() as VectorId)
    }

    /// Borrow the vector with the given id.
    pub fn get(&self, id: VectorId) -> Result<&[f32]> {
        let size = self.size();
        if id >= size as u64 {
            return Err(IvfServeError::out_of_range(id, size));
        }
        Ok(self.row(id as usize))
    }

    /// Row access for ids already known to be in range.
    #[inline]
    pub(crate) fn row(&self, index: usize) -> &[f32] {
        let start = index * self.dimension;
        &self.data[start..start + self.dimension]
    }

    /// Number of stored vectors.
    pub fn size(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// All components, row-major.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Iterate over `(id, vector)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (VectorId, &[f32])> + '_ {
        self.data
            .chunks_exact(self.dimension.max(1))
            .enumerate()
            .map(|(i, row)| (i as VectorId, row))
    }

    /// Bytes held by the stored components.
    pub fn memory_usage(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}
