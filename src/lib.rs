//! # ivfserve
//!
//! Top-k nearest-neighbor search over a fixed collection of dense vectors.
//!
//! ## Features
//!
//! - Exact flat search and approximate IVF (k-means partitioned) search
//! - Squared Euclidean and cosine distance with SIMD inner loops
//! - Single-file, checksummed index persistence
//! - A query service with parallel scans, deadlines and atomic index swaps
//! - A search handler producing `{"query", "results": [{"index", "distance"}]}`
//!
//! ## Example
//!
//! ```
//! use ivfserve::prelude::*;
//!
//! # fn main() -> ivfserve::error::Result<()> {
//! let mut builder = IndexBuilder::new(IndexConfig::new(2))?;
//! builder.add_batch(&[[0.0f32, 0.0], [1.0, 0.0], [0.0, 1.0], [5.0, 5.0]])?;
//!
//! let service = QueryService::new(builder.build()?, ServiceConfig::default())?;
//! let results = service.search(&[0.0, 0.1], 2)?;
//! assert_eq!(results[0].id, 0);
//! assert_eq!(results[1].id, 2);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod embedding;
pub mod error;
pub mod persistence;
pub mod service;
pub mod transport;
pub mod util;
pub mod vector;

pub mod prelude {
    pub use crate::embedding::{PrecomputedEmbedder, TextEmbedder};
    pub use crate::error::{IvfServeError, Result};
    pub use crate::service::{QueryService, ServiceConfig};
    pub use crate::transport::{SearchHandler, SearchHit, SearchRequest, SearchResponse};
    pub use crate::vector::index::{
        IndexBuilder, IndexConfig, IndexKind, IndexSnapshot, IndexStats, IvfParams, VectorIndex,
    };
    pub use crate::vector::{
        DistanceMetric, SearchParams, SearchResult, Vector, VectorId, VectorStore,
    };
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
