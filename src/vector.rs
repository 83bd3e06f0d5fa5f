//! Vector storage, distance metrics, index structures and top-k search.
//!
//! - [`store`]: contiguous storage of fixed-dimension vectors
//! - [`core`]: owned vectors and distance metrics
//! - [`index`]: flat and partitioned (IVF) index structures
//! - [`search`]: query parameters, deadlines and result collection

pub mod core;
pub mod index;
pub mod search;
pub mod store;

pub use self::core::distance::DistanceMetric;
pub use self::core::vector::Vector;
pub use self::search::{SearchParams, SearchResult};
pub use self::store::{VectorId, VectorStore};
