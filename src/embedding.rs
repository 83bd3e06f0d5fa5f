//! Query embedding.
//!
//! Turning free text into vectors is delegated to a [`TextEmbedder`]; model
//! backed implementations live outside this crate.

pub mod precomputed;
pub mod text_embedder;

pub use precomputed::PrecomputedEmbedder;
pub use text_embedder::TextEmbedder;
