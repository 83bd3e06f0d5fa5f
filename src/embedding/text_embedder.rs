//! Text embedding trait used by the search handler.

use async_trait::async_trait;

use crate::error::Result;
use crate::vector::core::vector::Vector;

/// Trait for converting query text to vector embeddings.
///
/// Implementations wrap a local model or a remote encoding service. The
/// produced vectors must have [`TextEmbedder::dimension`] components and use
/// the same encoder as the vectors the index was built from.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use ivfserve::embedding::text_embedder::TextEmbedder;
/// use ivfserve::error::Result;
/// use ivfserve::vector::core::vector::Vector;
///
/// struct ConstantEmbedder {
///     dimension: usize,
/// }
///
/// #[async_trait]
/// impl TextEmbedder for ConstantEmbedder {
///     async fn embed(&self, _text: &str) -> Result<Vector> {
///         Ok(Vector::new(vec![0.5; self.dimension]))
///     }
///
///     fn dimension(&self) -> usize {
///         self.dimension
///     }
/// }
/// ```
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str) -> Result<Vector>;

    /// Generate embeddings for multiple texts.
    ///
    /// The default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vector>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Number of components in every produced vector.
    fn dimension(&self) -> usize;

    /// Identifier used in logs.
    fn name(&self) -> &str {
        "unknown"
    }
}
