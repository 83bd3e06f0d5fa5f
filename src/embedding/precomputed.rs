//! Embedder for queries that already carry their vector.
//!
//! [`PrecomputedEmbedder`] performs no encoding: the query text must be a
//! JSON array of numbers, such as `"[0.1, 0.2, 0.3]"`. It lets the search
//! handler and the CLI serve indexes whose vectors were produced elsewhere.

use async_trait::async_trait;

use crate::error::{IvfServeError, Result};
use crate::embedding::text_embedder::TextEmbedder;
use crate::vector::core::vector::Vector;

/// Parses query text as a JSON array of floats.
#[derive(Debug, Clone)]
pub struct PrecomputedEmbedder {
    dimension: usize,
}

impl PrecomputedEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Parse `text` without going through the async trait.
    pub fn parse(&self, text: &str) -> Result<Vector> {
        let data: Vec<f32> = serde_json::from_str(text.trim()).map_err(|e| {
            IvfServeError::invalid_argument(format!("query is not a JSON array of numbers: {e}"))
        })?;
        let vector = Vector::new(data);
        vector.validate_dimension(self.dimension)?;
        if !vector.is_valid() {
            return Err(IvfServeError::invalid_argument(
                "query contains NaN or infinite values",
            ));
        }
        Ok(vector)
    }
}

#[async_trait]
impl TextEmbedder for PrecomputedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vector> {
        self.parse(text)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "PrecomputedEmbedder"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_parse() {
        let embedder = PrecomputedEmbedder::new(3);
        let vector = embedder.parse(" [1, 2.5, -3] ").unwrap();
        assert_eq!(vector.as_slice(), &[1.0, 2.5, -3.0]);
    }

    #[test]
    fn test_parse_errors() {
        let embedder = PrecomputedEmbedder::new(2);
        assert!(matches!(
            embedder.parse("hello world"),
            Err(IvfServeError::InvalidArgument(_))
        ));
        assert!(matches!(
            embedder.parse("[1.0, 2.0, 3.0]"),
            Err(IvfServeError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_embed_through_trait_object() {
        let embedder: Arc<dyn TextEmbedder> = Arc::new(PrecomputedEmbedder::new(2));
        assert_eq!(embedder.dimension(), 2);
        assert_eq!(embedder.name(), "PrecomputedEmbedder");

        let vectors = embedder.embed_batch(&["[0, 1]", "[2, 3]"]).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1].as_slice(), &[2.0, 3.0]);
    }
}
