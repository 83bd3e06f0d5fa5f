//! Request/response adapter for a `/search`-style endpoint.
//!
//! [`SearchHandler`] embeds the query text, runs the search on the blocking
//! pool and shapes the answer as `{"query", "results": [{"index", "distance"}]}`.
//! Binding it to an HTTP server is left to the embedding application.

use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::embedding::text_embedder::TextEmbedder;
use crate::error::{IvfServeError, Result};
use crate::service::QueryService;
use crate::vector::search::SearchResult;

/// Incoming search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Number of results. Defaults to the service's `default_top_k`.
    #[serde(default)]
    pub top_k: Option<i64>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: None,
        }
    }

    pub fn with_top_k(mut self, top_k: i64) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

/// One ranked hit in a [`SearchResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub index: u64,
    pub distance: f32,
}

impl From<SearchResult> for SearchHit {
    fn from(result: SearchResult) -> Self {
        Self {
            index: result.id,
            distance: result.distance,
        }
    }
}

/// Response payload: the echoed query and its ranked hits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
}

/// Turns [`SearchRequest`]s into [`SearchResponse`]s.
#[derive(Clone)]
pub struct SearchHandler {
    service: Arc<QueryService>,
    embedder: Arc<dyn TextEmbedder>,
}

impl SearchHandler {
    pub fn new(service: Arc<QueryService>, embedder: Arc<dyn TextEmbedder>) -> Self {
        Self { service, embedder }
    }

    pub fn service(&self) -> &Arc<QueryService> {
        &self.service
    }

    /// Resolve the requested result count. Values below 1 are rejected.
    pub fn resolve_top_k(&self, top_k: Option<i64>) -> Result<usize> {
        match top_k {
            None => Ok(self.service.config().default_top_k),
            Some(k) if k < 1 => Err(IvfServeError::invalid_argument(format!(
                "top_k must be at least 1, got {k}"
            ))),
            Some(k) => usize::try_from(k)
                .map_err(|_| IvfServeError::invalid_argument(format!("top_k {k} is too large"))),
        }
    }

    pub async fn handle(&self, request: SearchRequest) -> Result<SearchResponse> {
        let top_k = self.resolve_top_k(request.top_k)?;
        info!("Processing query: {}", request.query);

        let vector = self.embedder.embed(&request.query).await?;
        debug!(
            "Embedded query with {} into {} components",
            self.embedder.name(),
            vector.dimension()
        );

        let service = self.service.clone();
        let results = tokio::task::spawn_blocking(move || service.search(vector.as_slice(), top_k))
            .await
            .map_err(|e| IvfServeError::Anyhow(anyhow::anyhow!("search task failed: {e}")))??;

        Ok(SearchResponse {
            query: request.query,
            results: results.into_iter().map(SearchHit::from).collect(),
        })
    }
}
