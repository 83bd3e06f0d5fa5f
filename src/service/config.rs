//! Serving configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IvfServeError, Result};
use crate::vector::search::{DEFAULT_CHUNK_SIZE, DEFAULT_PARALLEL_THRESHOLD, SearchParams};

/// Configuration of a [`QueryService`](crate::service::QueryService).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Result count used when a request does not specify `top_k`.
    pub default_top_k: usize,
    /// Overrides the index's default probe count in partitioned mode.
    pub n_probe: Option<usize>,
    /// Per-query time budget. `None` disables deadlines.
    pub query_timeout_ms: Option<u64>,
    /// Minimum number of candidate rows before a query is split across threads.
    pub parallel_threshold: usize,
    /// Rows per parallel task in flat mode.
    pub chunk_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            n_probe: None,
            query_timeout_ms: None,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ServiceConfig {
    pub fn with_default_top_k(mut self, k: usize) -> Self {
        self.default_top_k = k;
        self
    }

    pub fn with_n_probe(mut self, n_probe: usize) -> Self {
        self.n_probe = Some(n_probe);
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }

    /// Per-query parameters for `k` results. The deadline starts now.
    pub fn search_params(&self, k: usize) -> SearchParams {
        let mut params =
            SearchParams::new(k).with_parallelism(self.parallel_threshold, self.chunk_size);
        if let Some(n_probe) = self.n_probe {
            params = params.with_n_probe(n_probe);
        }
        if let Some(timeout) = self.query_timeout() {
            params = params.with_timeout(timeout);
        }
        params
    }

    /// Read a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ServiceConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_top_k == 0 {
            return Err(IvfServeError::invalid_argument(
                "default_top_k must be at least 1",
            ));
        }
        if self.n_probe == Some(0) {
            return Err(IvfServeError::invalid_argument("nprobe must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(IvfServeError::invalid_argument(
                "chunk_size must be at least 1",
            ));
        }
        Ok(())
    }
}
