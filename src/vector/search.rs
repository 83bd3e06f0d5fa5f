//! Search requests, results and cooperative deadlines.

pub mod collector;

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{IvfServeError, Result};
use crate::vector::store::VectorId;

pub use collector::TopKCollector;

/// Stores smaller than this are scanned on the calling thread.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 16_384;

/// Rows per parallel task in a flat scan.
pub const DEFAULT_CHUNK_SIZE: usize = 4_096;

/// One ranked hit: a vector id and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: VectorId,
    pub distance: f32,
}

/// Point in time after which a query gives up.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    expires: Instant,
}

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            expires: started + timeout,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires
    }

    /// Fail with `DeadlineExceeded` once the deadline has passed.
    pub fn check(&self) -> Result<()> {
        let now = Instant::now();
        if now >= self.expires {
            return Err(IvfServeError::DeadlineExceeded {
                elapsed_ms: now.duration_since(self.started).as_millis() as u64,
            });
        }
        Ok(())
    }
}

/// Parameters of a single top-k query.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Number of results wanted. Must be at least 1.
    pub k: usize,
    /// Partitions to scan in partitioned mode. `None` uses the index default.
    pub n_probe: Option<usize>,
    /// Optional cooperative deadline.
    pub deadline: Option<Deadline>,
    /// Minimum number of candidate rows before the scan is split across threads.
    pub parallel_threshold: usize,
    /// Rows per parallel task in flat mode.
    pub chunk_size: usize,
}

impl SearchParams {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            n_probe: None,
            deadline: None,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_n_probe(mut self, n_probe: usize) -> Self {
        self.n_probe = Some(n_probe);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Deadline::after(timeout));
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Force single-threaded or always-parallel execution (mostly for tests).
    pub fn with_parallelism(mut self, parallel_threshold: usize, chunk_size: usize) -> Self {
        self.parallel_threshold = parallel_threshold;
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Reject parameters that can never produce a result.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(IvfServeError::invalid_argument("k must be at least 1"));
        }
        if self.n_probe == Some(0) {
            return Err(IvfServeError::invalid_argument("nprobe must be at least 1"));
        }
        Ok(())
    }

    pub(crate) fn check_deadline(&self) -> Result<()> {
        match &self.deadline {
            Some(deadline) => deadline.check(),
            None => Ok(()),
        }
    }
}
