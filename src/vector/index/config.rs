//! Configuration types for vector indexes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IvfServeError, Result};
use crate::vector::core::distance::DistanceMetric;

/// Parameters of the partitioned (inverted-file) mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IvfParams {
    /// Number of partitions (P). Clamped to the number of vectors at build time.
    pub n_partitions: usize,
    /// Default number of partitions scanned per query.
    pub n_probe: usize,
    /// Upper bound on k-means refinement passes.
    pub max_iterations: usize,
    /// Stop refining once the mean centroid movement falls below this.
    pub convergence_threshold: f32,
    /// Cap on the rows used for training. `None` means 256 per partition.
    pub max_training_points: Option<usize>,
    /// Seed for centroid initialization and training-set sampling.
    pub seed: u64,
}

impl Default for IvfParams {
    fn default() -> Self {
        Self {
            n_partitions: 64,
            n_probe: 8,
            max_iterations: 25,
            convergence_threshold: 1e-4,
            max_training_points: None,
            seed: 42,
        }
    }
}

impl IvfParams {
    /// Rows sampled for training when `max_training_points` is unset.
    pub const POINTS_PER_PARTITION: usize = 256;

    pub fn new(n_partitions: usize, n_probe: usize) -> Self {
        Self {
            n_partitions,
            n_probe,
            ..Self::default()
        }
    }

    pub fn training_points(&self) -> usize {
        self.max_training_points
            .unwrap_or(self.n_partitions.saturating_mul(Self::POINTS_PER_PARTITION))
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_partitions == 0 {
            return Err(IvfServeError::invalid_argument(
                "n_partitions must be at least 1",
            ));
        }
        if self.n_probe == 0 {
            return Err(IvfServeError::invalid_argument("nprobe must be at least 1"));
        }
        if self.max_iterations == 0 {
            return Err(IvfServeError::invalid_argument(
                "max_iterations must be at least 1",
            ));
        }
        if self.training_points() == 0 {
            return Err(IvfServeError::invalid_argument(
                "max_training_points must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Index layout chosen at build time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum IndexKind {
    /// Exhaustive scan over every stored vector.
    #[default]
    Flat,
    /// Inverted file: k-means partitions probed by centroid distance.
    Partitioned(IvfParams),
}

impl IndexKind {
    pub fn name(&self) -> &'static str {
        match self {
            IndexKind::Flat => "flat",
            IndexKind::Partitioned(_) => "partitioned",
        }
    }
}

/// Configuration of an index build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Number of components per vector (D).
    pub dimension: usize,
    /// Metric used both for building and for querying.
    #[serde(default)]
    pub metric: DistanceMetric,
    #[serde(default)]
    pub kind: IndexKind,
}

impl IndexConfig {
    /// Flat, squared-Euclidean index of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            metric: DistanceMetric::default(),
            kind: IndexKind::default(),
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_kind(mut self, kind: IndexKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn partitioned(self, params: IvfParams) -> Self {
        self.with_kind(IndexKind::Partitioned(params))
    }

    /// Read a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: IndexConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(IvfServeError::invalid_argument(
                "dimension must be at least 1",
            ));
        }
        if let IndexKind::Partitioned(params) = &self.kind {
            params.validate()?;
        }
        Ok(())
    }
}
