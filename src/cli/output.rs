//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{IvfServeArgs, OutputFormat};
use crate::error::Result;
use crate::transport::SearchHit;
use crate::vector::index::snapshot::IndexStats;

/// Result structure for index builds.
#[derive(Debug, Serialize, Deserialize)]
pub struct BuildResult {
    pub path: String,
    pub vectors: usize,
    pub dimension: usize,
    pub metric: String,
    pub mode: String,
    pub n_partitions: usize,
    pub duration_ms: u64,
}

/// Result structure for search operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchOutput {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub duration_ms: u64,
}

/// Per-command plain-text rendering.
pub trait HumanOutput {
    fn render_human(&self) -> String;
}

impl HumanOutput for BuildResult {
    fn render_human(&self) -> String {
        let mut out = format!(
            "Index: {}\nVectors: {}\nDimension: {}\nMetric: {}\nMode: {}\n",
            self.path, self.vectors, self.dimension, self.metric, self.mode
        );
        if self.n_partitions > 0 {
            out.push_str(&format!("Partitions: {}\n", self.n_partitions));
        }
        out.push_str(&format!("Build time: {} ms", self.duration_ms));
        out
    }
}

impl HumanOutput for SearchOutput {
    fn render_human(&self) -> String {
        if self.results.is_empty() {
            return "No results found.".to_string();
        }
        let mut out = format!("{:>4}  {:>10}  {:>12}\n", "rank", "index", "distance");
        for (rank, hit) in self.results.iter().enumerate() {
            out.push_str(&format!(
                "{:>4}  {:>10}  {:>12.6}\n",
                rank + 1,
                hit.index,
                hit.distance
            ));
        }
        out.push_str(&format!(
            "{} results in {} ms",
            self.results.len(),
            self.duration_ms
        ));
        out
    }
}

impl HumanOutput for IndexStats {
    fn render_human(&self) -> String {
        let mut out = format!(
            "Vectors: {}\nDimension: {}\nMetric: {}\nMode: {}\n",
            self.vector_count, self.dimension, self.metric, self.mode
        );
        if self.is_partitioned() {
            out.push_str(&format!(
                "Partitions: {}\nDefault nprobe: {}\n",
                self.n_partitions, self.n_probe
            ));
            if let (Some(min), Some(max)) = (self.min_partition_size, self.max_partition_size) {
                out.push_str(&format!("Partition sizes: {min}..={max}\n"));
            }
        }
        out.push_str(&format!("Memory: {} bytes", self.memory_usage_bytes));
        out
    }
}

/// Output a result in the specified format.
pub fn output_result<T>(message: &str, result: &T, args: &IvfServeArgs) -> Result<()>
where
    T: Serialize + HumanOutput,
{
    println!("{}", format_result(message, result, args)?);
    Ok(())
}

/// Render a result without printing it.
pub fn format_result<T>(message: &str, result: &T, args: &IvfServeArgs) -> Result<String>
where
    T: Serialize + HumanOutput,
{
    match args.output_format {
        OutputFormat::Human => {
            if args.verbosity() > 1 {
                Ok(format!("{message}\n\n{}", result.render_human()))
            } else {
                Ok(result.render_human())
            }
        }
        OutputFormat::Json => {
            if args.pretty {
                Ok(serde_json::to_string_pretty(result)?)
            } else {
                Ok(serde_json::to_string(result)?)
            }
        }
    }
}
