//! Command line argument parsing for the ivfserve CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// ivfserve - top-k nearest-neighbor search over flat and IVF indexes
#[derive(Parser, Debug, Clone)]
#[command(name = "ivfserve")]
#[command(about = "Build, inspect and query nearest-neighbor index files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct IvfServeArgs {
    /// Verbosity level (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl IvfServeArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n + 1,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build an index file from a JSONL file of vectors
    Build(BuildArgs),

    /// Query an index file with a vector
    Search(SearchArgs),

    /// Show index statistics
    Info(InfoArgs),
}

/// Arguments for building an index
#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    /// Input file: one JSON array of numbers per line
    #[arg(short, long, value_name = "JSONL_FILE")]
    pub input: PathBuf,

    /// Output index file
    #[arg(short, long, value_name = "INDEX_FILE", env = "IVFSERVE_INDEX")]
    pub output: PathBuf,

    /// Index configuration file (JSON). Overrides the layout flags below.
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Vector dimension (default: length of the first vector)
    #[arg(short, long)]
    pub dimension: Option<usize>,

    /// Distance metric
    #[arg(short, long, default_value = "euclidean")]
    pub metric: MetricArg,

    /// Index layout
    #[arg(long, default_value = "flat")]
    pub mode: ModeArg,

    /// Number of partitions (partitioned mode)
    #[arg(short, long, default_value = "64")]
    pub partitions: usize,

    /// Default partitions probed per query (partitioned mode)
    #[arg(short, long, default_value = "8")]
    pub nprobe: usize,

    /// Seed for k-means initialization
    #[arg(long, default_value = "42")]
    pub seed: u64,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Index file
    #[arg(value_name = "INDEX_FILE", env = "IVFSERVE_INDEX")]
    pub index_path: PathBuf,

    /// Query vector as a JSON array, e.g. '[0.1, 0.2]'
    #[arg(long, value_name = "JSON")]
    pub vector: String,

    /// Number of results to return
    #[arg(short, long, default_value = "5")]
    pub k: usize,

    /// Partitions to probe (partitioned mode)
    #[arg(short, long)]
    pub nprobe: Option<usize>,

    /// Query timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// Arguments for index statistics
#[derive(Parser, Debug, Clone)]
pub struct InfoArgs {
    /// Index file
    #[arg(value_name = "INDEX_FILE", env = "IVFSERVE_INDEX")]
    pub index_path: PathBuf,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Distance metrics selectable on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricArg {
    /// Squared Euclidean distance
    #[value(alias = "l2")]
    Euclidean,
    /// Cosine distance (1 - cosine similarity)
    Cosine,
}

/// Index layouts selectable on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Exhaustive, exact search
    Flat,
    /// Inverted file over k-means partitions
    Partitioned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build() {
        let args = IvfServeArgs::try_parse_from([
            "ivfserve",
            "build",
            "--input",
            "vectors.jsonl",
            "--output",
            "out.ivfs",
            "--mode",
            "partitioned",
            "--partitions",
            "16",
            "--metric",
            "l2",
        ])
        .unwrap();

        match args.command {
            Command::Build(build) => {
                assert_eq!(build.mode, ModeArg::Partitioned);
                assert_eq!(build.partitions, 16);
                assert_eq!(build.nprobe, 8);
                assert_eq!(build.metric, MetricArg::Euclidean);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_search_with_global_flags() {
        let args = IvfServeArgs::try_parse_from([
            "ivfserve", "search", "index.ivfs", "--vector", "[1, 2]", "-k", "3", "-f", "json",
            "-vv",
        ])
        .unwrap();

        assert_eq!(args.output_format, OutputFormat::Json);
        assert_eq!(args.verbosity(), 3);
        match args.command {
            Command::Search(search) => {
                assert_eq!(search.k, 3);
                assert_eq!(search.vector, "[1, 2]");
                assert!(search.nprobe.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_quiet_overrides_verbose() {
        let args =
            IvfServeArgs::try_parse_from(["ivfserve", "-q", "-v", "info", "index.ivfs"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }
}
