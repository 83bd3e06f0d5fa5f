//! Command implementations for the ivfserve CLI.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use log::{info, warn};

use crate::cli::args::*;
use crate::cli::output::*;
use crate::embedding::precomputed::PrecomputedEmbedder;
use crate::error::{IvfServeError, Result};
use crate::service::{QueryService, ServiceConfig};
use crate::transport::SearchHit;
use crate::vector::core::distance::DistanceMetric;
use crate::vector::index::builder::IndexBuilder;
use crate::vector::index::config::{IndexConfig, IndexKind, IvfParams};
use crate::vector::index::snapshot::IndexSnapshot;

/// Execute a CLI command.
pub fn execute_command(args: IvfServeArgs) -> Result<()> {
    match &args.command {
        Command::Build(build_args) => build_index(build_args, &args),
        Command::Search(search_args) => search_index(search_args, &args),
        Command::Info(info_args) => show_info(info_args, &args),
    }
}

/// Build an index file from JSONL vectors.
fn build_index(args: &BuildArgs, cli_args: &IvfServeArgs) -> Result<()> {
    let start_time = Instant::now();
    let vectors = read_vectors(&args.input)?;
    info!(
        "Read {} vectors from {}",
        vectors.len(),
        args.input.display()
    );

    let config = build_config(args, &vectors)?;
    let snapshot = build_snapshot(config, &vectors)?;
    snapshot.save(&args.output)?;

    let stats = snapshot.stats();
    output_result(
        "Index built successfully",
        &BuildResult {
            path: args.output.to_string_lossy().to_string(),
            vectors: stats.vector_count,
            dimension: stats.dimension,
            metric: stats.metric.to_string(),
            mode: stats.mode,
            n_partitions: stats.n_partitions,
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

/// Search an index file with a JSON vector.
fn search_index(args: &SearchArgs, cli_args: &IvfServeArgs) -> Result<()> {
    let mut config = ServiceConfig::default();
    config.n_probe = args.nprobe;
    config.query_timeout_ms = args.timeout_ms;
    let service = QueryService::open(&args.index_path, config)?;

    let embedder = PrecomputedEmbedder::new(service.dimension());
    let query = embedder.parse(&args.vector)?;

    let start_time = Instant::now();
    let results = service.search(query.as_slice(), args.k)?;
    let duration = start_time.elapsed();

    output_result(
        "Search results",
        &SearchOutput {
            query: args.vector.clone(),
            results: results.into_iter().map(SearchHit::from).collect(),
            duration_ms: duration.as_millis() as u64,
        },
        cli_args,
    )
}

/// Show statistics of an index file.
fn show_info(args: &InfoArgs, cli_args: &IvfServeArgs) -> Result<()> {
    let snapshot = IndexSnapshot::load(&args.index_path)?;
    output_result("Index statistics", &snapshot.stats(), cli_args)
}

/// Read one JSON array of numbers per non-empty line.
pub fn read_vectors<P: AsRef<Path>>(path: P) -> Result<Vec<Vec<f32>>> {
    let reader = BufReader::new(File::open(path)?);
    let mut vectors = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let vector: Vec<f32> = serde_json::from_str(&line).map_err(|e| {
            IvfServeError::invalid_argument(format!("line {}: {e}", line_num + 1))
        })?;
        vectors.push(vector);
    }

    Ok(vectors)
}

/// Resolve the index configuration from `--config` or the layout flags.
fn build_config(args: &BuildArgs, vectors: &[Vec<f32>]) -> Result<IndexConfig> {
    if let Some(path) = &args.config {
        let config = IndexConfig::from_json_file(path)?;
        if args.dimension.is_some_and(|d| d != config.dimension) {
            warn!(
                "Ignoring --dimension, {} sets dimension {}",
                path.display(),
                config.dimension
            );
        }
        return Ok(config);
    }

    let dimension = match (args.dimension, vectors.first()) {
        (Some(dimension), _) => dimension,
        (None, Some(first)) => first.len(),
        (None, None) => {
            return Err(IvfServeError::invalid_argument(
                "cannot infer the dimension of an empty input; pass --dimension",
            ));
        }
    };

    let metric = match args.metric {
        MetricArg::Euclidean => DistanceMetric::Euclidean,
        MetricArg::Cosine => DistanceMetric::Cosine,
    };
    let kind = match args.mode {
        ModeArg::Flat => IndexKind::Flat,
        ModeArg::Partitioned => IndexKind::Partitioned(IvfParams {
            seed: args.seed,
            ..IvfParams::new(args.partitions, args.nprobe)
        }),
    };

    let config = IndexConfig::new(dimension).with_metric(metric).with_kind(kind);
    config.validate()?;
    Ok(config)
}

fn build_snapshot(config: IndexConfig, vectors: &[Vec<f32>]) -> Result<IndexSnapshot> {
    let mut builder = IndexBuilder::with_capacity(config, vectors.len())?;
    builder.add_batch(vectors)?;
    builder.build()
}
