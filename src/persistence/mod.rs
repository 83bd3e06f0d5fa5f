//! Single-file persistence of index snapshots.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! magic        b"IVFS"
//! version      u32
//! dimension    u32
//! metric       u8     0 = euclidean, 1 = cosine
//! mode         u8     0 = flat, 1 = partitioned
//! reserved     u16
//! count        u64    N
//! n_partitions u32    P, 0 for flat
//! n_probe      u32    0 for flat
//! vectors      N * D f32
//! centroids    P * D f32                     partitioned only
//! lists        P * (len u64, len * id u64)   partitioned only
//! checksum     u32    crc32 of all preceding bytes
//! ```
//!
//! Loading never re-clusters: centroids and membership are read back as stored.

pub mod codec;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use memmap2::Mmap;

use crate::error::{IvfServeError, Result};
use crate::persistence::codec::{ChecksumWriter, SliceReader};
use crate::vector::core::distance::DistanceMetric;
use crate::vector::index::flat::FlatIndex;
use crate::vector::index::ivf::IvfIndex;
use crate::vector::index::snapshot::IndexSnapshot;
use crate::vector::index::{IndexMode, VectorIndex};
use crate::vector::store::VectorStore;

/// File magic.
pub const MAGIC: [u8; 4] = *b"IVFS";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Fixed header size in bytes.
pub const HEADER_LEN: usize = 4 + 4 + 4 + 1 + 1 + 2 + 8 + 4 + 4;

/// Save a store and its index to `path`.
///
/// The file is written next to `path` with a `.tmp` suffix, synced, and then
/// renamed over `path`, so readers never observe a partially written index.
pub fn save<P: AsRef<Path>>(store: &VectorStore, index: &VectorIndex, path: P) -> Result<()> {
    let path = path.as_ref();
    let tmp_path = tmp_path(path);

    let file = File::create(&tmp_path)?;
    let result = encode_into(store, index, BufWriter::new(file)).and_then(|writer| {
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    });
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, path)?;

    info!(
        "Saved {} index with {} vectors to {}",
        index.mode().name(),
        store.size(),
        path.display()
    );
    Ok(())
}

/// Load a snapshot previously written by [`save`].
pub fn load<P: AsRef<Path>>(path: P) -> Result<IndexSnapshot> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let len = file.metadata()?.len();

    // Zero-length files cannot be mapped on every platform.
    let snapshot = if len == 0 {
        decode(&[])?
    } else {
        // SAFETY: the mapping is read-only and dropped before returning; every
        // value is copied out of it into owned buffers.
        let mmap = unsafe { Mmap::map(&file)? };
        decode(&mmap)?
    };

    info!(
        "Loaded {} index with {} vectors (dimension {}, {}) from {}",
        snapshot.index().mode().name(),
        snapshot.len(),
        snapshot.dimension(),
        snapshot.metric(),
        path.display()
    );
    Ok(snapshot)
}

/// Encode a store and its index into an in-memory buffer.
pub fn encode(store: &VectorStore, index: &VectorIndex) -> Result<Vec<u8>> {
    encode_into(store, index, Vec::new())
}

/// Decode a buffer produced by [`encode`] or read from an index file.
pub fn decode(bytes: &[u8]) -> Result<IndexSnapshot> {
    let mut reader = SliceReader::verified(bytes)?;

    let magic = reader.read_bytes(4, "magic")?;
    if magic != MAGIC {
        return Err(IvfServeError::corrupt_format(format!(
            "bad magic {magic:02x?}"
        )));
    }
    let version = reader.read_u32("version")?;
    if version != FORMAT_VERSION {
        return Err(IvfServeError::corrupt_format(format!(
            "unsupported format version {version}"
        )));
    }

    let dimension = reader.read_u32("dimension")? as usize;
    let metric_id = reader.read_u8("metric")?;
    let metric = DistanceMetric::from_id(metric_id).ok_or_else(|| {
        IvfServeError::corrupt_format(format!("unknown metric id {metric_id}"))
    })?;
    let mode_id = reader.read_u8("mode")?;
    let mode = IndexMode::from_id(mode_id).ok_or_else(|| {
        IvfServeError::corrupt_format(format!("unknown index mode {mode_id}"))
    })?;
    let _reserved = reader.read_u16("reserved")?;
    let count = to_usize(reader.read_u64("count")?, "count")?;
    let n_partitions = reader.read_u32("n_partitions")? as usize;
    let n_probe = reader.read_u32("n_probe")? as usize;

    if dimension == 0 {
        return Err(IvfServeError::corrupt_format("dimension is zero"));
    }
    let components = count
        .checked_mul(dimension)
        .ok_or_else(|| IvfServeError::corrupt_format("vector data size overflows"))?;
    let data = reader.read_f32_vec(components, "vectors")?;
    let store = VectorStore::from_raw(dimension, data)
        .map_err(|e| IvfServeError::corrupt_format(e.to_string()))?;

    let index = match mode {
        IndexMode::Flat => {
            if n_partitions != 0 {
                return Err(IvfServeError::corrupt_format(format!(
                    "flat index declares {n_partitions} partitions"
                )));
            }
            VectorIndex::Flat(FlatIndex::new(metric))
        }
        IndexMode::Partitioned => {
            if n_partitions > count {
                return Err(IvfServeError::corrupt_format(format!(
                    "{n_partitions} partitions for {count} vectors"
                )));
            }
            if count > 0 && n_partitions == 0 {
                return Err(IvfServeError::corrupt_format(
                    "non-empty partitioned index has no partitions",
                ));
            }
            if n_probe == 0 {
                return Err(IvfServeError::corrupt_format("nprobe is zero"));
            }

            let centroid_data = reader.read_f32_vec(n_partitions * dimension, "centroids")?;
            let centroids = VectorStore::from_raw(dimension, centroid_data)
                .map_err(|e| IvfServeError::corrupt_format(e.to_string()))?;

            let mut lists = Vec::with_capacity(n_partitions);
            for partition in 0..n_partitions {
                let len = to_usize(reader.read_u64("list length")?, "list length")?;
                if len > count {
                    return Err(IvfServeError::corrupt_format(format!(
                        "partition {partition} lists {len} ids for {count} vectors"
                    )));
                }
                lists.push(reader.read_u64_vec(len, "list ids")?);
            }

            let ivf = IvfIndex::from_parts(metric, n_probe, centroids, lists, count)?;
            VectorIndex::Partitioned(ivf)
        }
    };

    if reader.remaining() != 0 {
        return Err(IvfServeError::corrupt_format(format!(
            "{} unexpected trailing bytes",
            reader.remaining()
        )));
    }

    IndexSnapshot::new(store, index).map_err(|e| IvfServeError::corrupt_format(e.to_string()))
}

fn encode_into<W: Write>(store: &VectorStore, index: &VectorIndex, writer: W) -> Result<W> {
    let dimension = u32::try_from(store.dimension())
        .map_err(|_| IvfServeError::invalid_argument("dimension does not fit in u32"))?;
    let (n_partitions, n_probe) = match index {
        VectorIndex::Flat(_) => (0, 0),
        VectorIndex::Partitioned(ivf) => (ivf.n_partitions(), ivf.n_probe()),
    };

    let mut writer = ChecksumWriter::new(writer);
    writer.write_bytes(&MAGIC)?;
    writer.write_u32(FORMAT_VERSION)?;
    writer.write_u32(dimension)?;
    writer.write_u8(index.metric().id())?;
    writer.write_u8(index.mode().id())?;
    writer.write_u16(0)?;
    writer.write_u64(store.size() as u64)?;
    writer.write_u32(to_u32(n_partitions, "n_partitions")?)?;
    writer.write_u32(to_u32(n_probe, "n_probe")?)?;
    debug_assert_eq!(writer.position() as usize, HEADER_LEN);

    writer.write_f32_slice(store.as_slice())?;

    if let VectorIndex::Partitioned(ivf) = index {
        writer.write_f32_slice(ivf.centroids().as_slice())?;
        for list in ivf.lists() {
            writer.write_u64(list.len() as u64)?;
            for &id in list {
                writer.write_u64(id)?;
            }
        }
    }

    debug!("Encoded index body of {} bytes", writer.position());
    writer.finish()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn to_usize(value: u64, what: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| IvfServeError::corrupt_format(format!("{what} {value} does not fit in memory")))
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| IvfServeError::invalid_argument(format!("{what} {value} does not fit in u32")))
}
