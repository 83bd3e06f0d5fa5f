//! Checksummed little-endian readers and writers for index files.

use std::io::{self, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{IvfServeError, Result};

/// Size of the crc32 trailer.
pub const CHECKSUM_LEN: usize = 4;

/// Writer that hashes every byte it forwards.
pub struct ChecksumWriter<W: Write> {
    writer: W,
    hasher: crc32fast::Hasher,
    position: u64,
}

impl<W: Write> ChecksumWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            hasher: crc32fast::Hasher::new(),
            position: 0,
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_all(bytes)?;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        WriteBytesExt::write_u8(self, value)?;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        WriteBytesExt::write_u16::<LittleEndian>(self, value)?;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        WriteBytesExt::write_u32::<LittleEndian>(self, value)?;
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        WriteBytesExt::write_u64::<LittleEndian>(self, value)?;
        Ok(())
    }

    /// Write a run of f32 values.
    pub fn write_f32_slice(&mut self, values: &[f32]) -> Result<()> {
        let mut buf = Vec::with_capacity(values.len().min(16_384) * 4);
        for chunk in values.chunks(16_384) {
            buf.clear();
            for &value in chunk {
                buf.extend_from_slice(&value.to_le_bytes());
            }
            self.write_all(&buf)?;
        }
        Ok(())
    }

    /// Bytes written so far, excluding the trailer.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Append the checksum of everything written so far and return the inner writer.
    pub fn finish(mut self) -> Result<W> {
        let checksum = self.hasher.finalize();
        self.writer.write_u32::<LittleEndian>(checksum)?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> Write for ChecksumWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.writer.write(buf)?;
        self.hasher.update(&buf[..written]);
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Bounds-checked reader over the body of an index file.
///
/// Running out of bytes is reported as `CorruptFormat`, never as an I/O error.
pub struct SliceReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> SliceReader<'a> {
    /// Verify the trailing checksum of `bytes` and return a reader over the body.
    pub fn verified(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < CHECKSUM_LEN {
            return Err(IvfServeError::corrupt_format(
                "file too short for checksum",
            ));
        }
        let (body, mut trailer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        let stored = trailer.read_u32::<LittleEndian>()?;
        let actual = crc32fast::hash(body);
        if stored != actual {
            return Err(IvfServeError::corrupt_format(format!(
                "checksum mismatch: stored {stored:#010x}, computed {actual:#010x}"
            )));
        }
        Ok(Self::new(body))
    }

    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(IvfServeError::corrupt_format(format!(
                "truncated {what}: need {len} bytes at offset {}, {} left",
                self.position,
                self.remaining()
            )));
        }
        let bytes = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(bytes)
    }

    pub fn read_bytes(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        self.take(len, what)
    }

    pub fn read_u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    pub fn read_u16(&mut self, what: &str) -> Result<u16> {
        let mut bytes = self.take(2, what)?;
        Ok(bytes.read_u16::<LittleEndian>()?)
    }

    pub fn read_u32(&mut self, what: &str) -> Result<u32> {
        let mut bytes = self.take(4, what)?;
        Ok(bytes.read_u32::<LittleEndian>()?)
    }

    pub fn read_u64(&mut self, what: &str) -> Result<u64> {
        let mut bytes = self.take(8, what)?;
        Ok(bytes.read_u64::<LittleEndian>()?)
    }

    /// Read `count` f32 values. The byte length is checked before allocating.
    pub fn read_f32_vec(&mut self, count: usize, what: &str) -> Result<Vec<f32>> {
        let len = count.checked_mul(4).ok_or_else(|| {
            IvfServeError::corrupt_format(format!("{what} length overflows"))
        })?;
        let mut bytes = self.take(len, what)?;
        let mut values = vec![0.0f32; count];
        bytes.read_f32_into::<LittleEndian>(&mut values)?;
        Ok(values)
    }

    /// Read `count` u64 values. The byte length is checked before allocating.
    pub fn read_u64_vec(&mut self, count: usize, what: &str) -> Result<Vec<u64>> {
        let len = count.checked_mul(8).ok_or_else(|| {
            IvfServeError::corrupt_format(format!("{what} length overflows"))
        })?;
        let mut bytes = self.take(len, what)?;
        let mut values = vec![0u64; count];
        bytes.read_u64_into::<LittleEndian>(&mut values)?;
        Ok(values)
    }
}
