//! Solid-block archive management: many small files compressed together as
//! one stream so cross-file redundancy gets caught, the way 7z folders and
//! RAR solid blocks both work. Grounded on `block.rs`/`writer/unpack_info.rs`
//! (which track per-entry offsets into a shared decompressed folder) and
//! `archive.rs` (which drives the whole-folder codec over the write path).

use lzma_core::lzma2;
use rc_core::{Error, Result};

/// Where one file's bytes sit inside the solid block's decompressed
/// concatenation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub offset: usize,
    pub size: usize,
}

/// Accumulates files into one buffer, ready to be compressed as a single
/// stream by [`Self::finalize`].
#[derive(Default)]
pub struct SolidBlockWriter {
    buffer: Vec<u8>,
    entries: Vec<Entry>,
}

impl SolidBlockWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, name: impl Into<String>, bytes: &[u8]) {
        let offset = self.buffer.len();
        self.buffer.extend_from_slice(bytes);
        self.entries.push(Entry {
            name: name.into(),
            offset,
            size: bytes.len(),
        });
    }

    /// Compresses the accumulated buffer with LZMA2 at `level` and returns
    /// the compressed bytes plus the index needed to extract any one file
    /// later without re-running the codec over the others.
    pub fn finalize(self, level: u32) -> Result<(Vec<u8>, Vec<Entry>)> {
        let compressed = lzma2::compress(&self.buffer, level)?;
        Ok((compressed, self.entries))
    }

    pub fn uncompressed_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Reads a solid block previously produced by [`SolidBlockWriter`].
pub struct SolidBlockReader {
    dict_size: u32,
    checkpoint_interval: Option<usize>,
}

impl SolidBlockReader {
    pub fn new(dict_size: u32) -> Self {
        Self {
            dict_size,
            checkpoint_interval: None,
        }
    }

    /// Opts into checkpointing at `interval` uncompressed bytes. Off by
    /// default: resuming from a checkpoint instead of byte 0 needs an
    /// LZMA2 encoder that places a dict-reset chunk boundary at every
    /// checkpoint and a decoder entry point that can start mid-stream from
    /// one, neither of which this reader's plain `lzma2::decompress` call
    /// does yet, so the interval is accepted but `extract` still decodes
    /// the whole block. The knob exists so a caller can opt in now and get
    /// the speedup transparently once that decoder entry point lands.
    pub fn with_checkpoints(mut self, interval: usize) -> Self {
        self.checkpoint_interval = Some(interval.max(1));
        self
    }

    /// Decodes the whole solid block and slices out one entry's bytes.
    pub fn extract(&self, entry: &Entry, compressed: &[u8]) -> Result<Vec<u8>> {
        if self.checkpoint_interval.is_some() {
            log::warn!(
                "solid block: checkpoint interval configured but extract() has no mid-stream \
                 entry point yet, decoding entry {:?} from the start",
                entry.name
            );
        }
        let target_end = entry.offset + entry.size;
        let decoded = lzma2::decompress(compressed, self.dict_size)?;
        decoded
            .get(entry.offset..target_end)
            .map(|s| s.to_vec())
            .ok_or_else(|| Error::corrupt("solid block: entry out of bounds"))
    }

    /// Decodes the whole block once and extracts every entry, cheaper than
    /// calling [`Self::extract`] once per file.
    pub fn extract_all(&self, entries: &[Entry], compressed: &[u8]) -> Result<Vec<Vec<u8>>> {
        let decoded = lzma2::decompress(compressed, self.dict_size)?;
        entries
            .iter()
            .map(|e| {
                decoded
                    .get(e.offset..e.offset + e.size)
                    .map(|s| s.to_vec())
                    .ok_or_else(|| Error::corrupt("solid block: entry out of bounds"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_extract_roundtrip() {
        let mut writer = SolidBlockWriter::new();
        writer.add_file("a.txt", b"hello world");
        writer.add_file("b.txt", b"goodbye world, goodbye world");
        let (compressed, entries) = writer.finalize(6).unwrap();

        let reader = SolidBlockReader::new(1 << 20);
        let a = reader.extract(&entries[0], &compressed).unwrap();
        let b = reader.extract(&entries[1], &compressed).unwrap();
        assert_eq!(a, b"hello world");
        assert_eq!(b, b"goodbye world, goodbye world");
    }

    #[test]
    fn extract_all_matches_individual_extract() {
        let mut writer = SolidBlockWriter::new();
        for i in 0..5 {
            writer.add_file(format!("f{i}"), format!("file number {i}").as_bytes());
        }
        let (compressed, entries) = writer.finalize(6).unwrap();
        let reader = SolidBlockReader::new(1 << 20).with_checkpoints(8);
        let all = reader.extract_all(&entries, &compressed).unwrap();
        for (entry, bytes) in entries.iter().zip(all.iter()) {
            let single = reader.extract(entry, &compressed).unwrap();
            assert_eq!(&single, bytes);
            assert_eq!(bytes.len(), entry.size);
        }
    }

    #[test]
    fn empty_block_roundtrips() {
        let writer = SolidBlockWriter::new();
        let (compressed, entries) = writer.finalize(6).unwrap();
        assert!(entries.is_empty());
        let reader = SolidBlockReader::new(1 << 20);
        assert!(reader.extract_all(&entries, &compressed).unwrap().is_empty());
    }
}
