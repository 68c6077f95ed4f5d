//! Codec registry: a tagged variant enum rather than a trait-object
//! hierarchy, since this format family's codec set is small and closed
//! enough that a `match` arm costs less than a vtable. Each variant
//! implements the same external interface: decode/encode a byte buffer
//! given its properties and a caller's limits.

use lzma_core::filter::{
    read_framed, write_framed, Bcj2Decoder, Bcj2Encoder, BcjArch, BcjReader, BcjWriter,
    DeltaReader, DeltaWriter,
};
use lzma_core::lzma2;
use ppmd_core::{self, Ppmd7Params};
use rc_core::{Error, Limits, NoProgress, Progress, Result, Stats};
use std::io::{Read, Write};

/// Every codec this core implements. `deflate`/`zstd` are named elsewhere
/// in the wider format family but are out of this core's scope, so callers
/// asking for them get [`Error::Unsupported`] rather than the registry
/// pretending to cover formats it doesn't.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CodecId {
    Store,
    Lzma2 { dict_size: u32 },
    Ppmd7 { order: u32, mem_size_bytes: u32 },
    Bcj(BcjArch),
    /// 1..=256, matching the XZ/7z delta filter's property range.
    Delta { distance: u16 },
    /// x86 branch converter split across 4 substreams (main/call/jump/range
    /// probability model), framed as one blob via
    /// [`lzma_core::filter::write_framed`]/`read_framed` so it still fits
    /// this registry's single-buffer `decode`/`encode` contract.
    Bcj2,
}

impl CodecId {
    pub fn decode(&self, source: &[u8], limits: &Limits) -> Result<(Vec<u8>, Stats)> {
        let mut progress = NoProgress;
        self.decode_with_progress(source, limits, &mut progress)
    }

    pub fn decode_with_progress(
        &self,
        source: &[u8],
        limits: &Limits,
        progress: &mut dyn Progress,
    ) -> Result<(Vec<u8>, Stats)> {
        let out = match self {
            CodecId::Store => source.to_vec(),
            CodecId::Lzma2 { dict_size } => lzma2::decompress(source, *dict_size)?,
            CodecId::Ppmd7 { .. } => {
                return Err(Error::invalid_argument(
                    "ppmd7 decode requires a declared length; use decode_ppmd7",
                ));
            }
            CodecId::Bcj(arch) => {
                let mut reader = BcjReader::new(source, *arch, 0, false);
                let mut out = Vec::with_capacity(source.len());
                reader.read_to_end(&mut out).map_err(Error::from)?;
                out
            }
            CodecId::Delta { distance } => {
                let mut reader = DeltaReader::new(source, *distance as usize);
                let mut out = Vec::with_capacity(source.len());
                reader.read_to_end(&mut out).map_err(Error::from)?;
                out
            }
            CodecId::Bcj2 => {
                let [main, call, jump, range] =
                    read_framed(source).map_err(Error::from)?;
                let mut decoder = Bcj2Decoder::new(&main[..], &call[..], &jump[..], &range[..])?;
                let mut out = Vec::with_capacity(main.len());
                decoder.decode_all(&mut out)?;
                out
            }
        };
        limits.check(out.len() as u64)?;
        if !progress.on_progress(source.len() as u64, out.len() as u64) {
            return Err(Error::Cancelled);
        }
        let stats = Stats {
            input_bytes: source.len() as u64,
            output_bytes: out.len() as u64,
        };
        Ok((out, stats))
    }

    pub fn encode(&self, source: &[u8], limits: &Limits) -> Result<(Vec<u8>, Stats)> {
        let out = match self {
            CodecId::Store => source.to_vec(),
            CodecId::Lzma2 { .. } => lzma2::compress(source, 6)?,
            CodecId::Ppmd7 { order, mem_size_bytes } => {
                let params = Ppmd7Params::new(*order, *mem_size_bytes)?;
                ppmd_core::compress(source, params)?
            }
            CodecId::Bcj(arch) => {
                let mut out = Vec::with_capacity(source.len());
                let mut writer = BcjWriter::new(&mut out, *arch, 0, true);
                writer.write_all(source).map_err(Error::from)?;
                writer.finish().map_err(Error::from)?;
                out
            }
            CodecId::Delta { distance } => {
                let mut out = Vec::with_capacity(source.len());
                let mut writer = DeltaWriter::new(&mut out, *distance as usize);
                writer.write_all(source).map_err(Error::from)?;
                writer.flush().map_err(Error::from)?;
                out
            }
            CodecId::Bcj2 => {
                let streams = Bcj2Encoder::new().encode(source)?;
                let mut out = Vec::new();
                write_framed(&streams, &mut out).map_err(Error::from)?;
                out
            }
        };
        limits.check(out.len() as u64)?;
        let stats = Stats {
            input_bytes: source.len() as u64,
            output_bytes: out.len() as u64,
        };
        Ok((out, stats))
    }

    /// PPMd7 needs the declared uncompressed length to know when to stop
    /// (it has no end-of-stream symbol of its own), so it doesn't fit the
    /// length-free `decode` signature the other codecs share.
    pub fn decode_ppmd7(&self, source: &[u8], declared_len: usize) -> Result<Vec<u8>> {
        match self {
            CodecId::Ppmd7 { order, mem_size_bytes } => {
                let params = Ppmd7Params::new(*order, *mem_size_bytes)?;
                ppmd_core::decompress(source, declared_len, params)
            }
            _ => Err(Error::invalid_argument("decode_ppmd7 called on a non-ppmd7 codec")),
        }
    }
}

/// A filter chain, fixed at four slots to match the XZ filter cap this
/// format family shares.
#[derive(Clone, Debug, Default)]
pub struct FilterChain {
    pub filters: [Option<CodecId>; 4],
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, codec: CodecId) -> Result<()> {
        for slot in &mut self.filters {
            if slot.is_none() {
                *slot = Some(codec);
                return Ok(());
            }
        }
        Err(Error::LimitExceeded)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodecId> {
        self.filters.iter().filter_map(|f| f.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_roundtrip() {
        let codec = CodecId::Store;
        let limits = Limits::none();
        let (enc, _) = codec.encode(b"hello", &limits).unwrap();
        let (dec, _) = codec.decode(&enc, &limits).unwrap();
        assert_eq!(dec, b"hello");
    }

    #[test]
    fn lzma2_roundtrip() {
        let codec = CodecId::Lzma2 { dict_size: 1 << 20 };
        let limits = Limits::none();
        let data = b"repeated repeated repeated data data data".to_vec();
        let (enc, _) = codec.encode(&data, &limits).unwrap();
        let (dec, _) = codec.decode(&enc, &limits).unwrap();
        assert_eq!(dec, data);
    }

    #[test]
    fn ppmd7_roundtrip_via_declared_length() {
        let codec = CodecId::Ppmd7 {
            order: 6,
            mem_size_bytes: 1 << 20,
        };
        let data = b"ppmd7 test payload with some repetition repetition".to_vec();
        let limits = Limits::none();
        let (enc, _) = codec.encode(&data, &limits).unwrap();
        let dec = codec.decode_ppmd7(&enc, data.len()).unwrap();
        assert_eq!(dec, data);
    }

    #[test]
    fn filter_chain_rejects_fifth_entry() {
        let mut chain = FilterChain::new();
        for _ in 0..4 {
            chain.push(CodecId::Delta { distance: 1 }).unwrap();
        }
        assert!(matches!(
            chain.push(CodecId::Delta { distance: 1 }).unwrap_err(),
            Error::LimitExceeded
        ));
    }

    #[test]
    fn bcj2_roundtrip() {
        let codec = CodecId::Bcj2;
        let limits = Limits::none();
        let mut data = vec![0x55u8, 0x89, 0xe5, 0xe8];
        data.extend_from_slice(&10i32.to_le_bytes());
        data.push(0xc3);
        data.extend_from_slice(&[0u8; 10]);
        let (enc, _) = codec.encode(&data, &limits).unwrap();
        let (dec, _) = codec.decode(&enc, &limits).unwrap();
        assert_eq!(dec, data);
    }

    #[test]
    fn limit_exceeded_surfaces() {
        let codec = CodecId::Store;
        let limits = Limits::with_max_output_bytes(2);
        assert!(matches!(
            codec.encode(b"too long", &limits).unwrap_err(),
            Error::LimitExceeded
        ));
    }
}
