//! PPMd7 (variant H) order-N context-modelling compressor.
//!
//! Unlike LZMA's dictionary-match model, PPMd predicts each byte from the
//! symbols that have previously followed the same short history, falling
//! back ("escaping") to shorter and shorter histories when the current one
//! has never seen this byte before. See [`model`] for the context-tree
//! implementation and its documented differences from the 7-Zip reference.
//!
//! PPMd7 has no chunk framing of its own: callers that need one (the 7z
//! folder layer, for instance) frame the declared uncompressed length
//! externally and call [`decompress`] with it, mirroring how the format
//! embeds PPMd7 streams in practice.

mod model;

use std::io::{Read, Write};

use rc_core::{RangeDecoder, RangeEncoder, Result};

pub use model::{Ppmd7Model, Ppmd7Params};

/// Streaming encoder: wraps a [`Ppmd7Model`] and a [`RangeEncoder`].
pub struct Ppmd7Encoder {
    model: Ppmd7Model,
}

impl Ppmd7Encoder {
    pub fn new(params: Ppmd7Params) -> Self {
        Ppmd7Encoder {
            model: Ppmd7Model::new(params),
        }
    }

    pub fn encode<W: Write>(&mut self, rc: &mut RangeEncoder<W>, data: &[u8]) -> Result<()> {
        for &byte in data {
            self.model.encode_symbol(rc, byte)?;
        }
        Ok(())
    }
}

/// Streaming decoder: wraps a [`Ppmd7Model`] and a [`RangeDecoder`].
pub struct Ppmd7Decoder {
    model: Ppmd7Model,
}

impl Ppmd7Decoder {
    pub fn new(params: Ppmd7Params) -> Self {
        Ppmd7Decoder {
            model: Ppmd7Model::new(params),
        }
    }

    /// Decodes exactly `len` bytes. PPMd7 has no end-of-stream symbol of its
    /// own; the caller's declared length is the sole termination signal,
    /// unlike the reference decoder's fixed iteration-count probe.
    pub fn decode<R: Read>(
        &mut self,
        rc: &mut RangeDecoder<R>,
        len: usize,
        out: &mut Vec<u8>,
    ) -> Result<()> {
        out.reserve(len);
        for _ in 0..len {
            out.push(self.model.decode_symbol(rc)?);
        }
        Ok(())
    }
}

/// Compresses `data` into a standalone range-coded PPMd7 stream.
pub fn compress(data: &[u8], params: Ppmd7Params) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut encoder = Ppmd7Encoder::new(params);
    {
        let mut rc = RangeEncoder::new(&mut out);
        encoder.encode(&mut rc, data)?;
        rc.finish()?;
    }
    Ok(out)
}

/// Decompresses a standalone PPMd7 stream produced by [`compress`]. The
/// caller must know the uncompressed length ahead of time, the same
/// contract 7z and RAR place on this codec.
pub fn decompress(data: &[u8], len: usize, params: Ppmd7Params) -> Result<Vec<u8>> {
    let mut decoder = Ppmd7Decoder::new(params);
    let mut rc = RangeDecoder::new(data)?;
    let mut out = Vec::new();
    decoder.decode(&mut rc, len, &mut out)?;
    if rc.is_exhausted() {
        log::warn!("ppmd7: range decoder ran past the end of its input before {len} bytes were produced");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_decompress_roundtrip() {
        let data = b"abracadabra abracadabra abracadabra, the magic word repeats".to_vec();
        let params = Ppmd7Params::default();
        let packed = compress(&data, params).unwrap();
        let unpacked = decompress(&packed, data.len(), params).unwrap();
        assert_eq!(unpacked, data);
    }

    #[test]
    fn compress_decompress_empty() {
        let params = Ppmd7Params::default();
        let packed = compress(&[], params).unwrap();
        let unpacked = decompress(&packed, 0, params).unwrap();
        assert!(unpacked.is_empty());
    }
}
