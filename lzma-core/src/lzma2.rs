//! LZMA2: the chunked container XZ and 7z both embed raw LZMA inside.
//!
//! A stream is a sequence of chunks, each starting with a control byte that
//! says whether the chunk is compressed or stored verbatim and which parts
//! of the LZMA state (dictionary / probabilities+12-state-machine / lc-lp-pb
//! properties) reset at that point. Splitting a long compression into many
//! small chunks this way is what lets 7z and xz seek into a solid block at a
//! chunk boundary instead of only at the start of the whole stream.
//!
//! ### Control byte
//!
//! ```text
//! 0x00            end of stream
//! 0x01            uncompressed chunk, resets the dictionary
//! 0x02            uncompressed chunk, dictionary kept
//! 0x03 - 0x7F     reserved (invalid)
//! 0x80 - 0xFF     LZMA chunk; bits 6-5 select the reset level:
//!                   00 (0x80-0x9F)  no reset
//!                   01 (0xA0-0xBF)  reset state (probabilities + 12-state machine)
//!                   10 (0xC0-0xDF)  reset state, read new lc/lp/pb
//!                   11 (0xE0-0xFF)  reset state + dictionary, read new lc/lp/pb
//! ```
//!
//! Both size fields are stored biased by one: `uncompressed_size = ((control
//! & 0x1F) << 16) + u16_be + 1` (so up to 2^21 bytes), `compressed_size =
//! u16_be + 1` (so up to 2^16 bytes). Only an LZMA chunk with a full reset
//! (`0xE0-0xFF`) is a valid place to start decoding mid-stream.

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use rc_core::{Error, RangeDecoder, RangeEncoder, Result};

use crate::lzma::{LzmaEncoderState, LzmaProps, LzmaState};

/// Largest `uncompressed_size` an LZMA chunk's 21-bit field can declare.
pub const MAX_UNCOMPRESSED_CHUNK: usize = 1 << 21;
/// Largest `compressed_size` an LZMA chunk's 16-bit field can declare, and
/// also the largest run an "uncompressed" chunk can carry (it reuses the
/// same 16-bit field).
pub const MAX_COMPRESSED_CHUNK: usize = 1 << 16;

/// Per-chunk uncompressed size the encoder targets.
///
/// Chosen so a chunk can never overflow [`MAX_COMPRESSED_CHUNK`] even in the
/// adaptive range coder's worst case: a literal bit's probability can drift
/// down to roughly `1/64` before [`rc_core`]'s update shift stops moving it
/// further, i.e. at most about 8 bits of output per input bit, or 8 bytes out
/// per byte in. `1 << 12` bytes in times that factor leaves a wide margin
/// under the 64 KiB cap, so the encoder never needs to split a chunk
/// mid-stream to stay under it.
const ENCODER_CHUNK_SIZE: usize = 1 << 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ResetLevel {
    None,
    State,
    StateAndProps,
    Everything,
}

struct ChunkHeader {
    is_lzma: bool,
    reset: ResetLevel,
    uncompressed_size: usize,
}

fn parse_control(control: u8, next_two: impl FnOnce() -> Result<u16>) -> Result<Option<ChunkHeader>> {
    if control == 0x00 {
        return Ok(None);
    }
    if control >= 0x80 {
        let reset = match (control >> 5) & 0x3 {
            0 => ResetLevel::None,
            1 => ResetLevel::State,
            2 => ResetLevel::StateAndProps,
            _ => ResetLevel::Everything,
        };
        let uncompressed_size = (((control & 0x1F) as usize) << 16) + next_two()? as usize + 1;
        Ok(Some(ChunkHeader {
            is_lzma: true,
            reset,
            uncompressed_size,
        }))
    } else if control <= 0x02 {
        let reset = if control == 0x01 {
            ResetLevel::Everything
        } else {
            ResetLevel::None
        };
        Ok(Some(ChunkHeader {
            is_lzma: false,
            reset,
            uncompressed_size: 0,
        }))
    } else {
        Err(Error::corrupt("reserved LZMA2 control byte"))
    }
}

/// Decodes a full LZMA2 stream, dictionary-sized for it, into one buffer.
pub fn decompress(data: &[u8], dict_size: u32) -> Result<Vec<u8>> {
    let mut reader = Lzma2Reader::new(data, dict_size);
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}

/// A streaming LZMA2 decoder, grounded on the standard chunked-reader shape:
/// pull a control byte, decide the chunk kind and reset level, then hand the
/// declared number of bytes to the shared LZMA state or copy them straight
/// through.
pub struct Lzma2Reader<R> {
    inner: R,
    state: Option<LzmaState>,
    dict_size: u32,
    need_dict_reset: bool,
    need_props: bool,
    end_reached: bool,
    pending: std::collections::VecDeque<u8>,
}

impl<R: Read> Lzma2Reader<R> {
    pub fn new(inner: R, dict_size: u32) -> Self {
        Self {
            inner,
            state: None,
            dict_size,
            need_dict_reset: true,
            need_props: true,
            end_reached: false,
            pending: std::collections::VecDeque::new(),
        }
    }

    fn read_props(&mut self) -> Result<(u32, u32, u32)> {
        let byte = self.inner.read_u8().map_err(Error::from)?;
        LzmaProps::from_prop_byte(byte)
    }

    fn decode_one_chunk(&mut self) -> Result<bool> {
        let control = match self.inner.read_u8() {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.end_reached = true;
                return Ok(false);
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let mut inner = &mut self.inner;
        let header = match parse_control(control, || {
            inner.read_u16::<BigEndian>().map_err(Error::from)
        })? {
            None => {
                self.end_reached = true;
                return Ok(false);
            }
            Some(h) => h,
        };

        log::debug!(
            "lzma2 chunk: lzma={} reset={:?} uncompressed_size={}",
            header.is_lzma,
            header.reset,
            header.uncompressed_size
        );

        if header.is_lzma {
            if header.reset == ResetLevel::Everything {
                self.need_props = true;
            }
            if self.need_dict_reset && header.reset != ResetLevel::Everything {
                return Err(Error::corrupt("LZMA2 chunk needs a dictionary reset"));
            }

            let compressed_size = self.inner.read_u16::<BigEndian>().map_err(Error::from)? as usize + 1;

            if header.reset == ResetLevel::StateAndProps || header.reset == ResetLevel::Everything {
                let (lc, lp, pb) = self.read_props()?;
                match &mut self.state {
                    Some(s) if header.reset != ResetLevel::Everything => s.reset_props(lc, lp, pb),
                    _ => {
                        let props = LzmaProps::new(lc, lp, pb, self.dict_size)?;
                        self.state = Some(LzmaState::new(props));
                    }
                }
                self.need_props = false;
            } else if self.need_props {
                return Err(Error::corrupt("LZMA2 chunk uses properties that were never set"));
            } else if header.reset == ResetLevel::State {
                self.state
                    .as_mut()
                    .ok_or_else(|| Error::corrupt("LZMA2 state reset with no prior properties"))?
                    .reset_state();
            }

            if header.reset == ResetLevel::Everything {
                self.state.as_mut().unwrap().reset_dict();
            }
            self.need_dict_reset = false;

            let mut compressed = vec![0u8; compressed_size];
            self.inner.read_exact(&mut compressed).map_err(Error::from)?;
            let mut rc = RangeDecoder::new(&compressed[..])?;
            let mut out = Vec::new();
            self.state.as_mut().unwrap().decode_chunk(
                &mut rc,
                header.uncompressed_size as u64,
                &mut out,
            )?;
            if rc.is_exhausted() {
                log::warn!("lzma2: range decoder ran past the end of its chunk buffer");
            }
            self.pending.extend(out);
        } else {
            if header.reset == ResetLevel::Everything {
                if let Some(s) = self.state.as_mut() {
                    s.reset_dict();
                }
                self.need_dict_reset = false;
            } else if self.need_dict_reset {
                return Err(Error::corrupt("LZMA2 uncompressed chunk needs a dictionary reset"));
            }
            let size = self.inner.read_u16::<BigEndian>().map_err(Error::from)? as usize + 1;
            let mut raw = vec![0u8; size];
            self.inner.read_exact(&mut raw).map_err(Error::from)?;
            if self.state.is_none() {
                // No properties chunk has ever been seen; a minimal dummy
                // state is enough since only its window is used here.
                self.state = Some(LzmaState::new(LzmaProps::new(0, 0, 0, self.dict_size)?));
            }
            let mut out = Vec::new();
            self.state.as_mut().unwrap().put_uncompressed(&raw, &mut out);
            self.pending.extend(out);
        }
        Ok(true)
    }
}

impl<R: Read> Read for Lzma2Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.pending.is_empty() && !self.end_reached {
            self.decode_one_chunk().map_err(std::io::Error::from)?;
        }
        let n = self.pending.len().min(buf.len());
        for (slot, byte) in buf[..n].iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

/// Encodes a full buffer as an LZMA2 stream at the given preset.
pub fn compress(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let (props, nice_len, depth) = LzmaProps::with_preset(level);
    Lzma2Encoder::new(props, nice_len, depth).encode(data)
}

/// A whole-buffer LZMA2 encoder. The match finder needs one contiguous,
/// absolutely-indexed slice for the lifetime of the stream (see
/// [`LzmaEncoderState::encode_range`]), so unlike the decoder this does not
/// stream incrementally: the caller's entire input is the buffer every chunk
/// indexes into.
pub struct Lzma2Encoder {
    props: LzmaProps,
    encoder: LzmaEncoderState,
    chunk_size: usize,
}

impl Lzma2Encoder {
    pub fn new(props: LzmaProps, nice_len: u32, depth: u32) -> Self {
        Self {
            props,
            encoder: LzmaEncoderState::new(props, nice_len, depth),
            chunk_size: ENCODER_CHUNK_SIZE,
        }
    }

    /// Overrides the per-chunk uncompressed size target. Must stay small
    /// enough that a chunk's compressed size cannot exceed
    /// [`MAX_COMPRESSED_CHUNK`]; see [`ENCODER_CHUNK_SIZE`]'s derivation.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.min(MAX_UNCOMPRESSED_CHUNK);
        self
    }

    pub fn encode(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        if data.is_empty() {
            out.write_u8(0x00).map_err(Error::Io)?;
            return Ok(out);
        }

        let mut start = 0usize;
        let mut first = true;
        while start < data.len() {
            let end = (start + self.chunk_size).min(data.len());

            let mut chunk_buf = Vec::new();
            {
                let mut rc = RangeEncoder::new(&mut chunk_buf);
                self.encoder.encode_range(&mut rc, data, start, end, false)?;
                rc.finish()?;
            }

            let uncompressed_len = end - start;
            let control = if first {
                0xE0u8
            } else {
                0x80u8
            } | (((uncompressed_len - 1) >> 16) as u8 & 0x1F);
            out.write_u8(control).map_err(Error::Io)?;
            out.write_u16::<BigEndian>(((uncompressed_len - 1) & 0xFFFF) as u16)
                .map_err(Error::Io)?;
            out.write_u16::<BigEndian>((chunk_buf.len() - 1) as u16)
                .map_err(Error::Io)?;
            if first {
                out.write_u8(self.props.prop_byte()).map_err(Error::Io)?;
            }
            out.extend_from_slice(&chunk_buf);

            log::debug!(
                "lzma2 chunk emitted: uncompressed={} compressed={} first={}",
                uncompressed_len,
                chunk_buf.len(),
                first
            );

            first = false;
            start = end;
        }

        out.write_u8(0x00).map_err(Error::Io)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8], level: u32) {
        let encoded = compress(data, level).unwrap();
        let (props, _, _) = LzmaProps::with_preset(level);
        let decoded = decompress(&encoded, props.dict_size).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn roundtrip_empty() {
        roundtrip(b"", 1);
    }

    #[test]
    fn roundtrip_small() {
        roundtrip(b"the quick brown fox jumps over the lazy dog", 1);
    }

    #[test]
    fn roundtrip_multi_chunk() {
        let mut data = Vec::new();
        for i in 0..50_000u32 {
            data.push((i % 251) as u8);
        }
        roundtrip(&data, 2);
    }

    #[test]
    fn roundtrip_repetitive_multi_chunk() {
        let data = "abcdefgh".repeat(20_000);
        roundtrip(data.as_bytes(), 3);
    }

    #[test]
    fn control_byte_parses_reset_levels() {
        let h = parse_control(0xE0, || Ok(0)).unwrap().unwrap();
        assert!(h.is_lzma);
        assert_eq!(h.reset, ResetLevel::Everything);
        let h = parse_control(0x01, || Ok(0)).unwrap().unwrap();
        assert!(!h.is_lzma);
        assert_eq!(h.reset, ResetLevel::Everything);
        assert!(parse_control(0x00, || Ok(0)).unwrap().is_none());
        assert!(parse_control(0x50, || Ok(0)).is_err());
    }
}
