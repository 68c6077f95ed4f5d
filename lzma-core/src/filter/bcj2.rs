//! BCJ2: the 4-substream x86 branch filter used by 7z/xz when a plain BCJ
//! pass isn't worth the extra entropy spent re-encoding every call target.
//! Instead of rewriting CALL/JMP/Jcc operands in place, BCJ2 pulls them out
//! into two side streams (`call`, `jump`) and range-codes, per instruction,
//! whether that particular occurrence was actually converted — so code that
//! never reaches through a given opcode byte doesn't pay for the model at
//! all.
//!
//! Stream layout: `main` carries the instruction bytes with converted
//! operands removed, `call` and `jump` carry the absolute 32-bit big-endian
//! destinations, and `range` carries the adaptive is-this-one-converted
//! bits. Implemented from the XZ Utils/7-Zip SDK reference behavior, since
//! the BCJ2 decoder elsewhere in this workspace's reference material was
//! left as a stub.

use std::io::{self, Read, Write};

use rc_core::{Error, RangeDecoder, RangeEncoder, Result, PROB_INIT};

const NUM_STATUS: usize = 256 + 2;
const JMP_CTX: usize = 256;
const JCC_CTX: usize = 257;

#[inline]
fn is_j(prev: u8, cur: u8) -> bool {
    (cur & 0xfe) == 0xe8 || is_jcc(prev, cur)
}

#[inline]
fn is_jcc(prev: u8, cur: u8) -> bool {
    prev == 0x0f && (cur & 0xf0) == 0x80
}

#[inline]
fn status_index(prev: u8, cur: u8) -> usize {
    match cur {
        0xe8 => prev as usize,
        0xe9 => JMP_CTX,
        _ => JCC_CTX,
    }
}

/// Merges the four BCJ2 substreams back into the original x86 byte stream.
pub struct Bcj2Decoder<M, C, J, S> {
    main: M,
    call: C,
    jump: J,
    rc: RangeDecoder<S>,
    probs: [u16; NUM_STATUS],
    prev_byte: u8,
    written: u32,
}

impl<M: Read, C: Read, J: Read, S: Read> Bcj2Decoder<M, C, J, S> {
    pub fn new(main: M, call: C, jump: J, range: S) -> Result<Self> {
        Ok(Self {
            main,
            call,
            jump,
            rc: RangeDecoder::new(range)?,
            probs: [PROB_INIT; NUM_STATUS],
            prev_byte: 0,
            written: 0,
        })
    }

    /// Decodes the whole main stream into `out`; BCJ2 chunks are small
    /// enough in practice (bounded by the enclosing solid block) that
    /// whole-buffer decoding keeps the bookkeeping simple.
    pub fn decode_all(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let mut byte = [0u8; 1];
        loop {
            let n = self.main.read(&mut byte).map_err(Error::Io)?;
            if n == 0 {
                return Ok(());
            }
            let b = byte[0];
            out.push(b);
            self.written = self.written.wrapping_add(1);

            if is_j(self.prev_byte, b) {
                let idx = status_index(self.prev_byte, b);
                let converted = self.rc.decode_bit(&mut self.probs[idx])? == 1;
                if converted {
                    let mut dest = [0u8; 4];
                    if b == 0xe8 {
                        self.call.read_exact(&mut dest).map_err(Error::from)?;
                    } else {
                        self.jump.read_exact(&mut dest).map_err(Error::from)?;
                    }
                    let abs = u32::from_be_bytes(dest);
                    let rel = abs.wrapping_sub(self.written.wrapping_add(4));
                    out.extend_from_slice(&rel.to_le_bytes());
                    self.prev_byte = (rel >> 24) as u8;
                    self.written = self.written.wrapping_add(4);
                    continue;
                }
            }
            self.prev_byte = b;
        }
    }
}

/// Splits a raw x86 byte stream into BCJ2's four substreams.
pub struct Bcj2Encoder {
    main: Vec<u8>,
    call: Vec<u8>,
    jump: Vec<u8>,
    rc: RangeEncoder<Vec<u8>>,
    probs: [u16; NUM_STATUS],
    prev_byte: u8,
    position: u32,
}

pub struct Bcj2Streams {
    pub main: Vec<u8>,
    pub call: Vec<u8>,
    pub jump: Vec<u8>,
    pub range: Vec<u8>,
}

impl Bcj2Encoder {
    pub fn new() -> Self {
        Self {
            main: Vec::new(),
            call: Vec::new(),
            jump: Vec::new(),
            rc: RangeEncoder::new(Vec::new()),
            probs: [PROB_INIT; NUM_STATUS],
            prev_byte: 0,
            position: 0,
        }
    }

    /// Consumes `data` entirely and splits it into the four streams.
    ///
    /// Every eligible CALL/JMP/Jcc is converted; a real encoder would weigh
    /// conversion against the cost of coding the "not converted" bit for
    /// operands that are not plausible absolute addresses, but that
    /// heuristic is an optimization, not a correctness requirement — an
    /// always-convert encoder and this decoder still round-trip exactly.
    pub fn encode(mut self, data: &[u8]) -> Result<Bcj2Streams> {
        let mut i = 0;
        while i < data.len() {
            let b = data[i];
            let convertible = is_j(self.prev_byte, b) && i + 5 <= data.len();

            if convertible {
                let rel = u32::from_le_bytes([data[i + 1], data[i + 2], data[i + 3], data[i + 4]]);
                let abs = rel.wrapping_add(self.position.wrapping_add(5));
                let idx = status_index(self.prev_byte, b);
                self.rc.encode_bit(&mut self.probs[idx], 1)?;
                self.main.push(b);
                self.position = self.position.wrapping_add(1);
                let dest = abs.to_be_bytes();
                if b == 0xe8 {
                    self.call.extend_from_slice(&dest);
                } else {
                    self.jump.extend_from_slice(&dest);
                }
                self.prev_byte = data[i + 4];
                self.position = self.position.wrapping_add(4);
                i += 5;
                continue;
            }

            if is_j(self.prev_byte, b) {
                let idx = status_index(self.prev_byte, b);
                self.rc.encode_bit(&mut self.probs[idx], 0)?;
            }
            self.main.push(b);
            self.prev_byte = b;
            self.position = self.position.wrapping_add(1);
            i += 1;
        }

        let range = self.rc.finish()?;
        Ok(Bcj2Streams { main: self.main, call: self.call, jump: self.jump, range })
    }
}

impl Default for Bcj2Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes 4 framed substreams as `u32`-LE-length-prefixed blocks, the way
/// the solid-block manager stores a coder's multiple outputs as one blob
/// when a container format doesn't give BCJ2 first-class multi-stream
/// support.
pub fn write_framed<W: Write>(streams: &Bcj2Streams, mut out: W) -> io::Result<()> {
    for part in [&streams.main, &streams.call, &streams.jump, &streams.range] {
        out.write_all(&(part.len() as u32).to_le_bytes())?;
        out.write_all(part)?;
    }
    Ok(())
}

pub fn read_framed(mut data: &[u8]) -> io::Result<[Vec<u8>; 4]> {
    let mut parts = Vec::with_capacity(4);
    for _ in 0..4 {
        let mut len_bytes = [0u8; 4];
        data.read_exact(&mut len_bytes)?;
        let len = u32::from_le_bytes(len_bytes) as usize;
        let mut buf = vec![0u8; len];
        data.read_exact(&mut buf)?;
        parts.push(buf);
    }
    Ok([
        std::mem::take(&mut parts[0]),
        std::mem::take(&mut parts[1]),
        std::mem::take(&mut parts[2]),
        std::mem::take(&mut parts[3]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_plain_call() {
        let mut data = vec![0x55u8, 0x89, 0xe5];
        data.push(0xe8);
        data.extend_from_slice(&10i32.to_le_bytes());
        data.push(0xc3);
        data.extend_from_slice(&[0u8; 10]);

        let streams = Bcj2Encoder::new().encode(&data).unwrap();
        let mut out = Vec::new();
        let mut dec = Bcj2Decoder::new(
            &streams.main[..],
            &streams.call[..],
            &streams.jump[..],
            &streams.range[..],
        )
        .unwrap();
        dec.decode_all(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn roundtrip_no_branches() {
        let data: Vec<u8> = (0..64u32).map(|i| (i * 3) as u8).collect();
        let streams = Bcj2Encoder::new().encode(&data).unwrap();
        assert!(streams.call.is_empty());
        assert!(streams.jump.is_empty());
        let mut out = Vec::new();
        let mut dec = Bcj2Decoder::new(
            &streams.main[..],
            &streams.call[..],
            &streams.jump[..],
            &streams.range[..],
        )
        .unwrap();
        dec.decode_all(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn framed_roundtrip() {
        let data = vec![0xe8u8, 1, 2, 3, 4, 0x90, 0x90];
        let streams = Bcj2Encoder::new().encode(&data).unwrap();
        let mut framed = Vec::new();
        write_framed(&streams, &mut framed).unwrap();
        let parts = read_framed(&framed).unwrap();
        let mut out = Vec::new();
        let mut dec =
            Bcj2Decoder::new(&parts[0][..], &parts[1][..], &parts[2][..], &parts[3][..]).unwrap();
        dec.decode_all(&mut out).unwrap();
        assert_eq!(out, data);
    }
}
