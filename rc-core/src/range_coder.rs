//! The binary range coder shared by LZMA, LZMA2, PPMd7 and BCJ2.
//!
//! Two coding modes live on the same encoder/decoder pair: adaptive
//! bit-probability coding (`encode_bit`/`decode_bit`, used by LZMA's literal
//! and length/distance trees and by BCJ2's branch predictor) and cumulative
//! frequency coding (`encode_freq`/`decode_freq`, used by PPMd7's order-N
//! model). Both share one renormalization loop and one carry-propagating
//! low/cache scheme, so a single pair of types covers every consumer.

use std::io::{Read, Write};

use crate::error::Result;

const TOP_VALUE: u32 = 1 << 24;

/// Total range of an adaptive bit probability; matches the LZMA SDK.
pub const PROB_TOTAL_BITS: u32 = 11;
pub const PROB_TOTAL: u32 = 1 << PROB_TOTAL_BITS;
/// Adaptation shift applied on every bit coded; same constant used to move
/// a probability towards 0 or towards `PROB_TOTAL`.
pub const PROB_MOVE_BITS: u32 = 5;
/// A freshly constructed probability sits at the midpoint.
pub const PROB_INIT: u16 = (PROB_TOTAL / 2) as u16;

#[inline]
fn update_prob_0(prob: &mut u16) {
    *prob += ((PROB_TOTAL - *prob as u32) >> PROB_MOVE_BITS) as u16;
}

#[inline]
fn update_prob_1(prob: &mut u16) {
    *prob -= *prob >> PROB_MOVE_BITS;
}

/// Arithmetic range encoder. `low` is kept as `u64` so a carry out of the
/// top output byte can be detected before it is written.
pub struct RangeEncoder<W> {
    low: u64,
    range: u32,
    cache: u8,
    cache_size: u64,
    writer: W,
}

impl<W: Write> RangeEncoder<W> {
    pub fn new(writer: W) -> Self {
        Self {
            low: 0,
            range: 0xFFFF_FFFF,
            cache: 0,
            cache_size: 1,
            writer,
        }
    }

    fn shift_low(&mut self) -> Result<()> {
        if (self.low as u32) < 0xFF00_0000 || (self.low >> 32) != 0 {
            let carry = (self.low >> 32) as u8;
            let mut temp = self.cache;
            loop {
                self.writer.write_all(&[temp.wrapping_add(carry)])?;
                temp = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }
            self.cache = (self.low >> 24) as u8;
        }
        self.cache_size += 1;
        self.low = (self.low << 8) & 0xFFFF_FFFF;
        Ok(())
    }

    fn normalize(&mut self) -> Result<()> {
        while self.range < TOP_VALUE {
            self.range <<= 8;
            self.shift_low()?;
        }
        Ok(())
    }

    /// Encodes one bit using an adaptive probability.
    pub fn encode_bit(&mut self, prob: &mut u16, bit: u32) -> Result<()> {
        let bound = (self.range >> PROB_TOTAL_BITS) * (*prob as u32);
        if bit == 0 {
            self.range = bound;
            update_prob_0(prob);
        } else {
            self.low += bound as u64;
            self.range -= bound;
            update_prob_1(prob);
        }
        self.normalize()
    }

    /// Encodes `n` bits with a flat (non-adaptive) 50/50 probability.
    pub fn encode_direct_bits(&mut self, value: u32, n: u32) -> Result<()> {
        for i in (0..n).rev() {
            self.range >>= 1;
            if (value >> i) & 1 != 0 {
                self.low += self.range as u64;
            }
            self.normalize()?;
        }
        Ok(())
    }

    /// Encodes a symbol given its cumulative frequency, frequency and the
    /// total frequency of the context (PPMd7-style frequency coding).
    pub fn encode_freq(&mut self, cum_freq: u32, freq: u32, total: u32) -> Result<()> {
        let r = self.range / total;
        self.low += cum_freq as u64 * r as u64;
        self.range = r * freq;
        self.normalize()
    }

    /// Flushes the final bytes of `low` so the decoder can resolve the last
    /// symbol. Must be called exactly once, after the last encode call.
    pub fn finish(mut self) -> Result<W> {
        for _ in 0..5 {
            self.shift_low()?;
        }
        Ok(self.writer)
    }
}

/// Arithmetic range decoder, the mirror image of [`RangeEncoder`].
pub struct RangeDecoder<R> {
    range: u32,
    code: u32,
    reader: R,
    exhausted: bool,
}

impl<R: Read> RangeDecoder<R> {
    /// Initializes the decoder, consuming the encoder's sacrificial leading
    /// zero byte plus the first 4 code bytes.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut header = [0u8; 5];
        reader.read_exact(&mut header)?;
        let code = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
        Ok(Self {
            range: 0xFFFF_FFFF,
            code,
            reader,
            exhausted: false,
        })
    }

    /// `true` once the decoder has read past the end of the underlying
    /// stream. Per the defined edge case, further reads return zero bytes
    /// rather than erroring so a chunk's declared length remains the sole
    /// authority on when decoding actually stops.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    fn next_byte(&mut self) -> u32 {
        let mut b = [0u8; 1];
        match self.reader.read_exact(&mut b) {
            Ok(()) => b[0] as u32,
            Err(_) => {
                self.exhausted = true;
                0
            }
        }
    }

    fn normalize(&mut self) {
        while self.range < TOP_VALUE {
            self.code = (self.code << 8) | self.next_byte();
            self.range <<= 8;
        }
    }

    /// Decodes one bit using an adaptive probability.
    pub fn decode_bit(&mut self, prob: &mut u16) -> Result<u32> {
        let bound = (self.range >> PROB_TOTAL_BITS) * (*prob as u32);
        let bit;
        if self.code < bound {
            self.range = bound;
            update_prob_0(prob);
            bit = 0;
        } else {
            self.code -= bound;
            self.range -= bound;
            update_prob_1(prob);
            bit = 1;
        }
        self.normalize();
        Ok(bit)
    }

    /// Decodes `n` bits coded with a flat 50/50 probability.
    pub fn decode_direct_bits(&mut self, n: u32) -> Result<u32> {
        let mut result = 0u32;
        for _ in 0..n {
            self.range >>= 1;
            self.code = self.code.wrapping_sub(self.range);
            let t = 0u32.wrapping_sub(self.code >> 31);
            self.code = self.code.wrapping_add(self.range & t);
            result = (result << 1).wrapping_add(t.wrapping_add(1));
            self.normalize();
        }
        Ok(result)
    }

    /// Returns the scaled cumulative-frequency threshold for a context whose
    /// total frequency is `total`; the caller walks its symbol table to find
    /// which symbol's `[cum_freq, cum_freq+freq)` range contains it, then
    /// calls [`Self::decode_update`].
    pub fn decode_freq(&mut self, total: u32) -> u32 {
        self.range /= total;
        self.code / self.range
    }

    pub fn decode_update(&mut self, cum_freq: u32, freq: u32) -> Result<()> {
        self.code -= cum_freq * self.range;
        self.range *= freq;
        self.normalize();
        Ok(())
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_roundtrip() {
        let bits = [0u32, 1, 1, 0, 0, 0, 1, 1, 1, 0, 1, 0, 1, 1, 0, 0];
        let mut buf = Vec::new();
        {
            let mut enc = RangeEncoder::new(&mut buf);
            let mut prob = PROB_INIT;
            for &b in &bits {
                enc.encode_bit(&mut prob, b).unwrap();
            }
            enc.finish().unwrap();
        }
        let mut dec = RangeDecoder::new(&buf[..]).unwrap();
        let mut prob = PROB_INIT;
        for &b in &bits {
            assert_eq!(dec.decode_bit(&mut prob).unwrap(), b);
        }
    }

    #[test]
    fn direct_bits_roundtrip() {
        let mut buf = Vec::new();
        {
            let mut enc = RangeEncoder::new(&mut buf);
            enc.encode_direct_bits(0x3A5, 12).unwrap();
            enc.finish().unwrap();
        }
        let mut dec = RangeDecoder::new(&buf[..]).unwrap();
        assert_eq!(dec.decode_direct_bits(12).unwrap(), 0x3A5);
    }

    #[test]
    fn freq_roundtrip() {
        // Three symbols with frequencies 5, 3, 8 out of a total of 16.
        let symbols = [(0u32, 5u32), (5, 3), (8, 8)];
        let total = 16;
        let sequence = [0usize, 2, 1, 2, 0, 2];
        let mut buf = Vec::new();
        {
            let mut enc = RangeEncoder::new(&mut buf);
            for &s in &sequence {
                let (cum, freq) = symbols[s];
                enc.encode_freq(cum, freq, total).unwrap();
            }
            enc.finish().unwrap();
        }
        let mut dec = RangeDecoder::new(&buf[..]).unwrap();
        for &s in &sequence {
            let target = dec.decode_freq(total);
            let found = symbols.iter().position(|&(cum, freq)| {
                target >= cum && target < cum + freq
            }).unwrap();
            assert_eq!(found, s);
            let (cum, freq) = symbols[found];
            dec.decode_update(cum, freq).unwrap();
        }
    }
}
