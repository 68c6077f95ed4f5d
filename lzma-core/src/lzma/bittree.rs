//! Bit-tree helpers shared by the length coder, distance-slot coder and
//! literal coder: a balanced binary tree of adaptive probabilities, walked
//! either most-significant-bit first (trees) or least-significant-bit first
//! (the "reverse" variant used for align bits and short distances).

use rc_core::{RangeDecoder, RangeEncoder, Result};
use std::io::{Read, Write};

pub fn encode_tree<W: Write>(
    rc: &mut RangeEncoder<W>,
    probs: &mut [u16],
    num_bits: u32,
    symbol: u32,
) -> Result<()> {
    let mut idx = 1u32;
    for i in (0..num_bits).rev() {
        let bit = (symbol >> i) & 1;
        rc.encode_bit(&mut probs[idx as usize], bit)?;
        idx = (idx << 1) | bit;
    }
    Ok(())
}

pub fn decode_tree<R: Read>(
    rc: &mut RangeDecoder<R>,
    probs: &mut [u16],
    num_bits: u32,
) -> Result<u32> {
    let mut idx = 1u32;
    for _ in 0..num_bits {
        let bit = rc.decode_bit(&mut probs[idx as usize])?;
        idx = (idx << 1) | bit;
    }
    Ok(idx - (1 << num_bits))
}

pub fn encode_tree_reverse<W: Write>(
    rc: &mut RangeEncoder<W>,
    probs: &mut [u16],
    num_bits: u32,
    symbol: u32,
) -> Result<()> {
    let mut idx = 1u32;
    let mut sym = symbol;
    for _ in 0..num_bits {
        let bit = sym & 1;
        sym >>= 1;
        rc.encode_bit(&mut probs[idx as usize], bit)?;
        idx = (idx << 1) | bit;
    }
    Ok(())
}

pub fn decode_tree_reverse<R: Read>(
    rc: &mut RangeDecoder<R>,
    probs: &mut [u16],
    num_bits: u32,
) -> Result<u32> {
    let mut idx = 1u32;
    let mut result = 0u32;
    for i in 0..num_bits {
        let bit = rc.decode_bit(&mut probs[idx as usize])?;
        idx = (idx << 1) | bit;
        result |= bit << i;
    }
    Ok(result)
}

/// Same as [`encode_tree_reverse`] but indexing into an arbitrary offset of
/// a shared probability slice (used for the distance "spec_pos" probs,
/// which are indexed by `distance - slot` rather than from zero).
pub fn encode_tree_reverse_at<W: Write>(
    rc: &mut RangeEncoder<W>,
    probs: &mut [u16],
    offset: usize,
    num_bits: u32,
    symbol: u32,
) -> Result<()> {
    let mut idx = 1u32;
    let mut sym = symbol;
    for _ in 0..num_bits {
        let bit = sym & 1;
        sym >>= 1;
        rc.encode_bit(&mut probs[offset + idx as usize - 1], bit)?;
        idx = (idx << 1) | bit;
    }
    Ok(())
}

pub fn decode_tree_reverse_at<R: Read>(
    rc: &mut RangeDecoder<R>,
    probs: &mut [u16],
    offset: usize,
    num_bits: u32,
) -> Result<u32> {
    let mut idx = 1u32;
    let mut result = 0u32;
    for i in 0..num_bits {
        let bit = rc.decode_bit(&mut probs[offset + idx as usize - 1])?;
        idx = (idx << 1) | bit;
        result |= bit << i;
    }
    Ok(result)
}
