//! Length and distance coding: the length coder's 3/3/8-bit low/mid/high
//! split and the distance-slot coder's direct+aligned tail bits.

use std::io::{Read, Write};

use rc_core::{RangeDecoder, RangeEncoder, Result};

use super::bittree::{
    decode_tree, decode_tree_reverse, decode_tree_reverse_at, encode_tree, encode_tree_reverse,
    encode_tree_reverse_at,
};
use super::state::{LengthCoderProbs, MATCH_MIN_LEN, END_POS_MODEL_INDEX, NUM_ALIGN_BITS};

pub fn encode_length<W: Write>(
    rc: &mut RangeEncoder<W>,
    probs: &mut LengthCoderProbs,
    pos_state: usize,
    len: u32,
) -> Result<()> {
    let len0 = len - MATCH_MIN_LEN;
    if len0 < 8 {
        rc.encode_bit(&mut probs.choice, 0)?;
        encode_tree(rc, &mut probs.low[pos_state], 3, len0)?;
    } else {
        rc.encode_bit(&mut probs.choice, 1)?;
        if len0 < 16 {
            rc.encode_bit(&mut probs.choice2, 0)?;
            encode_tree(rc, &mut probs.mid[pos_state], 3, len0 - 8)?;
        } else {
            rc.encode_bit(&mut probs.choice2, 1)?;
            encode_tree(rc, &mut probs.high, 8, len0 - 16)?;
        }
    }
    Ok(())
}

pub fn decode_length<R: Read>(
    rc: &mut RangeDecoder<R>,
    probs: &mut LengthCoderProbs,
    pos_state: usize,
) -> Result<u32> {
    if rc.decode_bit(&mut probs.choice)? == 0 {
        Ok(decode_tree(rc, &mut probs.low[pos_state], 3)? + MATCH_MIN_LEN)
    } else if rc.decode_bit(&mut probs.choice2)? == 0 {
        Ok(decode_tree(rc, &mut probs.mid[pos_state], 3)? + 8 + MATCH_MIN_LEN)
    } else {
        Ok(decode_tree(rc, &mut probs.high, 8)? + 16 + MATCH_MIN_LEN)
    }
}

pub fn dist_slot(dist0: u32) -> u32 {
    if dist0 < 4 {
        return dist0;
    }
    let n = 31 - dist0.leading_zeros();
    (n << 1) | ((dist0 >> (n - 1)) & 1)
}

pub fn encode_distance<W: Write>(
    rc: &mut RangeEncoder<W>,
    pos_slot_probs: &mut [u16],
    spec_pos: &mut [u16],
    align: &mut [u16],
    dist0: u32,
) -> Result<()> {
    let slot = dist_slot(dist0);
    encode_tree(rc, pos_slot_probs, 6, slot)?;
    if slot >= 4 {
        let num_direct_bits = (slot >> 1) - 1;
        let base = (2 | (slot & 1)) << num_direct_bits;
        let rest = dist0 - base;
        if slot < END_POS_MODEL_INDEX {
            let offset = (base - slot - 1) as usize;
            encode_tree_reverse_at(rc, spec_pos, offset, num_direct_bits, rest)?;
        } else {
            rc.encode_direct_bits(rest >> NUM_ALIGN_BITS, num_direct_bits - NUM_ALIGN_BITS)?;
            encode_tree_reverse(rc, align, NUM_ALIGN_BITS, rest & ((1 << NUM_ALIGN_BITS) - 1))?;
        }
    }
    Ok(())
}

pub fn decode_distance<R: Read>(
    rc: &mut RangeDecoder<R>,
    pos_slot_probs: &mut [u16],
    spec_pos: &mut [u16],
    align: &mut [u16],
) -> Result<u32> {
    let slot = decode_tree(rc, pos_slot_probs, 6)?;
    if slot < 4 {
        return Ok(slot);
    }
    let num_direct_bits = (slot >> 1) - 1;
    let mut dist = (2 | (slot & 1)) << num_direct_bits;
    if slot < END_POS_MODEL_INDEX {
        let offset = (dist - slot - 1) as usize;
        dist += decode_tree_reverse_at(rc, spec_pos, offset, num_direct_bits)?;
    } else {
        dist += rc.decode_direct_bits(num_direct_bits - NUM_ALIGN_BITS)? << NUM_ALIGN_BITS;
        dist += decode_tree_reverse(rc, align, NUM_ALIGN_BITS)?;
    }
    Ok(dist)
}
