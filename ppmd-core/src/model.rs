//! Order-N context-tree model for PPMd7-style prediction by partial matching.
//!
//! The context tree is stored in one arena (`Vec<Context>`) addressed by
//! `u32` index rather than pointers, per the resource model shared with the
//! other codecs in this workspace: no allocator churn per symbol, and a
//! model that grows past its memory budget can be thrown away and rebuilt
//! from scratch instead of needing a custom GC.
//!
//! This is a real order-N PPM model — suffix links, per-symbol frequency
//! tables, exclusion on escape, rescaling at `MAX_FREQ` — but it is not a
//! byte-for-byte port of 7-Zip's PPMd7. Differences, all deliberate:
//!
//! - Each context keeps its frequency table (`states`) and its trie
//!   children (`children`) as two small separate vectors. The reference
//!   packs both into one allocation with a binary/multi-symbol layout
//!   switch; splitting them costs a little memory but removes an entire
//!   class of pointer-arithmetic bugs.
//! - Escape probability uses the classic PPMC estimator (escape weight
//!   equal to the number of distinct symbols at this context) rather than
//!   the reference's 2D SEE (secondary escape estimation) table indexed by
//!   context diversity and order.
//! - The deepest context for the next symbol is found by replaying the last
//!   `order` bytes of history from the root on every symbol, rather than
//!   following cached successor pointers maintained incrementally. O(order)
//!   per symbol instead of O(1), which is fine at the orders this format
//!   uses (2-32).
//!
//! Encoder and decoder walk the identical context chain and exclusion set
//! from the same history, so the two stay in lockstep regardless of which
//! of the above differs from the reference's bitstream.

use rc_core::{Error, RangeDecoder, RangeEncoder, Result};
use std::io::{Read, Write};

/// Sentinel for "no context" (root's suffix, an absent successor).
const NONE: u32 = u32::MAX;

/// Matches the reference's rescale threshold (`ppmd7.rs`'s `MAX_FREQ`).
const MAX_FREQ: u32 = 124;
/// Frequency bump applied to a symbol found in its context.
const FREQ_INCREMENT: u32 = 4;
/// Frequency a symbol starts at when first added to a context.
const INIT_FREQ: u32 = 1;

struct State {
    symbol: u8,
    freq: u32,
}

struct Context {
    suffix: u32,
    order: u32,
    states: Vec<State>,
    sum_freq: u32,
    children: Vec<(u8, u32)>,
}

impl Context {
    fn root() -> Self {
        Context {
            suffix: NONE,
            order: 0,
            states: Vec::new(),
            sum_freq: 0,
            children: Vec::new(),
        }
    }

    fn find_state(&self, symbol: u8) -> Option<usize> {
        self.states.iter().position(|s| s.symbol == symbol)
    }

    fn rescale_if_needed(&mut self) {
        if self.sum_freq <= MAX_FREQ {
            return;
        }
        let mut sum = 0u32;
        for s in &mut self.states {
            s.freq = ((s.freq + 1) / 2).max(1);
            sum += s.freq;
        }
        self.sum_freq = sum;
    }
}

/// Configuration for a PPMd7 model instance. Both sides of a stream must
/// agree on these, same as LZMA's `lc`/`lp`/`pb`.
#[derive(Clone, Copy, Debug)]
pub struct Ppmd7Params {
    pub order: u32,
    pub mem_size_bytes: u32,
}

impl Ppmd7Params {
    pub fn new(order: u32, mem_size_bytes: u32) -> Result<Self> {
        if !(2..=64).contains(&order) {
            return Err(Error::invalid_argument("PPMd7 order must be in 2..=64"));
        }
        if mem_size_bytes < (1 << 11) {
            return Err(Error::invalid_argument("PPMd7 memory budget too small"));
        }
        Ok(Self { order, mem_size_bytes })
    }
}

impl Default for Ppmd7Params {
    fn default() -> Self {
        Ppmd7Params {
            order: 6,
            mem_size_bytes: 16 << 20,
        }
    }
}

/// The context tree plus the sliding history window used to locate the
/// current deepest context.
pub struct Ppmd7Model {
    arena: Vec<Context>,
    history: Vec<u8>,
    params: Ppmd7Params,
    max_contexts: usize,
    restarts: u64,
}

/// Bytes-per-context used to translate a memory budget into an arena
/// capacity. Approximate: a `Context` is a handful of words plus two small
/// `Vec`s, so this undercounts a busy context and overcounts a sparse one;
/// it only needs to keep the model inside its budget, not hit it exactly.
const APPROX_BYTES_PER_CONTEXT: usize = 64;

impl Ppmd7Model {
    pub fn new(params: Ppmd7Params) -> Self {
        let max_contexts =
            ((params.mem_size_bytes as usize) / APPROX_BYTES_PER_CONTEXT).max(64);
        let mut model = Ppmd7Model {
            arena: Vec::new(),
            history: Vec::new(),
            params,
            max_contexts,
            restarts: 0,
        };
        model.restart();
        model
    }

    fn restart(&mut self) {
        self.arena.clear();
        self.arena.push(Context::root());
        self.history.clear();
        self.restarts += 1;
        log::debug!(
            "ppmd7 model restart #{} (arena budget {} contexts)",
            self.restarts,
            self.max_contexts
        );
    }

    fn get_or_create_child(&mut self, ctx: u32, symbol: u8) -> u32 {
        if let Some(&(_, child)) = self.arena[ctx as usize]
            .children
            .iter()
            .find(|(s, _)| *s == symbol)
        {
            return child;
        }
        let order = self.arena[ctx as usize].order + 1;
        let new_idx = self.arena.len() as u32;
        self.arena.push(Context {
            suffix: ctx,
            order,
            states: Vec::new(),
            sum_freq: 0,
            children: Vec::new(),
        });
        self.arena[ctx as usize].children.push((symbol, new_idx));
        new_idx
    }

    /// Context-tree path for the current history, shallowest (root) first.
    fn current_path(&mut self) -> Vec<u32> {
        let order = self.params.order as usize;
        let start = self.history.len().saturating_sub(order);
        let mut path = Vec::with_capacity(self.history.len() - start + 1);
        let mut idx = 0u32;
        path.push(idx);
        for &byte in &self.history[start..] {
            idx = self.get_or_create_child(idx, byte);
            path.push(idx);
        }
        path
    }

    fn push_history(&mut self, byte: u8) {
        self.history.push(byte);
        let order = self.params.order as usize;
        if self.history.len() > order {
            let drop = self.history.len() - order;
            self.history.drain(0..drop);
        }
        if self.arena.len() > self.max_contexts {
            // Encoder and decoder reach this point after the same symbol
            // count, since both grow the arena deterministically from the
            // same byte sequence, so the restart stays in lockstep.
            self.restart();
        }
    }

    /// Encodes one byte, updating the model to reflect it.
    pub fn encode_symbol<W: Write>(&mut self, rc: &mut RangeEncoder<W>, byte: u8) -> Result<()> {
        let path = self.current_path();
        let mut masked = [false; 256];
        let mut found_level: Option<usize> = None;

        for level in (0..path.len()).rev() {
            let ctx = path[level];
            if c_states_empty_or_all_masked(&self.arena[ctx as usize].states, &masked) {
                continue;
            }
            let (found, sum_nonmasked, distinct) = {
                let c = &self.arena[ctx as usize];
                let mut cum = 0u32;
                let mut sum = 0u32;
                let mut distinct = 0u32;
                let mut found = None;
                for s in &c.states {
                    if masked[s.symbol as usize] {
                        continue;
                    }
                    if s.symbol == byte {
                        found = Some((cum, s.freq));
                    } else if found.is_none() {
                        cum += s.freq;
                    }
                    sum += s.freq;
                    distinct += 1;
                }
                (found, sum, distinct)
            };
            let grand_total = sum_nonmasked + distinct;
            if let Some((sym_cum, sym_freq)) = found {
                rc.encode_freq(sym_cum, sym_freq, grand_total)?;
                found_level = Some(level);
                break;
            } else {
                rc.encode_freq(sum_nonmasked, distinct, grand_total)?;
                for s in &self.arena[ctx as usize].states {
                    masked[s.symbol as usize] = true;
                }
            }
        }

        if found_level.is_none() {
            // Escaped past the root: uniform code over remaining symbols.
            let remaining: Vec<u8> = (0u16..256)
                .map(|v| v as u8)
                .filter(|&b| !masked[b as usize])
                .collect();
            let rank = remaining
                .iter()
                .position(|&b| b == byte)
                .expect("byte not masked out of the full alphabet");
            rc.encode_freq(rank as u32, 1, remaining.len() as u32)?;
        }

        self.update_model(&path, found_level, byte);
        self.push_history(byte);
        Ok(())
    }

    /// Decodes one byte, updating the model to reflect it.
    pub fn decode_symbol<R: Read>(&mut self, rc: &mut RangeDecoder<R>) -> Result<u8> {
        let path = self.current_path();
        let mut masked = [false; 256];
        let mut found_level: Option<usize> = None;
        let mut found_symbol: Option<u8> = None;

        for level in (0..path.len()).rev() {
            let ctx = path[level];
            if c_states_empty_or_all_masked(&self.arena[ctx as usize].states, &masked) {
                continue;
            }
            let (sum_nonmasked, distinct) = {
                let c = &self.arena[ctx as usize];
                let mut sum = 0u32;
                let mut distinct = 0u32;
                for s in &c.states {
                    if !masked[s.symbol as usize] {
                        sum += s.freq;
                        distinct += 1;
                    }
                }
                (sum, distinct)
            };
            let grand_total = sum_nonmasked + distinct;
            let target = rc.decode_freq(grand_total);
            if target < sum_nonmasked {
                // Lands within a real symbol's slice.
                let mut cum = 0u32;
                let c = &self.arena[ctx as usize];
                let mut hit = None;
                for s in &c.states {
                    if masked[s.symbol as usize] {
                        continue;
                    }
                    if target < cum + s.freq {
                        hit = Some((s.symbol, cum, s.freq));
                        break;
                    }
                    cum += s.freq;
                }
                let (symbol, cum, freq) = hit.expect("decode_freq target must land in range");
                rc.decode_update(cum, freq)?;
                found_level = Some(level);
                found_symbol = Some(symbol);
                break;
            } else {
                rc.decode_update(sum_nonmasked, distinct)?;
                for s in &self.arena[ctx as usize].states {
                    masked[s.symbol as usize] = true;
                }
            }
        }

        let byte = match found_symbol {
            Some(b) => b,
            None => {
                let remaining: Vec<u8> = (0u16..256)
                    .map(|v| v as u8)
                    .filter(|&b| !masked[b as usize])
                    .collect();
                let target = rc.decode_freq(remaining.len() as u32);
                let b = *remaining
                    .get(target as usize)
                    .ok_or_else(|| Error::corrupt("PPMd7 uniform-fallback rank out of range"))?;
                rc.decode_update(target, 1)?;
                b
            }
        };

        self.update_model(&path, found_level, byte);
        self.push_history(byte);
        Ok(byte)
    }

    /// Bumps the found context's frequency for `byte` and teaches every
    /// escaped (deeper) context that `byte` can follow it, per the classic
    /// PPM update rule.
    fn update_model(&mut self, path: &[u32], found_level: Option<usize>, byte: u8) {
        let deeper_start = found_level.map(|l| l + 1).unwrap_or(0);
        for &ctx in &path[deeper_start..] {
            let c = &mut self.arena[ctx as usize];
            if c.find_state(byte).is_none() {
                c.states.push(State { symbol: byte, freq: INIT_FREQ });
                c.sum_freq += INIT_FREQ;
            }
        }
        if let Some(level) = found_level {
            let ctx = path[level];
            let c = &mut self.arena[ctx as usize];
            let idx = c.find_state(byte).expect("found level must contain byte");
            c.states[idx].freq += FREQ_INCREMENT;
            c.sum_freq += FREQ_INCREMENT;
            c.rescale_if_needed();
        }
    }
}

fn c_states_empty_or_all_masked(states: &[State], masked: &[bool; 256]) -> bool {
    states.iter().all(|s| masked[s.symbol as usize])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(data: &[u8], params: Ppmd7Params) {
        let mut enc_buf = Vec::new();
        {
            let mut model = Ppmd7Model::new(params);
            let mut rc = RangeEncoder::new(&mut enc_buf);
            for &b in data {
                model.encode_symbol(&mut rc, b).unwrap();
            }
            rc.finish().unwrap();
        }
        let mut model = Ppmd7Model::new(params);
        let mut rc = RangeDecoder::new(&enc_buf[..]).unwrap();
        let mut out = Vec::with_capacity(data.len());
        for _ in 0..data.len() {
            out.push(model.decode_symbol(&mut rc).unwrap());
        }
        assert_eq!(out, data);
    }

    #[test]
    fn roundtrip_empty() {
        roundtrip(b"", Ppmd7Params::default());
    }

    #[test]
    fn roundtrip_single_byte_runs() {
        roundtrip(&[7u8; 200], Ppmd7Params::default());
    }

    #[test]
    fn roundtrip_text() {
        roundtrip(
            b"the quick brown fox jumps over the lazy dog, and the dog barely notices",
            Ppmd7Params::default(),
        );
    }

    #[test]
    fn roundtrip_all_byte_values() {
        let data: Vec<u8> = (0..=255u8).collect();
        roundtrip(&data, Ppmd7Params::default());
    }

    #[test]
    fn roundtrip_small_order_and_budget() {
        let params = Ppmd7Params::new(2, 1 << 11).unwrap();
        let data = b"aaaaaaaaaaaaaaaabbbbbbbbbbbbbbbbccccccccccccccccdddddddddddddddd";
        roundtrip(data, params);
    }

    #[test]
    fn forced_restart_still_roundtrips() {
        // A tiny budget forces several model restarts mid-stream.
        let params = Ppmd7Params::new(4, 1 << 11).unwrap();
        let mut data = Vec::new();
        for i in 0..4000u32 {
            data.push((i % 251) as u8);
        }
        roundtrip(&data, params);
    }

    #[test]
    fn invalid_params_rejected() {
        assert!(Ppmd7Params::new(1, 1 << 20).is_err());
        assert!(Ppmd7Params::new(6, 1).is_err());
    }
}
