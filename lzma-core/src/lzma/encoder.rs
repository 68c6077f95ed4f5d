//! LZMA compression.
//!
//! Parsing is greedy with a one-symbol rep-match preference: at each
//! position the match finder's best hash-chain match is compared against
//! the four repeat distances, and a rep distance wins unless the fresh
//! match is strictly longer. This is simpler than the reference encoder's
//! price-based optimal parser and gives up a little ratio at high presets,
//! but every symbol it emits decodes back losslessly.

use std::io::Write;

use rc_core::{RangeEncoder, Result};

use super::decoder::END_MARKER_DIST;
use super::length_dist::{dist_slot, encode_distance, encode_length};
use super::state::{
    is_literal_state, len_to_pos_state, state_after_literal, state_after_match,
    state_after_rep, state_after_short_rep, LzmaProps, Probs, MATCH_MAX_LEN, MATCH_MIN_LEN,
};
use crate::lz::{MatchFinder, Window};

pub struct LzmaEncoderState {
    window: Window,
    probs: Probs,
    state: u8,
    reps: [u32; 4],
    pb: u32,
    total_pos: u64,
    finder: MatchFinder,
}

impl LzmaEncoderState {
    pub fn new(props: LzmaProps, nice_len: u32, depth: u32) -> Self {
        Self {
            window: Window::new(props.dict_size),
            probs: Probs::new(props.lc, props.lp),
            state: 0,
            reps: [0; 4],
            pb: props.pb,
            total_pos: 0,
            finder: MatchFinder::new(props.dict_size, nice_len, depth),
        }
    }

    pub fn reset_state(&mut self) {
        let (lc, lp) = (self.probs.lc, self.probs.lp);
        self.probs = Probs::new(lc, lp);
        self.state = 0;
        self.reps = [0; 4];
    }

    pub fn reset_props(&mut self, lc: u32, lp: u32, pb: u32) {
        self.probs = Probs::new(lc, lp);
        self.pb = pb;
        self.state = 0;
        self.reps = [0; 4];
    }

    pub fn reset_dict(&mut self) {
        self.window.reset_dict();
    }

    /// Feeds an LZMA2 uncompressed chunk's raw bytes through the window and
    /// match finder so later LZMA chunks can reference them.
    pub fn put_uncompressed(&mut self, data: &[u8]) {
        for &b in data {
            self.window.put(b);
        }
        self.total_pos += data.len() as u64;
        for i in 0..data.len() {
            self.finder.insert(data, i + 1);
        }
    }

    /// Encodes `input` as one LZMA chunk (no end marker), appending to the
    /// range encoder's output.
    pub fn encode_chunk<W: Write>(
        &mut self,
        rc: &mut RangeEncoder<W>,
        input: &[u8],
    ) -> Result<()> {
        self.encode_range(rc, input, 0, input.len(), false)
    }

    /// Encodes `input` followed by the LZMA end-of-stream marker; used for
    /// the standalone `.lzma` container where length is not externally
    /// framed.
    pub fn encode_chunk_with_end_marker<W: Write>(
        &mut self,
        rc: &mut RangeEncoder<W>,
        input: &[u8],
    ) -> Result<()> {
        self.encode_range(rc, input, 0, input.len(), true)
    }

    /// Encodes `full[start..end]` as one LZMA chunk. Unlike [`Self::encode_chunk`],
    /// `full` is expected to be the *entire* logical stream (e.g. an LZMA2
    /// encoder's whole input) so that match-finder and window state recorded
    /// during earlier chunks stays indexed consistently across this call.
    pub fn encode_range<W: Write>(
        &mut self,
        rc: &mut RangeEncoder<W>,
        full: &[u8],
        start: usize,
        end: usize,
        end_marker: bool,
    ) -> Result<()> {
        let input = full;
        let pb_mask = (1u32 << self.pb) - 1;
        let mut i = start;
        while i < end {
            let pos_state = (self.total_pos as u32) & pb_mask;

            let found = self.finder.find(&input[..end], i);
            let rep_len = self.best_rep_len(&input[..end], i);

            let use_rep = match (&found, rep_len) {
                (Some(m), Some((_, rlen))) => rlen + 1 >= m.len,
                (None, Some(_)) => true,
                _ => false,
            };

            if use_rep {
                let (rep_idx, len) = rep_len.unwrap();
                self.emit_rep(rc, pos_state, rep_idx, len, &input[..end], i)?;
                i += len as usize;
                continue;
            }

            if let Some(m) = found {
                if m.len >= MATCH_MIN_LEN {
                    self.emit_match(rc, pos_state, m.distance, m.len, &input[..end], i)?;
                    i += m.len as usize;
                    continue;
                }
            }

            self.emit_literal(rc, &input[..end], i)?;
            i += 1;
        }

        if end_marker {
            rc.encode_bit(
                &mut self.probs.is_match[self.state as usize][(self.total_pos as u32
                    & pb_mask) as usize],
                1,
            )?;
            rc.encode_bit(&mut self.probs.is_rep[self.state as usize], 0)?;
            self.reps[3] = self.reps[2];
            self.reps[2] = self.reps[1];
            self.reps[1] = self.reps[0];
            encode_length(
                rc,
                &mut self.probs.len_coder,
                (self.total_pos as u32 & pb_mask) as usize,
                MATCH_MIN_LEN,
            )?;
            let len_state = len_to_pos_state(MATCH_MIN_LEN);
            encode_distance(
                rc,
                &mut self.probs.pos_slot[len_state],
                &mut self.probs.spec_pos,
                &mut self.probs.align,
                END_MARKER_DIST,
            )?;
        }

        Ok(())
    }

    /// Finds the best candidate among the four repeat distances, returning
    /// `(rep_index, length)`.
    fn best_rep_len(&self, input: &[u8], pos: usize) -> Option<(usize, u32)> {
        let avail = input.len() - pos;
        if avail < 2 {
            return None;
        }
        let max_len = avail.min(MATCH_MAX_LEN as usize) as u32;
        let mut best: Option<(usize, u32)> = None;
        for (idx, &rep) in self.reps.iter().enumerate() {
            let dist = rep + 1;
            if !self.window.is_valid_distance(dist) {
                continue;
            }
            let mut len = 0u32;
            while len < max_len && input[pos + len as usize] == self.window_peek(dist, len, input, pos) {
                len += 1;
            }
            if len >= 2 && best.map(|(_, l)| len > l).unwrap_or(true) {
                best = Some((idx, len));
            }
        }
        best
    }

    /// Byte `len` positions past the start of a would-be match at `dist`,
    /// accounting for bytes already emitted earlier in this same call
    /// (overlapping self-referential matches).
    fn window_peek(&self, dist: u32, len: u32, input: &[u8], pos: usize) -> u8 {
        if (len as usize) < dist as usize {
            self.window.byte_at_distance(dist - len)
        } else {
            input[pos + len as usize - dist as usize]
        }
    }

    fn emit_literal<W: Write>(&mut self, rc: &mut RangeEncoder<W>, input: &[u8], pos: usize) -> Result<()> {
        let pb_mask = (1u32 << self.pb) - 1;
        let pos_state = (self.total_pos as u32) & pb_mask;
        rc.encode_bit(
            &mut self.probs.is_match[self.state as usize][pos_state as usize],
            0,
        )?;
        let byte = input[pos];
        let prev_byte = if self.total_pos > 0 {
            self.window.byte_at_distance(1)
        } else {
            0
        };
        let lit_state = self.probs.literal_state(self.total_pos, prev_byte);
        if is_literal_state(self.state) {
            let probs = self.probs.literal_probs(lit_state);
            let mut symbol = 1u32;
            for i in (0..8).rev() {
                let bit = (byte as u32 >> i) & 1;
                rc.encode_bit(&mut probs[symbol as usize], bit)?;
                symbol = (symbol << 1) | bit;
            }
        } else {
            let match_byte = self.window.byte_at_distance(self.reps[0] + 1);
            let probs = self.probs.literal_probs(lit_state);
            encode_matched_literal(rc, probs, match_byte, byte)?;
        }
        self.window.put(byte);
        self.state = state_after_literal(self.state);
        self.total_pos += 1;
        self.finder.insert(input, pos + 1);
        Ok(())
    }

    fn emit_match<W: Write>(
        &mut self,
        rc: &mut RangeEncoder<W>,
        pos_state: u32,
        distance: u32,
        len: u32,
        input: &[u8],
        pos: usize,
    ) -> Result<()> {
        rc.encode_bit(
            &mut self.probs.is_match[self.state as usize][pos_state as usize],
            1,
        )?;
        rc.encode_bit(&mut self.probs.is_rep[self.state as usize], 0)?;
        self.reps[3] = self.reps[2];
        self.reps[2] = self.reps[1];
        self.reps[1] = self.reps[0];
        self.reps[0] = distance - 1;
        encode_length(rc, &mut self.probs.len_coder, pos_state as usize, len)?;
        let len_state = len_to_pos_state(len);
        encode_distance(
            rc,
            &mut self.probs.pos_slot[len_state],
            &mut self.probs.spec_pos,
            &mut self.probs.align,
            distance - 1,
        )?;
        self.state = state_after_match(self.state);
        self.advance_window(input, pos, len);
        Ok(())
    }

    fn emit_rep<W: Write>(
        &mut self,
        rc: &mut RangeEncoder<W>,
        pos_state: u32,
        rep_idx: usize,
        len: u32,
        input: &[u8],
        pos: usize,
    ) -> Result<()> {
        rc.encode_bit(
            &mut self.probs.is_match[self.state as usize][pos_state as usize],
            1,
        )?;
        rc.encode_bit(&mut self.probs.is_rep[self.state as usize], 1)?;
        if rep_idx == 0 {
            rc.encode_bit(&mut self.probs.is_rep_g0[self.state as usize], 0)?;
            if len == 1 {
                rc.encode_bit(
                    &mut self.probs.is_rep0_long[self.state as usize][pos_state as usize],
                    0,
                )?;
                self.state = state_after_short_rep(self.state);
                self.advance_window(input, pos, 1);
                return Ok(());
            }
            rc.encode_bit(
                &mut self.probs.is_rep0_long[self.state as usize][pos_state as usize],
                1,
            )?;
        } else {
            rc.encode_bit(&mut self.probs.is_rep_g0[self.state as usize], 1)?;
            let dist = self.reps[rep_idx];
            if rep_idx == 1 {
                rc.encode_bit(&mut self.probs.is_rep_g1[self.state as usize], 0)?;
            } else {
                rc.encode_bit(&mut self.probs.is_rep_g1[self.state as usize], 1)?;
                if rep_idx == 2 {
                    rc.encode_bit(&mut self.probs.is_rep_g2[self.state as usize], 0)?;
                } else {
                    rc.encode_bit(&mut self.probs.is_rep_g2[self.state as usize], 1)?;
                    self.reps[3] = self.reps[2];
                }
                self.reps[2] = self.reps[1];
            }
            self.reps[1] = self.reps[0];
            self.reps[0] = dist;
        }
        encode_length(rc, &mut self.probs.rep_len_coder, pos_state as usize, len)?;
        self.state = state_after_rep(self.state);
        self.advance_window(input, pos, len);
        Ok(())
    }

    fn advance_window(&mut self, input: &[u8], pos: usize, len: u32) {
        for k in 0..len as usize {
            self.window.put(input[pos + k]);
        }
        self.total_pos += len as u64;
        for k in 0..len as usize {
            self.finder.insert(input, pos + k + 1);
        }
    }
}

fn encode_matched_literal<W: Write>(
    rc: &mut RangeEncoder<W>,
    probs: &mut [u16],
    mut match_byte: u8,
    byte: u8,
) -> Result<()> {
    let mut symbol = 1u32;
    let mut matched = true;
    for i in (0..8).rev() {
        let bit = (byte as u32 >> i) & 1;
        if matched {
            let match_bit = ((match_byte >> 7) & 1) as u32;
            match_byte <<= 1;
            let idx = ((1 + match_bit) << 8) + symbol;
            rc.encode_bit(&mut probs[idx as usize], bit)?;
            if bit != match_bit {
                matched = false;
            }
        } else {
            rc.encode_bit(&mut probs[symbol as usize], bit)?;
        }
        symbol = (symbol << 1) | bit;
    }
    Ok(())
}

// dist_slot is re-exported for callers that need to size spec_pos tables.
pub use super::length_dist::dist_slot as distance_slot;
