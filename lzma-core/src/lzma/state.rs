//! LZMA's 12-state packet machine and the probability tables it indexes.

use rc_core::PROB_INIT;

pub const NUM_STATES: usize = 12;
pub const POS_STATES_MAX: usize = 1 << 4;
pub const NUM_LEN_TO_POS_STATES: usize = 4;
pub const NUM_FULL_DISTANCES: usize = 1 << (END_POS_MODEL_INDEX / 2);
pub const END_POS_MODEL_INDEX: u32 = 14;
pub const NUM_ALIGN_BITS: u32 = 4;
pub const MATCH_MIN_LEN: u32 = 2;
pub const MATCH_MAX_LEN: u32 = 273;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LzmaProps {
    pub lc: u32,
    pub lp: u32,
    pub pb: u32,
    pub dict_size: u32,
}

impl LzmaProps {
    pub fn new(lc: u32, lp: u32, pb: u32, dict_size: u32) -> rc_core::Result<Self> {
        if lc > 8 || lp > 4 || pb > 4 || lc + lp > 4 {
            return Err(rc_core::Error::invalid_argument("lc/lp/pb out of range"));
        }
        if dict_size < (1 << 12) {
            return Err(rc_core::Error::invalid_argument("dict_size below 4 KiB minimum"));
        }
        Ok(Self { lc, lp, pb, dict_size })
    }

    /// Encodes the single LZMA properties byte `(pb*5+lp)*9+lc`.
    pub fn prop_byte(&self) -> u8 {
        (((self.pb * 5 + self.lp) * 9 + self.lc) & 0xFF) as u8
    }

    pub fn from_prop_byte(byte: u8) -> rc_core::Result<(u32, u32, u32)> {
        let mut d = byte as u32;
        if d >= 9 * 5 * 5 {
            return Err(rc_core::Error::corrupt("invalid LZMA properties byte"));
        }
        let lc = d % 9;
        d /= 9;
        let lp = d % 5;
        let pb = d / 5;
        if pb > 4 {
            return Err(rc_core::Error::corrupt("invalid LZMA properties byte"));
        }
        Ok((lc, lp, pb))
    }

    /// The standard 5-byte LZMA properties header: 1 properties byte plus a
    /// 4-byte little-endian dictionary size.
    pub fn encode_header(&self) -> [u8; 5] {
        let mut out = [0u8; 5];
        out[0] = self.prop_byte();
        out[1..5].copy_from_slice(&self.dict_size.to_le_bytes());
        out
    }

    pub fn decode_header(bytes: &[u8]) -> rc_core::Result<Self> {
        if bytes.len() < 5 {
            return Err(rc_core::Error::corrupt("truncated LZMA properties header"));
        }
        let (lc, lp, pb) = Self::from_prop_byte(bytes[0])?;
        let dict_size = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        Self::new(lc, lp, pb, dict_size.max(1 << 12))
    }

    /// Preset dictionary sizes and nice-length/depth ramps, mirroring the
    /// usual 0-9 compression level ladder. `lc=3, lp=0, pb=2` at every
    /// level are the values that work well for generic byte streams.
    pub fn with_preset(level: u32) -> (Self, u32, u32) {
        let level = level.min(9);
        let dict_size: u32 = match level {
            0 => 256 << 10,
            1 => 1 << 20,
            2 => 2 << 20,
            3 => 4 << 20,
            4 => 4 << 20,
            5 => 8 << 20,
            6 => 8 << 20,
            7 => 16 << 20,
            8 => 32 << 20,
            _ => 64 << 20,
        };
        let nice_len = (32 + level * 24).min(273);
        let depth = 16 + level * 16;
        (
            Self {
                lc: 3,
                lp: 0,
                pb: 2,
                dict_size,
            },
            nice_len,
            depth,
        )
    }
}

#[inline]
pub fn state_after_literal(state: u8) -> u8 {
    if state < 4 {
        0
    } else if state < 10 {
        state - 3
    } else {
        state - 6
    }
}

#[inline]
pub fn state_after_match(state: u8) -> u8 {
    if state < 7 {
        7
    } else {
        10
    }
}

#[inline]
pub fn state_after_rep(state: u8) -> u8 {
    if state < 7 {
        8
    } else {
        11
    }
}

#[inline]
pub fn state_after_short_rep(state: u8) -> u8 {
    if state < 7 {
        9
    } else {
        11
    }
}

#[inline]
pub fn is_literal_state(state: u8) -> bool {
    state < 7
}

#[inline]
pub fn len_to_pos_state(len: u32) -> usize {
    ((len - MATCH_MIN_LEN) as usize).min(NUM_LEN_TO_POS_STATES - 1)
}

#[derive(Clone)]
pub struct LengthCoderProbs {
    pub choice: u16,
    pub choice2: u16,
    pub low: [[u16; 8]; POS_STATES_MAX],
    pub mid: [[u16; 8]; POS_STATES_MAX],
    pub high: [u16; 256],
}

impl LengthCoderProbs {
    fn new() -> Self {
        Self {
            choice: PROB_INIT,
            choice2: PROB_INIT,
            low: [[PROB_INIT; 8]; POS_STATES_MAX],
            mid: [[PROB_INIT; 8]; POS_STATES_MAX],
            high: [PROB_INIT; 256],
        }
    }
}

/// The full adaptive probability state for one LZMA stream. Reset on every
/// properties change and on every LZMA2 "state reset" chunk.
#[derive(Clone)]
pub struct Probs {
    pub is_match: [[u16; POS_STATES_MAX]; NUM_STATES],
    pub is_rep: [u16; NUM_STATES],
    pub is_rep_g0: [u16; NUM_STATES],
    pub is_rep_g1: [u16; NUM_STATES],
    pub is_rep_g2: [u16; NUM_STATES],
    pub is_rep0_long: [[u16; POS_STATES_MAX]; NUM_STATES],
    pub pos_slot: [[u16; 64]; NUM_LEN_TO_POS_STATES],
    pub spec_pos: [u16; NUM_FULL_DISTANCES - END_POS_MODEL_INDEX as usize],
    pub align: [u16; 1 << NUM_ALIGN_BITS],
    pub len_coder: LengthCoderProbs,
    pub rep_len_coder: LengthCoderProbs,
    pub literal: Vec<u16>,
    pub lc: u32,
    pub lp: u32,
}

impl Probs {
    pub fn new(lc: u32, lp: u32) -> Self {
        let literal_len = 0x300usize << (lc + lp);
        Self {
            is_match: [[PROB_INIT; POS_STATES_MAX]; NUM_STATES],
            is_rep: [PROB_INIT; NUM_STATES],
            is_rep_g0: [PROB_INIT; NUM_STATES],
            is_rep_g1: [PROB_INIT; NUM_STATES],
            is_rep_g2: [PROB_INIT; NUM_STATES],
            is_rep0_long: [[PROB_INIT; POS_STATES_MAX]; NUM_STATES],
            pos_slot: [[PROB_INIT; 64]; NUM_LEN_TO_POS_STATES],
            spec_pos: [PROB_INIT; NUM_FULL_DISTANCES - END_POS_MODEL_INDEX as usize],
            align: [PROB_INIT; 1 << NUM_ALIGN_BITS],
            len_coder: LengthCoderProbs::new(),
            rep_len_coder: LengthCoderProbs::new(),
            literal: vec![PROB_INIT; literal_len],
            lc,
            lp,
        }
    }

    #[inline]
    pub fn literal_state(&self, pos: u64, prev_byte: u8) -> usize {
        let lp_mask = (1u64 << self.lp) - 1;
        let low = ((pos & lp_mask) as usize) << self.lc;
        low | (prev_byte as usize >> (8 - self.lc))
    }

    #[inline]
    pub fn literal_probs(&mut self, state: usize) -> &mut [u16] {
        &mut self.literal[state * 0x300..(state + 1) * 0x300]
    }
}
