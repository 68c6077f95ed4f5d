//! A hash-chain match finder.
//!
//! Covers levels 1-4 of the preset ladder directly; higher presets reuse the
//! same structure with a larger `depth_limit`/`nice_len` rather than
//! switching to a binary-tree (BT4) finder, trading a little ratio at the
//! top presets for a single, simpler implementation.

use super::hash234::Hash234;

pub struct Match {
    pub distance: u32,
    pub len: u32,
}

pub struct MatchFinder {
    hash: Hash234,
    chain: Vec<i32>,
    chain_mask: usize,
    depth_limit: u32,
    nice_len: u32,
    dict_size: u32,
}

impl MatchFinder {
    pub fn new(dict_size: u32, nice_len: u32, depth_limit: u32) -> Self {
        let chain_size = (dict_size.max(1 << 12)).next_power_of_two() as usize;
        Self {
            hash: Hash234::new(dict_size),
            chain: vec![-1; chain_size],
            chain_mask: chain_size - 1,
            depth_limit: depth_limit.max(1),
            nice_len: nice_len.clamp(4, 273),
            dict_size,
        }
    }

    /// Registers the 4 bytes at `pos` in the hash tables without searching;
    /// used to keep the tables in sync while skipping positions covered by
    /// a match that was already emitted.
    pub fn insert(&mut self, buf: &[u8], pos: usize) {
        if buf.len() - pos < 4 {
            return;
        }
        self.hash.calc_hashes(&buf[pos..]);
        let prev = self.hash.hash4_pos();
        self.chain[pos & self.chain_mask] = prev;
        self.hash.update(pos as i32);
    }

    /// Finds the best match ending at `pos`, also inserting `pos` into the
    /// tables as a side effect (mirrors how real LZ match finders couple
    /// lookup and insertion into one pass over the window).
    pub fn find(&mut self, buf: &[u8], pos: usize) -> Option<Match> {
        let avail = buf.len() - pos;
        if avail < 2 {
            return None;
        }
        let max_len = avail.min(273);

        if avail < 4 {
            return None;
        }

        self.hash.calc_hashes(&buf[pos..]);
        let h2 = self.hash.hash2_pos();
        let h3 = self.hash.hash3_pos();
        let h4_head = self.hash.hash4_pos();
        self.chain[pos & self.chain_mask] = h4_head;
        self.hash.update(pos as i32);

        let mut best: Option<Match> = None;
        let mut candidate = h4_head;
        let mut depth = self.depth_limit;
        while candidate >= 0 && depth > 0 {
            depth -= 1;
            let cpos = candidate as usize;
            let dist = (pos - cpos) as u64;
            if dist == 0 || dist > self.dict_size as u64 {
                break;
            }
            let len = match_len(buf, cpos, pos, max_len);
            if len >= 4 && is_better(&best, dist as u32, len) {
                best = Some(Match {
                    distance: dist as u32,
                    len: len as u32,
                });
                if len >= self.nice_len as usize {
                    break;
                }
            }
            candidate = self.chain[cpos & self.chain_mask];
        }

        if best.is_none() && h3 >= 0 {
            let dist = (pos - h3 as usize) as u64;
            if dist > 0 && dist <= self.dict_size as u64 {
                let len = match_len(buf, h3 as usize, pos, max_len);
                if len >= 3 {
                    best = Some(Match {
                        distance: dist as u32,
                        len: len as u32,
                    });
                }
            }
        }
        if best.is_none() && h2 >= 0 {
            let dist = (pos - h2 as usize) as u64;
            if dist > 0 && dist <= self.dict_size as u64 {
                let len = match_len(buf, h2 as usize, pos, max_len);
                if len >= 2 {
                    best = Some(Match {
                        distance: dist as u32,
                        len: len as u32,
                    });
                }
            }
        }
        best
    }
}

fn match_len(buf: &[u8], a: usize, b: usize, max_len: usize) -> usize {
    let mut n = 0;
    while n < max_len && buf[a + n] == buf[b + n] {
        n += 1;
    }
    n
}

fn is_better(current: &Option<Match>, dist: u32, len: usize) -> bool {
    match current {
        None => true,
        Some(m) => (len as u32) > m.len || ((len as u32) == m.len && dist < m.distance),
    }
}
