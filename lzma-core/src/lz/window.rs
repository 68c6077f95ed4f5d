//! The LZ77 dictionary window: an append-only ring buffer that both the
//! decoder and the match finder read matches out of.
//!
//! A dictionary reset moves `start` forward to the current write position,
//! which is the only state needed to forbid reads from before the reset
//! (the "dict reset forbids read-before-write" invariant).

use rc_core::{Error, Result};

pub struct Window {
    buf: Vec<u8>,
    cap: usize,
    pos: usize,
    total: u64,
    start: u64,
}

impl Window {
    pub fn new(dict_size: u32) -> Self {
        let cap = (dict_size as usize).max(1);
        Self {
            buf: vec![0u8; cap],
            cap,
            pos: 0,
            total: 0,
            start: 0,
        }
    }

    pub fn dict_size(&self) -> u32 {
        self.cap as u32
    }

    /// Forgets history before this point; distances may not reach past it.
    pub fn reset_dict(&mut self) {
        self.start = self.total;
    }

    #[inline]
    pub fn put(&mut self, byte: u8) {
        self.buf[self.pos] = byte;
        self.pos += 1;
        if self.pos == self.cap {
            self.pos = 0;
        }
        self.total += 1;
    }

    #[inline]
    pub fn byte_at_distance(&self, dist: u32) -> u8 {
        let d = dist as usize % self.cap;
        let d = if d == 0 { self.cap } else { d };
        let idx = (self.pos + self.cap - d) % self.cap;
        self.buf[idx]
    }

    /// `dist` is a 1-based back-reference distance (1 means the previous
    /// byte). Valid when at least `dist` bytes have been written since the
    /// last dictionary reset and `dist` does not exceed the window capacity.
    pub fn is_valid_distance(&self, dist: u32) -> bool {
        dist != 0
            && (dist as u64) <= (self.total - self.start)
            && (dist as u64) <= self.cap as u64
    }

    /// Copies a back-reference of `len` bytes at `dist` into both the
    /// window (so future matches can reach it) and `out`.
    pub fn copy_match(&mut self, dist: u32, len: u32, out: &mut Vec<u8>) -> Result<()> {
        if !self.is_valid_distance(dist) {
            return Err(Error::corrupt("match distance exceeds available dictionary"));
        }
        out.reserve(len as usize);
        for _ in 0..len {
            let b = self.byte_at_distance(dist);
            self.put(b);
            out.push(b);
        }
        Ok(())
    }

    pub fn put_literal(&mut self, byte: u8, out: &mut Vec<u8>) {
        self.put(byte);
        out.push(byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_then_match() {
        let mut w = Window::new(64);
        let mut out = Vec::new();
        for &b in b"abcabc" {
            w.put_literal(b, &mut out);
        }
        // copy "abc" from 3 bytes back
        w.copy_match(3, 3, &mut out).unwrap();
        assert_eq!(out, b"abcabcabc");
    }

    #[test]
    fn dict_reset_forbids_old_distance() {
        let mut w = Window::new(64);
        let mut out = Vec::new();
        w.put_literal(b'x', &mut out);
        w.reset_dict();
        assert!(!w.is_valid_distance(1));
    }
}
