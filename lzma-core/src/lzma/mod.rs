//! Raw LZMA: the probability-coded literal/match/rep packet stream that
//! both the standalone `.lzma` format and LZMA2 chunks carry.

mod bittree;
mod decoder;
mod encoder;
mod length_dist;
mod state;

pub use decoder::{LzmaState, END_MARKER_DIST};
pub use encoder::LzmaEncoderState;
pub use state::{LzmaProps, MATCH_MAX_LEN, MATCH_MIN_LEN};

#[cfg(test)]
mod tests {
    use super::*;
    use rc_core::{RangeDecoder, RangeEncoder};

    fn roundtrip(data: &[u8], props: LzmaProps, nice_len: u32, depth: u32) {
        let mut buf = Vec::new();
        {
            let mut rc = RangeEncoder::new(&mut buf);
            let mut enc = LzmaEncoderState::new(props, nice_len, depth);
            enc.encode_chunk_with_end_marker(&mut rc, data).unwrap();
            rc.finish().unwrap();
        }
        let mut rc = RangeDecoder::new(&buf[..]).unwrap();
        let mut dec = LzmaState::new(props);
        let mut out = Vec::new();
        // Decode in one shot up to data.len(); the end marker is consumed
        // as part of reaching that many bytes.
        dec.decode_chunk(&mut rc, data.len() as u64, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn roundtrip_empty() {
        let props = LzmaProps::new(3, 0, 2, 1 << 16).unwrap();
        roundtrip(b"", props, 32, 16);
    }

    #[test]
    fn roundtrip_literal_run() {
        let props = LzmaProps::new(3, 0, 2, 1 << 16).unwrap();
        roundtrip(b"hello, world! this text has no repeats to speak of.", props, 32, 16);
    }

    #[test]
    fn roundtrip_repetitive() {
        let props = LzmaProps::new(3, 0, 2, 1 << 16).unwrap();
        let data = "abcabcabcabcabcabcabcabcabcabcabcabcabcabc".repeat(20);
        roundtrip(data.as_bytes(), props, 64, 32);
    }

    #[test]
    fn roundtrip_mixed() {
        let props = LzmaProps::new(3, 0, 2, 1 << 20).unwrap();
        let mut data = Vec::new();
        for i in 0..2000u32 {
            if i % 7 == 0 {
                data.extend_from_slice(b"the quick brown fox jumps over the lazy dog");
            } else {
                data.push((i % 251) as u8);
            }
        }
        roundtrip(&data, props, 64, 32);
    }

    #[test]
    fn properties_header_roundtrip() {
        let (props, _, _) = LzmaProps::with_preset(6);
        let header = props.encode_header();
        let decoded = LzmaProps::decode_header(&header).unwrap();
        assert_eq!(props, decoded);
    }
}
