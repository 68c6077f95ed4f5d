//! Property-based tests over the PPMd7 codec: round-trip and determinism
//! hold for arbitrary byte strings and model orders, not just hand-picked
//! ones.

use ppmd_core::{compress, decompress, Ppmd7Params};
use proptest::prelude::*;

fn small_bytes() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..2048)
}

proptest! {
    /// PPMd7 round-trips arbitrary input across the model's supported
    /// order range.
    #[test]
    fn ppmd7_roundtrip(data in small_bytes(), order in 2u32..=16) {
        let params = Ppmd7Params::new(order, 1 << 20).unwrap();
        let packed = compress(&data, params).unwrap();
        let unpacked = decompress(&packed, data.len(), params).unwrap();
        prop_assert_eq!(unpacked, data);
    }

    /// Encoding the same input with the same parameters twice produces
    /// identical bytes.
    #[test]
    fn ppmd7_encode_is_deterministic(data in small_bytes()) {
        let params = Ppmd7Params::default();
        let first = compress(&data, params).unwrap();
        let second = compress(&data, params).unwrap();
        prop_assert_eq!(first, second);
    }
}
