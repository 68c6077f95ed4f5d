//! Concrete worked examples and cross-crate invariants for this crate's
//! codecs, run as integration tests against the public API only.

use lzma_core::filter::{BcjArch, BcjReader, BcjWriter};
use lzma_core::{compress, decompress};
use std::io::{Read, Write};

#[test]
fn bcj_x86_call_roundtrips_at_fixed_ip() {
    // `E8 00 00 00 00` is a CALL with a zero relative displacement.
    let original = [0xE8u8, 0x00, 0x00, 0x00, 0x00];

    let mut encoded = Vec::new();
    {
        let mut writer = BcjWriter::new(&mut encoded, BcjArch::X86, 0x1000, true);
        writer.write_all(&original).unwrap();
        writer.finish().unwrap();
    }

    let mut decoded = Vec::new();
    {
        let mut reader = BcjReader::new(&encoded[..], BcjArch::X86, 0x1000, false);
        reader.read_to_end(&mut decoded).unwrap();
    }

    assert_eq!(decoded, original);
}

#[test]
fn lzma2_chunk_boundary_concatenation() {
    // Two independently-encoded LZMA2 streams, each opening with a full
    // dict+state+props reset chunk, concatenated (minus each one's own
    // end-of-stream marker, plus one shared final marker) decode to the
    // concatenation of their inputs.
    let a = b"first chunk payload, repeated repeated repeated".repeat(20);
    let b = b"second chunk payload, different different different".repeat(20);

    let enc_a = compress(&a, 3).unwrap();
    let enc_b = compress(&b, 3).unwrap();

    let mut concatenated = enc_a[..enc_a.len() - 1].to_vec();
    concatenated.extend_from_slice(&enc_b[..enc_b.len() - 1]);
    concatenated.push(0x00);

    let decoded = decompress(&concatenated, 1 << 20).unwrap();
    let mut expected = a.clone();
    expected.extend_from_slice(&b);
    assert_eq!(decoded, expected);
}
