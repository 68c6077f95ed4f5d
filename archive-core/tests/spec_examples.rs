//! Concrete worked examples from the container formats this crate frames:
//! an XZ stream's exact magic/footer bytes, a rejected malformed stream, a
//! zero-filled million-byte payload, and a fixed AES-256/KDF parameter set.

use archive_core::crypto::{decrypt, encrypt, kdf_7z_iterated_sha256};
use archive_core::xz::{decode_blocks, encode_stream, verify_block_check, FilterFlags};
use rc_core::checksum::CheckType;
use rc_core::Error;

fn lzma2_filters() -> [FilterFlags; 1] {
    [FilterFlags {
        id: archive_core::xz::filter_id::LZMA2,
        props: vec![0x18],
    }]
}

#[test]
fn xz_hello_world_stream_framing() {
    let data = b"Hello, World!";
    let stream = encode_stream(data, CheckType::Crc32, &lzma2_filters(), |d| {
        lzma_core::compress(d, 6)
    })
    .unwrap();

    assert_eq!(&stream[..6], &[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00]);
    assert_eq!(&stream[stream.len() - 2..], &[0x59, 0x5A]);

    let (check, blocks) = decode_blocks(&stream).unwrap();
    assert_eq!(blocks.len(), 1);
    let decoded = lzma_core::decompress(&blocks[0].payload, 1 << 20).unwrap();
    assert_eq!(&decoded, data);
    verify_block_check(check, &decoded, &blocks[0].check).unwrap();
}

#[test]
fn xz_one_million_zero_bytes() {
    let data = vec![0u8; 1_000_000];
    let stream = encode_stream(&data, CheckType::Crc32, &lzma2_filters(), |d| {
        lzma_core::compress(d, 6)
    })
    .unwrap();

    let (_check, blocks) = decode_blocks(&stream).unwrap();
    let decoded = lzma_core::decompress(&blocks[0].payload, 1 << 21).unwrap();
    assert_eq!(decoded.len(), 1_000_000);
    assert!(decoded.iter().all(|&b| b == 0));
}

#[test]
fn xz_bad_magic_is_rejected() {
    let mut stream = encode_stream(b"irrelevant", CheckType::Crc32, &lzma2_filters(), |d| {
        lzma_core::compress(d, 6)
    })
    .unwrap();
    stream[5] = 0x01; // corrupt the magic's last byte: 00 -> 01

    let err = decode_blocks(&stream).unwrap_err();
    assert!(matches!(err, Error::Corrupt(_)));
}

#[test]
fn aes_kdf_fixed_vector_roundtrips() {
    let salt = [0u8; 16];
    let iv = [0u8; 16];
    let key = kdf_7z_iterated_sha256(&salt, b"test", 19).unwrap();

    let ciphertext = encrypt(&key, &iv, b"secret");
    let plaintext = decrypt(&key, &iv, &ciphertext).unwrap();
    assert_eq!(plaintext, b"secret");
}
