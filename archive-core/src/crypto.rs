//! AES-256-CBC encryption with the two key-derivation profiles used by the
//! archive formats this workspace targets: 7z's iterated-SHA256 scheme and
//! RAR5's PBKDF2-HMAC-SHA256. Grounded on the hand-rolled
//! `encryption/aes.rs`/`encryption/password.rs`, generalized to cover both
//! KDFs behind one `derive_key` seam instead of 7z's alone.

use aes::Aes256;
use cbc::cipher::{
    block_padding::Pkcs7, generic_array::GenericArray, BlockDecryptMut, BlockEncryptMut, KeyIvInit,
};
use hmac::Hmac;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use rc_core::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;
pub const BLOCK_LEN: usize = 16;

/// A derived AES-256 key, zeroized on drop since it is key material.
#[derive(Clone)]
pub struct AesKey([u8; KEY_LEN]);

impl Drop for AesKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl AesKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// 7z's key derivation: `SHA256` applied `2^cycles_power` times over
/// `salt || password || little-endian counter`, one byte of which advances
/// each round. `cycles_power == 0x3F` is the format's "no stretching"
/// escape hatch (salt followed directly by the raw password, zero-padded).
pub fn kdf_7z_iterated_sha256(salt: &[u8], password: &[u8], cycles_power: u8) -> Result<AesKey> {
    if cycles_power > 24 && cycles_power != 0x3F {
        return Err(Error::invalid_argument("7z KDF cycles_power out of range"));
    }
    if cycles_power == 0x3F {
        let mut key = [0u8; KEY_LEN];
        let n = salt.len().min(KEY_LEN);
        key[..n].copy_from_slice(&salt[..n]);
        let remaining = KEY_LEN - n;
        let take = password.len().min(remaining);
        key[n..n + take].copy_from_slice(&password[..take]);
        return Ok(AesKey(key));
    }
    let mut sha = Sha256::new();
    let mut counter = 0u64;
    for _ in 0..(1u64 << cycles_power) {
        sha.update(salt);
        sha.update(password);
        sha.update(counter.to_le_bytes());
        counter += 1;
    }
    Ok(AesKey(sha.finalize().into()))
}

/// Generates a cryptographically random IV. Callers encrypting a fresh
/// archive should draw one of these rather than reusing an IV under the
/// same key.
pub fn random_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    getrandom::fill(&mut iv).expect("OS RNG unavailable");
    iv
}

/// Generates a cryptographically random salt for either KDF below.
pub fn random_salt() -> [u8; 16] {
    let mut salt = [0u8; 16];
    getrandom::fill(&mut salt).expect("OS RNG unavailable");
    salt
}

/// RAR5's key derivation: PBKDF2-HMAC-SHA256 with `iterations = 2^log2count`.
/// The format restricts `log2count` to `[16, 20]` to bound worst-case
/// archive-opening latency.
pub fn kdf_rar5_pbkdf2(password: &[u8], salt: &[u8; 16], log2count: u8) -> Result<AesKey> {
    if !(16..=20).contains(&log2count) {
        return Err(Error::invalid_argument("RAR5 KDF log2count out of range"));
    }
    let iterations = 1u32 << log2count;
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, iterations, &mut key)
        .map_err(|_| Error::invalid_argument("RAR5 KDF output length invalid"))?;
    Ok(AesKey(key))
}

/// Encrypts `plaintext` with AES-256-CBC and PKCS#7 padding. The IV is the
/// caller's to store; this layer never invents a container format for it.
pub fn encrypt(key: &AesKey, iv: &[u8; IV_LEN], plaintext: &[u8]) -> Vec<u8> {
    let padded_len = (plaintext.len() / BLOCK_LEN + 1) * BLOCK_LEN;
    let mut buf = vec![0u8; padded_len];
    buf[..plaintext.len()].copy_from_slice(plaintext);
    let enc = Aes256CbcEnc::new(
        GenericArray::from_slice(key.as_bytes()),
        GenericArray::from_slice(iv),
    );
    let out = enc
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
        .expect("buffer sized for padding");
    out.to_vec()
}

/// Decrypts and un-pads an AES-256-CBC ciphertext. A malformed PKCS#7 tail
/// surfaces as [`Error::PasswordIncorrect`], the same as a wrong key, so a
/// caller cannot distinguish "bad password" from "corrupt ciphertext" and
/// use that as a padding oracle.
pub fn decrypt(key: &AesKey, iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(Error::PasswordIncorrect);
    }
    let mut buf = ciphertext.to_vec();
    let dec = Aes256CbcDec::new(
        GenericArray::from_slice(key.as_bytes()),
        GenericArray::from_slice(iv),
    );
    let out = dec
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| Error::PasswordIncorrect)?;
    Ok(out.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aes_roundtrip() {
        let key = kdf_7z_iterated_sha256(b"salt1234", b"hunter2", 4).unwrap();
        let iv = [7u8; IV_LEN];
        let plaintext = b"a message that is not a multiple of the block size";
        let ct = encrypt(&key, &iv, plaintext);
        assert_eq!(ct.len() % BLOCK_LEN, 0);
        let pt = decrypt(&key, &iv, &ct).unwrap();
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn aes_wrong_key_is_password_incorrect() {
        let key = kdf_7z_iterated_sha256(b"salt1234", b"hunter2", 4).unwrap();
        let wrong = kdf_7z_iterated_sha256(b"salt1234", b"wrong", 4).unwrap();
        let iv = [1u8; IV_LEN];
        let ct = encrypt(&key, &iv, b"some plaintext bytes here");
        let err = decrypt(&wrong, &iv, &ct).unwrap_err();
        assert!(matches!(err, Error::PasswordIncorrect));
    }

    #[test]
    fn kdf_no_stretch_escape_hatch() {
        let key = kdf_7z_iterated_sha256(b"0123456789abcdef0123456789abcdef", b"pw", 0x3F).unwrap();
        assert_eq!(&key.as_bytes()[..8], b"01234567");
    }

    #[test]
    fn rar5_kdf_rejects_out_of_range_log2count() {
        assert!(kdf_rar5_pbkdf2(b"pw", &[0u8; 16], 15).is_err());
        assert!(kdf_rar5_pbkdf2(b"pw", &[0u8; 16], 21).is_err());
    }

    #[test]
    fn rar5_kdf_roundtrip() {
        let salt = [9u8; 16];
        let key = kdf_rar5_pbkdf2(b"hunter2", &salt, 16).unwrap();
        let iv = [2u8; IV_LEN];
        let ct = encrypt(&key, &iv, b"rar5 payload bytes");
        let pt = decrypt(&key, &iv, &ct).unwrap();
        assert_eq!(pt, b"rar5 payload bytes");
    }

    #[test]
    fn random_iv_and_salt_are_used_consistently() {
        let salt = random_salt();
        let iv = random_iv();
        let key = kdf_7z_iterated_sha256(&salt, b"hunter2", 4).unwrap();
        let ct = encrypt(&key, &iv, b"fresh archive payload");
        let pt = decrypt(&key, &iv, &ct).unwrap();
        assert_eq!(pt, b"fresh archive payload");
    }
}
