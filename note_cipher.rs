//! AES-256-CBC encryption of note content.
//!
//! ## Note file format
//!
//! ```text
//! [iv:16][ciphertext:N]    N = 16 * k, k >= 1
//! ```
//!
//! The IV is fresh from the OS RNG for every encryption. Plaintext is padded
//! with PKCS#7. There is no MAC: tampering shows up only when it breaks the
//! padding, and every such failure is the same [`DecryptError::Corrupt`].

use crate::error::DecryptError;
use crate::secret::Secret;
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand_core::{OsRng, RngCore};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub const IV_LEN: usize = 16;
pub const BLOCK_LEN: usize = 16;

/// Smallest well-formed note file: the IV plus one ciphertext block.
pub const MIN_NOTE_FILE_LEN: usize = IV_LEN + BLOCK_LEN;

pub type Iv = [u8; IV_LEN];

pub fn generate_iv() -> Iv {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypts `plaintext` under a fresh IV and returns both.
pub fn encrypt(plaintext: &[u8], secret: &Secret) -> (Iv, Vec<u8>) {
    let iv = generate_iv();
    let ciphertext = encrypt_with_iv(plaintext, secret, &iv);
    (iv, ciphertext)
}

fn encrypt_with_iv(plaintext: &[u8], secret: &Secret, iv: &Iv) -> Vec<u8> {
    Aes256CbcEnc::new(
        GenericArray::from_slice(secret.as_bytes()),
        GenericArray::from_slice(iv),
    )
    .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypts `ciphertext` that was produced with `iv` under `secret`.
pub fn decrypt(iv: &Iv, ciphertext: &[u8], secret: &Secret) -> Result<Vec<u8>, DecryptError> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(DecryptError::Corrupt);
    }
    Aes256CbcDec::new(
        GenericArray::from_slice(secret.as_bytes()),
        GenericArray::from_slice(iv),
    )
    .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
    .map_err(|_| DecryptError::Corrupt)
}

/// Lays out `iv || ciphertext` for writing.
pub fn encode_note_file(iv: &Iv, ciphertext: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(iv);
    out.extend_from_slice(ciphertext);
    out
}

/// Splits raw note file bytes into IV and ciphertext.
pub fn split_note_file(bytes: &[u8]) -> Result<(Iv, &[u8]), DecryptError> {
    if bytes.len() < MIN_NOTE_FILE_LEN {
        return Err(DecryptError::Corrupt);
    }
    let (iv_bytes, ciphertext) = bytes.split_at(IV_LEN);
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(iv_bytes);
    Ok((iv, ciphertext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbc::cipher::block_padding::NoPadding;
    use std::collections::HashSet;

    // NIST SP 800-38A, F.2.5 (CBC-AES256.Encrypt), first block.
    const NIST_KEY: [u8; 32] = [
        0x60, 0x3d, 0xeb, 0x10, 0x15, 0xca, 0x71, 0xbe, 0x2b, 0x73, 0xae, 0xf0, 0x85, 0x7d, 0x77,
        0x81, 0x1f, 0x35, 0x2c, 0x07, 0x3b, 0x61, 0x08, 0xd7, 0x2d, 0x98, 0x10, 0xa3, 0x09, 0x14,
        0xdf, 0xf4,
    ];
    const NIST_IV: Iv = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
        0x0f,
    ];
    const NIST_PLAINTEXT: [u8; 16] = [
        0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93, 0x17,
        0x2a,
    ];
    const NIST_CIPHERTEXT: [u8; 16] = [
        0xf5, 0x8c, 0x4c, 0x04, 0xd6, 0xe5, 0xf1, 0xba, 0x77, 0x9e, 0xab, 0xfb, 0x5f, 0x7b, 0xfb,
        0xd6,
    ];

    #[test]
    fn matches_known_answer_vector() {
        let secret = Secret::from_bytes(NIST_KEY);
        let ciphertext = encrypt_with_iv(&NIST_PLAINTEXT, &secret, &NIST_IV);
        // One data block plus one full padding block.
        assert_eq!(ciphertext.len(), 32);
        assert_eq!(&ciphertext[..16], &NIST_CIPHERTEXT);
        assert_eq!(decrypt(&NIST_IV, &ciphertext, &secret).unwrap(), NIST_PLAINTEXT);
    }

    #[test]
    fn roundtrip_various_lengths() {
        let secret = Secret::derive("correct horse battery staple");
        for len in [0usize, 1, 15, 16, 17, 100, 4096] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let (iv, ciphertext) = encrypt(&plaintext, &secret);
            assert_eq!(ciphertext.len() % BLOCK_LEN, 0);
            assert!(ciphertext.len() > plaintext.len());
            assert_eq!(decrypt(&iv, &ciphertext, &secret).unwrap(), plaintext);
        }
    }

    #[test]
    fn ivs_are_unique() {
        let ivs: HashSet<Iv> = (0..1000).map(|_| generate_iv()).collect();
        assert_eq!(ivs.len(), 1000);
    }

    #[test]
    fn same_plaintext_encrypts_differently() {
        let secret = Secret::derive("pw");
        let (iv1, ct1) = encrypt(b"buy milk", &secret);
        let (iv2, ct2) = encrypt(b"buy milk", &secret);
        assert_ne!(iv1, iv2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn rejects_bad_ciphertext_lengths() {
        let secret = Secret::derive("pw");
        let iv = generate_iv();
        assert_eq!(decrypt(&iv, &[], &secret), Err(DecryptError::Corrupt));
        assert_eq!(decrypt(&iv, &[0u8; 15], &secret), Err(DecryptError::Corrupt));
        assert_eq!(decrypt(&iv, &[0u8; 33], &secret), Err(DecryptError::Corrupt));
    }

    #[test]
    fn bad_padding_is_corrupt() {
        let secret = Secret::derive("pw");
        let iv = generate_iv();
        // A block that decrypts to all zeros never carries valid PKCS#7 padding.
        let ciphertext = Aes256CbcEnc::new(
            GenericArray::from_slice(secret.as_bytes()),
            GenericArray::from_slice(&iv),
        )
        .encrypt_padded_vec_mut::<NoPadding>(&[0u8; 16]);
        assert_eq!(decrypt(&iv, &ciphertext, &secret), Err(DecryptError::Corrupt));
    }

    #[test]
    fn note_file_layout() {
        let iv = [7u8; IV_LEN];
        let ciphertext = [9u8; 32];
        let file = encode_note_file(&iv, &ciphertext);
        assert_eq!(file.len(), 48);
        assert_eq!(&file[..16], &iv);

        let (split_iv, split_ct) = split_note_file(&file).unwrap();
        assert_eq!(split_iv, iv);
        assert_eq!(split_ct, &ciphertext);

        assert_eq!(split_note_file(&file[..31]), Err(DecryptError::Corrupt));
    }
}
