//! Session key material.
//!
//! The [`Secret`] is `SHA-256(password)` used directly as an AES-256 key. It
//! is unrelated to the salted verification hash kept on disk, so neither can
//! be computed from the other. It lives only in memory and is zeroized on drop.

use sha2::digest::generic_array::GenericArray;
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroize;

pub const SECRET_LEN: usize = 32;

/// AES-256 key for one unlocked session.
pub struct Secret {
    key_bytes: [u8; SECRET_LEN],
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.key_bytes.zeroize();
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

impl Secret {
    /// Derives the session key. Only call this after the password has been
    /// checked against the credential record; [`crate::auth::unlock`] does both.
    pub(crate) fn derive(password: &str) -> Self {
        let mut secret = Self {
            key_bytes: [0u8; SECRET_LEN],
        };
        // Hash straight into the zeroize-on-drop buffer; no digest copy is left behind.
        Sha256::new()
            .chain_update(password.as_bytes())
            .finalize_into(GenericArray::from_mut_slice(&mut secret.key_bytes[..]));
        secret
    }

    pub(crate) fn as_bytes(&self) -> &[u8; SECRET_LEN] {
        &self.key_bytes
    }

    #[cfg(test)]
    pub(crate) fn from_bytes(key_bytes: [u8; SECRET_LEN]) -> Self {
        Self { key_bytes }
    }
}
