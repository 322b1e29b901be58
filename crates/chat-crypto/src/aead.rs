//! AES-256-GCM AEAD encryption.
//!
//! This is the cipher primitive the Secure Channel and Handshake Engine are
//! built on: a 256-bit key, a 12-byte random IV per call, and a 4-byte
//! counter value as associated data. Framing (length prefix, IV placement,
//! counter bookkeeping) is layered on top by `chat-core`.

use crate::CryptoError;
use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use zeroize::Zeroize;

/// IV length for AES-256-GCM as used on the wire (12 bytes).
pub const IV_LEN: usize = 12;

/// Authentication tag length for AES-256-GCM (16 bytes).
pub const TAG_LEN: usize = 16;

/// Session key length (256 bits).
pub const KEY_LEN: usize = 32;

/// AEAD cipher for secure-channel and handshake-message encryption.
pub struct AeadKey {
    cipher: Aes256Gcm,
    key_bytes: [u8; KEY_LEN],
}

impl AeadKey {
    /// Create a new AEAD cipher wrapping the given 256-bit key.
    #[must_use]
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        Self {
            cipher,
            key_bytes: key,
        }
    }

    /// Encrypt `plaintext` under a fresh 12-byte IV with `aad` as associated data.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::EncryptionFailed`] if the underlying cipher rejects the call.
    pub fn encrypt(
        &self,
        iv: &[u8; IV_LEN],
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let payload = Payload {
            msg: plaintext,
            aad,
        };
        self.cipher
            .encrypt(Nonce::from_slice(iv), payload)
            .map_err(|_| CryptoError::EncryptionFailed)
    }

    /// Decrypt `ciphertext` (which includes the trailing authentication tag).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::DecryptionFailed`] if authentication fails.
    pub fn decrypt(
        &self,
        iv: &[u8; IV_LEN],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let payload = Payload {
            msg: ciphertext,
            aad,
        };
        self.cipher
            .decrypt(Nonce::from_slice(iv), payload)
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

impl Drop for AeadKey {
    fn drop(&mut self) {
        self.key_bytes.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = AeadKey::new([0x42u8; KEY_LEN]);
        let iv = [0x01u8; IV_LEN];
        let aad = 7u32.to_be_bytes();
        let plaintext = b"hello, peer";

        let ct = key.encrypt(&iv, plaintext, &aad).unwrap();
        let pt = key.decrypt(&iv, &ct, &aad).unwrap();
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn tamper_detected() {
        let key = AeadKey::new([0x11u8; KEY_LEN]);
        let iv = [0x02u8; IV_LEN];
        let aad = 0u32.to_be_bytes();

        let mut ct = key.encrypt(&iv, b"payload", &aad).unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0xFF;

        assert!(key.decrypt(&iv, &ct, &aad).is_err());
    }

    #[test]
    fn wrong_aad_rejected() {
        let key = AeadKey::new([0x33u8; KEY_LEN]);
        let iv = [0x03u8; IV_LEN];

        let ct = key.encrypt(&iv, b"payload", &1u32.to_be_bytes()).unwrap();
        assert!(key.decrypt(&iv, &ct, &2u32.to_be_bytes()).is_err());
    }
}
