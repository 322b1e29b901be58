//! SHA-256 hashing and session-key derivation.
//!
//! The Handshake Engine derives the AES-256-GCM session key `k` directly as
//! `SHA256(shared_secret)`. SHA-256's 32-byte output is exactly the AES-256
//! key length, so no truncation or expansion step is needed.

use sha2::{Digest, Sha256};

/// SHA-256 digest output (32 bytes).
pub type HashOutput = [u8; 32];

/// Compute the SHA-256 digest of `data`.
#[must_use]
pub fn hash(data: &[u8]) -> HashOutput {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Derive the AES-256-GCM session key from a Diffie-Hellman shared secret.
#[must_use]
pub fn derive_session_key(shared_secret: &[u8]) -> HashOutput {
    hash(shared_secret)
}
