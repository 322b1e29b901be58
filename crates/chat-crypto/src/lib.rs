//! # chat-crypto
//!
//! Cryptographic primitives backing the Secure Channel and Handshake Engine
//! of the two-party end-to-end encrypted chat protocol.
//!
//! This crate provides:
//! - AES-256-GCM AEAD encryption for the secure channel
//! - Finite-field Diffie-Hellman ephemeral key agreement over a fixed
//!   2048-bit safe-prime group
//! - RSA-PSS long-term identity signatures
//! - X.509 certificate + CRL verification for username-to-key binding
//! - Constant-time comparison primitives
//! - Secure random number generation
//!
//! ## Cryptographic suite
//!
//! | Function | Algorithm | Notes |
//! |----------|-----------|-------|
//! | Ephemeral key agreement | Finite-field DH, RFC 3526 Group 14 (2048-bit) | `g = 2`, fixed 256-byte public values |
//! | AEAD | AES-256-GCM | 12-byte IV, 16-byte tag |
//! | Session key derivation | SHA-256 | direct hash of the shared secret |
//! | Long-term signatures | RSA-PSS / SHA-256 | CA-certified via X.509 |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod aead;
pub mod certs;
pub mod constant_time;
pub mod dh;
pub mod error;
pub mod hash;
pub mod keystore;
pub mod random;
pub mod rsa_signing;

pub use error::CryptoError;

/// Diffie-Hellman public value size (2048-bit MODP group, big-endian encoded)
pub const DH_PUBLIC_KEY_SIZE: usize = dh::DH_PUBLIC_LEN;

/// AES-256-GCM key size
pub const AES_KEY_SIZE: usize = 32;

/// AES-256-GCM IV size
pub const AES_IV_SIZE: usize = 12;

/// AES-256-GCM authentication tag size
pub const AES_TAG_SIZE: usize = 16;

/// SHA-256 output size
pub const SHA256_OUTPUT_SIZE: usize = 32;
