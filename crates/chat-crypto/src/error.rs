//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// AEAD encryption failed
    #[error("encryption failed")]
    EncryptionFailed,

    /// AEAD decryption failed (authentication failure)
    #[error("decryption failed: authentication failure")]
    DecryptionFailed,

    /// Invalid key length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// A signature did not verify under the presented key
    #[error("signature verification failed")]
    SignatureInvalid,

    /// A certificate failed CA-chain or CRL verification
    #[error("certificate invalid: {0}")]
    CertificateInvalid(String),

    /// The certificate's serial number appears on the CRL
    #[error("certificate revoked")]
    Revoked,

    /// A PEM/DER key or certificate failed to parse
    #[error("key parse error: {0}")]
    KeyParse(String),

    /// Random number generation failed
    #[error("random number generation failed")]
    RandomFailed,
}
