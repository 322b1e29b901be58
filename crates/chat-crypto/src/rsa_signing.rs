//! RSA-PSS long-term signing keys.
//!
//! Long-term identity keys in this protocol are RSA keys certified by a CA
//! (see [`crate::certs`]); ephemeral key agreement is finite-field
//! Diffie-Hellman (see [`crate::dh`]). Signatures over the handshake
//! transcript use RSA-PSS with SHA-256, matching the original source's
//! `sign_message`/`verify_server_signature` pair.

use crate::CryptoError;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use rsa::pss::{Signature as PssSignature, SigningKey as RsaPssSigningKey, VerifyingKey as RsaPssVerifyingKey};
use rsa::sha2::Sha256;
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use zeroize::ZeroizeOnDrop;

/// A long-term RSA private signing key, read from a PEM file.
#[derive(ZeroizeOnDrop)]
pub struct SigningKey {
    #[zeroize(skip)]
    inner: RsaPssSigningKey<Sha256>,
}

impl SigningKey {
    /// Parse a PKCS#8 PEM-encoded RSA private key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyParse`] if the PEM does not contain a valid
    /// PKCS#8 RSA private key.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, CryptoError> {
        let private = RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| CryptoError::KeyParse(e.to_string()))?;
        Ok(Self {
            inner: RsaPssSigningKey::<Sha256>::new(private),
        })
    }

    /// Sign `message` with a fresh PSS salt.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        use rand::rngs::OsRng;
        self.inner
            .sign_with_rng(&mut OsRng, message)
            .to_bytes()
            .to_vec()
    }

    /// Derive the corresponding public verifying key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            inner: RsaPssVerifyingKey::<Sha256>::from(self.inner.clone()),
        }
    }
}

impl Clone for SigningKey {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// A long-term RSA public verifying key.
#[derive(Clone)]
pub struct VerifyingKey {
    inner: RsaPssVerifyingKey<Sha256>,
}

impl VerifyingKey {
    /// Parse an SPKI DER-encoded RSA public key (as found inside an X.509 certificate).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyParse`] if `der` is not a valid SPKI RSA public key.
    pub fn from_public_key_der(der: &[u8]) -> Result<Self, CryptoError> {
        let public =
            RsaPublicKey::from_public_key_der(der).map_err(|e| CryptoError::KeyParse(e.to_string()))?;
        Ok(Self {
            inner: RsaPssVerifyingKey::<Sha256>::new(public),
        })
    }

    /// Encode this key as SPKI DER, for transport or bitwise comparison.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyParse`] if encoding fails.
    pub fn to_public_key_der(&self) -> Result<Vec<u8>, CryptoError> {
        let rsa_pub: RsaPublicKey = self.inner.clone().into();
        rsa_pub
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::KeyParse(e.to_string()))
    }

    /// Verify `signature` over `message`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SignatureInvalid`] if the signature does not verify.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let sig =
            PssSignature::try_from(signature).map_err(|_| CryptoError::SignatureInvalid)?;
        self.inner
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureInvalid)
    }
}

impl PartialEq for VerifyingKey {
    fn eq(&self, other: &Self) -> bool {
        match (self.to_public_key_der(), other.to_public_key_der()) {
            (Ok(a), Ok(b)) => crate::constant_time::ct_eq(&a, &b),
            _ => false,
        }
    }
}
