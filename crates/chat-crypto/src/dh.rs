//! Finite-field Diffie-Hellman over RFC 3526's 2048-bit MODP Group 14.
//!
//! Ephemeral key agreement over the classical safe-prime group the protocol
//! is specified against: a random private exponent `x` in `[2, p-2]`, the
//! public value `g^x mod p`, and the shared secret `peer^x mod p`. `g = 2`
//! and `p` is the well-known RFC 3526 Group 14 prime — the same "2048-bit
//! MODP group" OpenSSL hands out as a built-in DH parameter set.

use std::sync::OnceLock;

use num_bigint_dig::{BigUint, RandBigInt};
use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

/// Encoded width of a public value or shared secret (2048 bits).
pub const DH_PUBLIC_LEN: usize = 256;

const GROUP14_PRIME_HEX: &str = "
    FFFFFFFF FFFFFFFF C90FDAA2 2168C234 C4C6628B 80DC1CD1
    29024E08 8A67CC74 020BBEA6 3B139B22 514A0879 8E3404DD
    EF9519B3 CD3A431B 302B0A6D F25F1437 4FE1356D 6D51C245
    E485B576 625E7EC6 F44C42E9 A637ED6B 0BFF5CB6 F406B7ED
    EE386BFB 5A899FA5 AE9F2411 7C4B1FE6 49286651 ECE45B3D
    C2007CB8 A163BF05 98DA4836 1C55D39A 69163FA8 FD24CF5F
    83655D23 DCA3AD96 1C62F356 208552BB 9ED52907 7096966D
    670C354E 4ABC9804 F1746C08 CA18217C 32905E46 2E36CE3B
    E39E772C 180E8603 9B2783A2 EC07A28F B5C55DF0 6F4C52C9
    DE2BCBF6 95581718 3995497C EA956AE5 15D22618 98FA0510
    15728E5A 8AACAA68 FFFFFFFF FFFFFFFF
";

fn prime() -> &'static BigUint {
    static P: OnceLock<BigUint> = OnceLock::new();
    P.get_or_init(|| {
        let digits: String = GROUP14_PRIME_HEX.chars().filter(|c| !c.is_whitespace()).collect();
        BigUint::parse_bytes(digits.as_bytes(), 16).expect("static MODP group 14 prime")
    })
}

fn generator() -> BigUint {
    BigUint::from(2u32)
}

fn biguint_to_fixed(value: &BigUint) -> [u8; DH_PUBLIC_LEN] {
    let bytes = value.to_bytes_be();
    let mut out = [0u8; DH_PUBLIC_LEN];
    out[DH_PUBLIC_LEN - bytes.len()..].copy_from_slice(&bytes);
    out
}

/// A Diffie-Hellman private exponent.
pub struct PrivateKey {
    exponent_be: Vec<u8>,
}

/// A Diffie-Hellman public value (`g^x mod p`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey([u8; DH_PUBLIC_LEN]);

/// A Diffie-Hellman shared secret (`peer^x mod p`).
pub struct SharedSecret([u8; DH_PUBLIC_LEN]);

impl PrivateKey {
    /// Generate a new random private exponent, uniform over `[2, p-2]`.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let p = prime();
        let lower = BigUint::from(2u32);
        let upper = p - 2u32;
        let exponent = rng.gen_biguint_range(&lower, &upper);
        Self {
            exponent_be: exponent.to_bytes_be(),
        }
    }

    /// Derive the public value `g^x mod p` from this private exponent.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        let exponent = BigUint::from_bytes_be(&self.exponent_be);
        let value = generator().modpow(&exponent, prime());
        PublicKey(biguint_to_fixed(&value))
    }

    /// Perform Diffie-Hellman key exchange.
    ///
    /// Returns `None` if the peer's public value is degenerate (`0`, `1`, or
    /// `p - 1`) — the only elements of order dividing 2 in a safe-prime
    /// group, which collapse the exchange to a value independent of this
    /// side's private exponent.
    #[must_use]
    pub fn exchange(&self, peer_public: &PublicKey) -> Option<SharedSecret> {
        let p = prime();
        let peer = BigUint::from_bytes_be(&peer_public.0);
        if peer <= BigUint::from(1u32) || peer >= p - 1u32 {
            return None;
        }
        let exponent = BigUint::from_bytes_be(&self.exponent_be);
        let shared = peer.modpow(&exponent, p);
        Some(SharedSecret(biguint_to_fixed(&shared)))
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.exponent_be.zeroize();
    }
}

impl PublicKey {
    /// Export the public value as its fixed-width big-endian encoding.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; DH_PUBLIC_LEN] {
        self.0
    }

    /// Import a public value from its fixed-width big-endian encoding.
    #[must_use]
    pub fn from_bytes(bytes: [u8; DH_PUBLIC_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the encoded bytes as a slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; DH_PUBLIC_LEN] {
        &self.0
    }
}

impl SharedSecret {
    /// Get the shared secret's fixed-width big-endian encoding.
    ///
    /// # Security
    ///
    /// The shared secret should be used with a KDF (SHA-256, here) before
    /// use as an encryption key.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; DH_PUBLIC_LEN] {
        &self.0
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}
