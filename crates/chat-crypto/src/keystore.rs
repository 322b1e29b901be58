//! Identity material the Handshake Engine needs but does not itself own.
//!
//! `chat-crypto` implements the cryptography; it does not know whether a
//! private key lives on disk, in an HSM, or anywhere else. The `KeyStore`
//! trait is the seam: `chat-cli` supplies a filesystem-backed implementation
//! (§6 `keys/<username>.pem`), while tests can supply an in-memory one.

use crate::rsa_signing::{SigningKey, VerifyingKey};
use crate::CryptoError;

/// Collaborator supplying long-term identity material to the Handshake Engine.
pub trait KeyStore {
    /// Load the caller's own long-term RSA private key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::KeyParse`] if no usable key is available for `username`.
    fn load_private(&self, username: &str) -> Result<SigningKey, CryptoError>;

    /// Look up a peer's long-term RSA public key, out of band from the
    /// handshake itself (for a client-to-client handshake, this is a
    /// control-plane request over the already-established server session;
    /// see §4.4).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::CertificateInvalid`] if no key is on record for `username`.
    fn fetch_peer_pub(&self, username: &str) -> Result<VerifyingKey, CryptoError>;

    /// Record a peer's public key observed over the server session (a
    /// `TALK` acceptance or an incoming `REQUEST_TO_TALK`, both of which
    /// carry the peer's signing key per the talk-setup flow), so a
    /// subsequent [`Self::fetch_peer_pub`] can return it.
    ///
    /// The peer's key is never fetched by a dedicated lookup message; it
    /// rides along in the talk-request messages that already name the
    /// peer, and the store is simply updated from what the protocol
    /// delivered. Implementations that pre-populate their store (tests)
    /// may leave this a no-op.
    fn remember_peer_pub(&self, _username: &str, _key: VerifyingKey) {}
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory `KeyStore` for handshake unit/integration tests.
    #[derive(Default)]
    pub struct MemoryKeyStore {
        private: Mutex<HashMap<String, SigningKey>>,
        public: Mutex<HashMap<String, VerifyingKey>>,
    }

    impl MemoryKeyStore {
        pub fn insert(&self, username: &str, key: SigningKey) {
            self.public
                .lock()
                .unwrap()
                .insert(username.to_string(), key.verifying_key());
            self.private.lock().unwrap().insert(username.to_string(), key);
        }
    }

    impl KeyStore for MemoryKeyStore {
        fn load_private(&self, username: &str) -> Result<SigningKey, CryptoError> {
            self.private
                .lock()
                .unwrap()
                .get(username)
                .cloned()
                .ok_or_else(|| CryptoError::KeyParse(format!("no private key for {username}")))
        }

        fn fetch_peer_pub(&self, username: &str) -> Result<VerifyingKey, CryptoError> {
            self.public
                .lock()
                .unwrap()
                .get(username)
                .cloned()
                .ok_or_else(|| {
                    CryptoError::CertificateInvalid(format!("no public key on record for {username}"))
                })
        }
    }

    #[test]
    fn memory_keystore_roundtrips() {
        use rand::rngs::OsRng;
        use rsa::pkcs8::{EncodePrivateKey, LineEnding};
        use rsa::RsaPrivateKey;

        let private = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let pem = private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let signing = SigningKey::from_pkcs8_pem(&pem).unwrap();

        let store = MemoryKeyStore::default();
        store.insert("alice", signing);

        assert!(store.load_private("alice").is_ok());
        assert!(store.fetch_peer_pub("alice").is_ok());
        assert!(store.load_private("bob").is_err());
    }
}
