//! Filesystem-backed [`KeyStore`]: the external collaborator spec.md
//! declares out of scope ("certificate/key-file reading").
//!
//! Own private key and the CA trust material are read from disk once at
//! startup; a peer's public key is never read from disk at all — it only
//! ever arrives bundled in a wire message (see
//! [`chat_crypto::keystore::KeyStore::remember_peer_pub`]), so
//! [`FilesystemKeyStore::fetch_peer_pub`] serves purely from an in-memory
//! cache populated by that callback.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chat_crypto::keystore::KeyStore;
use chat_crypto::rsa_signing::{SigningKey, VerifyingKey};
use chat_crypto::CryptoError;

/// Reads `<directory>/<username>.pem` for the caller's own private key;
/// caches peer public keys learned over the wire rather than reading them
/// from disk.
pub struct FilesystemKeyStore {
    keys_dir: PathBuf,
    peer_cache: Mutex<HashMap<String, VerifyingKey>>,
}

impl FilesystemKeyStore {
    /// Create a store rooted at `keys_dir` (§6: `keys/<username>.pem`).
    #[must_use]
    pub fn new(keys_dir: PathBuf) -> Self {
        Self {
            keys_dir,
            peer_cache: Mutex::new(HashMap::new()),
        }
    }
}

impl KeyStore for FilesystemKeyStore {
    fn load_private(&self, username: &str) -> Result<SigningKey, CryptoError> {
        let path = self.keys_dir.join(format!("{username}.pem"));
        let pem = fs::read_to_string(&path)
            .map_err(|e| CryptoError::KeyParse(format!("reading {}: {e}", path.display())))?;
        SigningKey::from_pkcs8_pem(&pem)
    }

    fn fetch_peer_pub(&self, username: &str) -> Result<VerifyingKey, CryptoError> {
        self.peer_cache
            .lock()
            .unwrap()
            .get(username)
            .cloned()
            .ok_or_else(|| {
                CryptoError::CertificateInvalid(format!("no public key on record for {username}"))
            })
    }

    fn remember_peer_pub(&self, username: &str, key: VerifyingKey) {
        self.peer_cache.lock().unwrap().insert(username.to_string(), key);
    }
}

/// Read a PEM-armored DER document (certificate or CRL) from disk.
///
/// Certificate and CRL parsing in `chat-crypto` operates on raw DER; PEM
/// armor is a file-format detail that belongs to this crate's file-reading
/// responsibility, not the protocol core's.
pub fn read_pem_der(path: &Path) -> anyhow::Result<Vec<u8>> {
    let contents = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
    let parsed = pem::parse(&contents)
        .map_err(|e| anyhow::anyhow!("parsing PEM in {}: {e}", path.display()))?;
    Ok(parsed.into_contents())
}
