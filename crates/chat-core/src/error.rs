//! Error types for the chat core protocol.
//!
//! Errors are grouped into the four kinds named in the error-handling design:
//! transport, cryptographic, protocol, and local. All cryptographic and
//! transport errors observed on the server session are fatal to the client;
//! errors on a peer session are recoverable (the caller sends `END_TALK` and
//! returns to the command prompt). This module only classifies errors; the
//! propagation decision is made by the caller, which knows which session it
//! is operating on.

use std::borrow::Cow;
use thiserror::Error;

/// Errors that can occur anywhere in the chat core protocol stack.
#[derive(Debug, Error, Clone)]
pub enum ChatError {
    // ============ Transport errors ============
    /// The socket returned fewer bytes than the frame length prefix promised.
    #[error("short read: connection closed mid-frame")]
    ShortRead,

    /// A socket write did not complete.
    #[error("write failed: {0}")]
    WriteFailed(Cow<'static, str>),

    /// The frame's declared length exceeds the configured cap.
    #[error("oversized frame: {len} bytes exceeds cap of {cap}")]
    OversizedFrame {
        /// Declared frame length.
        len: u32,
        /// Configured cap.
        cap: u32,
    },

    // ============ Cryptographic errors ============
    /// GCM tag verification failed.
    #[error("authentication failed: tag mismatch")]
    AuthFailed,

    /// The received counter did not equal the expected next counter.
    #[error("replay or reorder detected: expected counter {expected}, got {actual}")]
    ReplayOrReorder {
        /// Counter value expected next.
        expected: u32,
        /// Counter value actually received.
        actual: u32,
    },

    /// The session's 32-bit counter space is exhausted.
    #[error("counter overflow: session exhausted")]
    CounterOverflow,

    /// A handshake signature did not verify under the claimed key.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// A certificate failed CA-chain verification or did not bind the claimed username.
    #[error("certificate invalid: {0}")]
    CertificateInvalid(Cow<'static, str>),

    /// The certificate's serial number is on the CRL.
    #[error("certificate revoked")]
    Revoked,

    // ============ Protocol errors ============
    /// A message carried a type byte not valid in the current context.
    #[error("unexpected message type: 0x{0:02X}")]
    UnexpectedType(u8),

    /// The command is not valid in the controller's current talk state.
    #[error("wrong state for operation: {0}")]
    WrongState(Cow<'static, str>),

    /// A handshake or control-reply deadline elapsed.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(Cow<'static, str>),

    /// A peer-initiated talk request arrived while one was already queued.
    #[error("duplicate request rejected")]
    DuplicateRequest,

    // ============ Local errors ============
    /// A username failed the path-traversal check (`/`, `\`, or `..`).
    #[error("invalid username: {0}")]
    BadUsername(Cow<'static, str>),

    /// The expected private key or certificate file is missing.
    #[error("key file missing: {0}")]
    KeyFileMissing(Cow<'static, str>),

    /// The user aborted an interactive prompt.
    #[error("aborted by user")]
    UserAbort,

    /// Catch-all for conditions that don't fit the taxonomy above.
    #[error("{0}")]
    Other(Cow<'static, str>),
}

impl ChatError {
    /// True for the Transport kind (§7).
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ChatError::ShortRead | ChatError::WriteFailed(_) | ChatError::OversizedFrame { .. }
        )
    }

    /// True for the Cryptographic kind (§7).
    #[must_use]
    pub fn is_cryptographic(&self) -> bool {
        matches!(
            self,
            ChatError::AuthFailed
                | ChatError::ReplayOrReorder { .. }
                | ChatError::CounterOverflow
                | ChatError::SignatureInvalid
                | ChatError::CertificateInvalid(_)
                | ChatError::Revoked
        )
    }

    /// True for the Protocol kind (§7).
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            ChatError::UnexpectedType(_)
                | ChatError::WrongState(_)
                | ChatError::DeadlineExceeded(_)
                | ChatError::DuplicateRequest
        )
    }

    /// True for the Local kind (§7).
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ChatError::BadUsername(_) | ChatError::KeyFileMissing(_) | ChatError::UserAbort
        )
    }

    /// True if this error, observed on the server session, must tear down
    /// the client (transport and cryptographic kinds are always fatal there).
    #[must_use]
    pub fn is_fatal_on_server_session(&self) -> bool {
        self.is_transport() || self.is_cryptographic()
    }

    /// Create a write-failure error with static context (zero allocation).
    #[must_use]
    pub const fn write_failed(context: &'static str) -> Self {
        ChatError::WriteFailed(Cow::Borrowed(context))
    }

    /// Create a wrong-state error with static context (zero allocation).
    #[must_use]
    pub const fn wrong_state(context: &'static str) -> Self {
        ChatError::WrongState(Cow::Borrowed(context))
    }

    /// Create a deadline-exceeded error with static context (zero allocation).
    #[must_use]
    pub const fn deadline_exceeded(context: &'static str) -> Self {
        ChatError::DeadlineExceeded(Cow::Borrowed(context))
    }

    /// Create a bad-username error with static context (zero allocation).
    #[must_use]
    pub const fn bad_username(context: &'static str) -> Self {
        ChatError::BadUsername(Cow::Borrowed(context))
    }

    /// Create a key-file-missing error with static context (zero allocation).
    #[must_use]
    pub const fn key_file_missing(context: &'static str) -> Self {
        ChatError::KeyFileMissing(Cow::Borrowed(context))
    }
}

impl From<chat_crypto::CryptoError> for ChatError {
    fn from(err: chat_crypto::CryptoError) -> Self {
        use chat_crypto::CryptoError as C;
        match err {
            C::EncryptionFailed => ChatError::WriteFailed(Cow::Owned(err.to_string())),
            C::DecryptionFailed => ChatError::AuthFailed,
            C::InvalidKeyLength { .. } => ChatError::Other(Cow::Owned(err.to_string())),
            C::SignatureInvalid => ChatError::SignatureInvalid,
            C::CertificateInvalid(msg) => ChatError::CertificateInvalid(Cow::Owned(msg)),
            C::Revoked => ChatError::Revoked,
            C::KeyParse(msg) => ChatError::KeyFileMissing(Cow::Owned(msg)),
            C::RandomFailed => ChatError::Other(Cow::Owned(err.to_string())),
        }
    }
}

/// Result type for chat core operations.
pub type Result<T> = std::result::Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_fatal_on_server_session() {
        assert!(ChatError::ShortRead.is_fatal_on_server_session());
        assert!(ChatError::write_failed("reset").is_fatal_on_server_session());
    }

    #[test]
    fn cryptographic_errors_are_fatal_on_server_session() {
        assert!(ChatError::AuthFailed.is_fatal_on_server_session());
        assert!(ChatError::CounterOverflow.is_fatal_on_server_session());
    }

    #[test]
    fn protocol_and_local_errors_are_not_fatal_by_default() {
        assert!(!ChatError::DuplicateRequest.is_fatal_on_server_session());
        assert!(!ChatError::UserAbort.is_fatal_on_server_session());
    }

    #[test]
    fn kinds_are_mutually_exclusive() {
        let e = ChatError::ReplayOrReorder {
            expected: 1,
            actual: 3,
        };
        assert!(e.is_cryptographic());
        assert!(!e.is_transport());
        assert!(!e.is_protocol());
        assert!(!e.is_local());
    }

    #[test]
    fn replay_or_reorder_display_includes_both_counters() {
        let e = ChatError::ReplayOrReorder {
            expected: 5,
            actual: 7,
        };
        let msg = e.to_string();
        assert!(msg.contains('5'));
        assert!(msg.contains('7'));
    }

    #[test]
    fn crypto_error_conversion_maps_decryption_to_auth_failed() {
        let converted: ChatError = chat_crypto::CryptoError::DecryptionFailed.into();
        assert!(matches!(converted, ChatError::AuthFailed));
    }

    #[test]
    fn crypto_error_conversion_maps_revoked() {
        let converted: ChatError = chat_crypto::CryptoError::Revoked.into();
        assert!(matches!(converted, ChatError::Revoked));
    }
}
