//! Wire message types (§6).
//!
//! The first plaintext byte of every decrypted secure-channel frame names
//! the message. Client→server and server→client bytes are distinct
//! namespaces — a client never parses its own outgoing byte as an incoming
//! one, so the numeric overlap between, say, `ClientMessageType::Show`
//! (`0x00`) and `ServerMessageType::Ok` (`0x00`) is never ambiguous at a
//! single endpoint.

use crate::error::ChatError;

/// Message types a client sends to the server (or, tunneled, to a peer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessageType {
    /// List currently online usernames.
    Show,
    /// Request to start a talk with a named peer.
    Talk,
    /// Clean logout.
    Exit,
    /// Accept a pending peer-initiated talk request.
    AcceptTalk,
    /// Refuse a pending peer-initiated talk request.
    RefuseTalk,
    /// Tunneled peer-session ciphertext.
    Talking,
    /// End an active talk.
    EndTalk,
    /// Client-observed protocol error, reported to the server.
    ClientError,
}

impl ClientMessageType {
    /// Decode a message type from its wire byte.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UnexpectedType`] for any byte not in §6's table.
    pub fn from_byte(byte: u8) -> Result<Self, ChatError> {
        match byte {
            0x00 => Ok(Self::Show),
            0x01 => Ok(Self::Talk),
            0x02 => Ok(Self::Exit),
            0x03 => Ok(Self::AcceptTalk),
            0x13 => Ok(Self::RefuseTalk),
            0x04 => Ok(Self::Talking),
            0x05 => Ok(Self::EndTalk),
            0xFF => Ok(Self::ClientError),
            other => Err(ChatError::UnexpectedType(other)),
        }
    }

    /// Encode this message type as its wire byte.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Show => 0x00,
            Self::Talk => 0x01,
            Self::Exit => 0x02,
            Self::AcceptTalk => 0x03,
            Self::RefuseTalk => 0x13,
            Self::Talking => 0x04,
            Self::EndTalk => 0x05,
            Self::ClientError => 0xFF,
        }
    }
}

/// Message types the server sends to a client.
///
/// `Talking` is not in §6's server→client byte table, which only lists
/// `ok`/`request_to_talk`/`end_talk`/`error`; the server simply relays a
/// client's tunneled `TALKING` frames onward using the same byte the sending
/// client used (`0x04`), so this one message type is shared between both
/// namespaces rather than being translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMessageType {
    /// Success reply to an outstanding control request.
    Ok,
    /// A peer wants to talk; payload carries the peer's username.
    RequestToTalk,
    /// A talk has ended (peer hangup, or echo of the client's own `END_TALK`).
    EndTalk,
    /// Relayed tunneled peer-session traffic (handshake bytes or chat ciphertext).
    Talking,
    /// Failure reply to an outstanding control request.
    Error,
}

impl ServerMessageType {
    /// Decode a message type from its wire byte.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UnexpectedType`] for any byte not in §6's table.
    pub fn from_byte(byte: u8) -> Result<Self, ChatError> {
        match byte {
            0x00 => Ok(Self::Ok),
            0x01 => Ok(Self::RequestToTalk),
            0x02 => Ok(Self::EndTalk),
            0x04 => Ok(Self::Talking),
            0xFF => Ok(Self::Error),
            other => Err(ChatError::UnexpectedType(other)),
        }
    }

    /// Encode this message type as its wire byte.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Ok => 0x00,
            Self::RequestToTalk => 0x01,
            Self::EndTalk => 0x02,
            Self::Talking => 0x04,
            Self::Error => 0xFF,
        }
    }
}

/// Error sub-codes carried in the payload of a `ServerMessageType::Error` reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSubCode {
    /// The message type was not valid in the server's current expectation.
    WrongType,
    /// Unclassified server-side error.
    Generic,
}

impl ErrorSubCode {
    /// Decode a sub-code from its wire byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0x02 => Self::WrongType,
            _ => Self::Generic,
        }
    }

    /// Encode this sub-code as its wire byte.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::WrongType => 0x02,
            Self::Generic => 0xFF,
        }
    }
}

/// Maximum username length (§3).
pub const MAX_USERNAME_LEN: usize = 255;

/// Validate a username against the path-traversal rule in §6/§7.
///
/// # Errors
///
/// Returns [`ChatError::BadUsername`] if `username` is empty, too long, or
/// contains `/`, `\`, or `..`.
pub fn validate_username(username: &str) -> Result<(), ChatError> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(ChatError::bad_username("length out of bounds"));
    }
    if username.contains('/') || username.contains('\\') || username.contains("..") {
        return Err(ChatError::bad_username(
            "username contains a path separator or traversal sequence",
        ));
    }
    if !username.chars().all(|c| c.is_ascii_graphic()) {
        return Err(ChatError::bad_username("username contains non-printable characters"));
    }
    Ok(())
}
