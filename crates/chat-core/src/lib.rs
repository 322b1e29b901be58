//! # chat-core
//!
//! The protocol core of a two-party end-to-end encrypted chat client that
//! talks to a trusted rendezvous server.
//!
//! This crate provides:
//! - **Secure Channel**: authenticated, confidential AES-256-GCM framing
//!   over a TCP socket, with per-direction replay/reorder protection.
//! - **Handshake Engine**: the Station-to-Station key exchange, run both
//!   client↔server (at login) and client↔client (at talk setup).
//! - **Thread Bridge**: the condition-variable-based handoff between the
//!   network reader thread and the main thread.
//! - **Network Reader Loop**: the reader thread's frame dispatcher.
//! - **Talk Session Controller**: the main thread's command state machine.
//! - **Wire protocol**: message type bytes and username validation.
//! - **Error types**: the taxonomy errors are classified into, and the
//!   fatal-on-server-session propagation rule.
//!
//! ## Architecture
//!
//! ```text
//! keyboard -> TSC -> SC(peer key) -> server -> SC(peer key) -> NRL -> TB -> TSC -> display
//! ```
//!
//! `chat-core` owns the protocol state machines; it does not read files,
//! parse arguments, or open sockets itself beyond the `TcpStream` it is
//! handed — those are `chat-cli`'s job.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod handshake;
pub mod network_reader;
pub mod protocol;
pub mod secure_channel;
pub mod sync;
pub mod talk_session;
pub mod thread_bridge;

pub use error::ChatError;
pub use handshake::{
    run_initiator, run_responder, Credential, HandshakeIo, HandshakeOutcome, PeerIdentityCheck,
};
pub use network_reader::{NetworkReader, PeerLink, ServerReply};
pub use protocol::{
    validate_username, ClientMessageType, ErrorSubCode, ServerMessageType, MAX_USERNAME_LEN,
};
pub use secure_channel::{SecureChannel, SecureChannelCrypto};
pub use sync::{NonBlockingCell, OneSlot};
pub use talk_session::{TalkSessionController, CONTROL_REPLY_DEADLINE};
pub use thread_bridge::{BridgeMessage, PendingTalkRequest, RequestOutcome, TalkState, ThreadBridge};
