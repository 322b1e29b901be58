//! Talk Session Controller (TSC) — §4.4.
//!
//! The main thread's state machine. Dispatches user commands over the
//! server-session [`SecureChannel`], runs peer handshakes via [`crate::handshake`],
//! and drains chat bytes handed across the [`ThreadBridge`] by the reader thread.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chat_crypto::keystore::KeyStore;
use chat_crypto::rsa_signing::{SigningKey, VerifyingKey};

use crate::error::ChatError;
use crate::handshake::{run_initiator, run_responder, Credential, HandshakeIo, PeerIdentityCheck};
use crate::network_reader::{PeerLink, ServerReply};
use crate::protocol::{validate_username, ClientMessageType, ErrorSubCode};
use crate::secure_channel::{SecureChannel, SecureChannelCrypto};
use crate::sync::OneSlot;
use crate::thread_bridge::{BridgeMessage, TalkState, ThreadBridge};

/// Deadline for an outstanding control request (`show`/`talk`) reply (§5).
pub const CONTROL_REPLY_DEADLINE: Duration = Duration::from_secs(10);

/// The main thread's command surface over a live server session.
pub struct TalkSessionController<K: KeyStore> {
    channel: Arc<SecureChannel>,
    bridge: Arc<ThreadBridge>,
    replies: Arc<OneSlot<ServerReply>>,
    peer_link: Arc<PeerLink>,
    keystore: K,
    my_username: String,
    my_signing_key: SigningKey,
    control_reply_deadline: Duration,
    handshake_deadline: Duration,
}

impl<K: KeyStore> TalkSessionController<K> {
    /// Build a controller bound to an already-established server session,
    /// using the default deadlines ([`CONTROL_REPLY_DEADLINE`] and
    /// [`crate::handshake::HANDSHAKE_DEADLINE`]).
    #[must_use]
    pub fn new(
        channel: Arc<SecureChannel>,
        bridge: Arc<ThreadBridge>,
        replies: Arc<OneSlot<ServerReply>>,
        peer_link: Arc<PeerLink>,
        keystore: K,
        my_username: String,
        my_signing_key: SigningKey,
    ) -> Self {
        Self::with_deadlines(
            channel,
            bridge,
            replies,
            peer_link,
            keystore,
            my_username,
            my_signing_key,
            CONTROL_REPLY_DEADLINE,
            crate::handshake::HANDSHAKE_DEADLINE,
        )
    }

    /// Build a controller with explicit control-reply and handshake
    /// deadlines, overriding the defaults — the path operator-configured
    /// timeouts (`chat-cli`'s `TimeoutsConfig`) are wired through.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn with_deadlines(
        channel: Arc<SecureChannel>,
        bridge: Arc<ThreadBridge>,
        replies: Arc<OneSlot<ServerReply>>,
        peer_link: Arc<PeerLink>,
        keystore: K,
        my_username: String,
        my_signing_key: SigningKey,
        control_reply_deadline: Duration,
        handshake_deadline: Duration,
    ) -> Self {
        Self {
            channel,
            bridge,
            replies,
            peer_link,
            keystore,
            my_username,
            my_signing_key,
            control_reply_deadline,
            handshake_deadline,
        }
    }

    fn await_reply(&self) -> Result<ServerReply, ChatError> {
        self.replies
            .take_timeout(self.control_reply_deadline)
            .ok_or_else(|| ChatError::deadline_exceeded("control reply"))
    }

    fn require_state(&self, expected: TalkState, context: &'static str) -> Result<(), ChatError> {
        if self.bridge.get_state() == expected {
            Ok(())
        } else {
            Err(ChatError::wrong_state(context))
        }
    }

    /// `show`: list currently online usernames (§4.4).
    ///
    /// # Errors
    ///
    /// [`ChatError::WrongState`] if a talk is active; [`ChatError::DeadlineExceeded`]
    /// if no reply arrives within [`CONTROL_REPLY_DEADLINE`].
    pub fn show(&self) -> Result<String, ChatError> {
        self.require_state(TalkState::No, "show requires state NO")?;
        self.channel.send(&[ClientMessageType::Show.to_byte()])?;
        match self.await_reply()? {
            ServerReply::Ok(body) => Ok(String::from_utf8_lossy(&body).into_owned()),
            ServerReply::Error(sub) => Err(server_error_to_chat_error(sub)),
        }
    }

    /// `talk <peer>`: request a talk, and on acceptance run the peer
    /// handshake as initiator (§4.4).
    ///
    /// # Errors
    ///
    /// [`ChatError::BadUsername`] if `peer` is invalid or equals our own
    /// username; [`ChatError::WrongState`] if a talk is already active or the
    /// peer refuses; propagates handshake failures (e.g. [`ChatError::SignatureInvalid`]).
    pub fn talk(&self, peer: &str) -> Result<(), ChatError> {
        self.require_state(TalkState::No, "talk requires state NO")?;
        validate_username(peer)?;
        if peer == self.my_username {
            return Err(ChatError::bad_username("cannot talk to yourself"));
        }

        let mut body = vec![ClientMessageType::Talk.to_byte()];
        body.extend_from_slice(peer.as_bytes());
        self.channel.send(&body)?;

        match self.await_reply()? {
            ServerReply::Error(_) => Err(ChatError::wrong_state("peer refused the talk request")),
            ServerReply::Ok(peer_pubkey_der) => {
                // The accept reply's payload is the peer's signing public
                // key (SPKI DER), bundled instead of fetched separately;
                // record it so `fetch_peer_pub` below can return it (§9).
                let presented = VerifyingKey::from_public_key_der(&peer_pubkey_der)?;
                self.keystore.remember_peer_pub(peer, presented);
                let peer_key = self.keystore.fetch_peer_pub(peer)?;
                let mut io = TunneledHandshakeIo {
                    channel: &self.channel,
                    bridge: &self.bridge,
                };
                let outcome = run_initiator(
                    &mut io,
                    &self.my_username,
                    &self.my_signing_key,
                    peer,
                    PeerIdentityCheck::ViaKnownKey(peer_key),
                    self.handshake_deadline,
                )?;
                self.peer_link
                    .install(SecureChannelCrypto::new(outcome.session_key));
                self.bridge.set_state(TalkState::Yes);
                Ok(())
            }
        }
    }

    /// Accept a pending peer-initiated talk request, running the peer
    /// handshake as responder.
    ///
    /// Returns `Ok(None)` if no request was pending.
    ///
    /// # Errors
    ///
    /// Propagates handshake and transport failures.
    pub fn accept_pending_request(&self) -> Result<Option<String>, ChatError> {
        let Some(request) = self.bridge.take_request() else {
            return Ok(None);
        };
        let peer = request.peer;

        let mut body = vec![ClientMessageType::AcceptTalk.to_byte()];
        body.extend_from_slice(peer.as_bytes());
        self.channel.send(&body)?;

        let presented = VerifyingKey::from_public_key_der(&request.peer_pubkey_der)?;
        self.keystore.remember_peer_pub(&peer, presented);
        let peer_key = self.keystore.fetch_peer_pub(&peer)?;
        let my_public_der = self.my_signing_key.verifying_key().to_public_key_der()?;
        let mut io = TunneledHandshakeIo {
            channel: &self.channel,
            bridge: &self.bridge,
        };
        let outcome = run_responder(
            &mut io,
            &self.my_signing_key,
            Credential::RawKey(my_public_der),
            peer_key,
            self.handshake_deadline,
        )?;
        self.peer_link
            .install(SecureChannelCrypto::new(outcome.session_key));
        self.bridge.set_state(TalkState::Yes);
        Ok(Some(outcome.peer_username))
    }

    /// Refuse a pending peer-initiated talk request.
    ///
    /// No-op (returns `Ok(())`) if no request was pending.
    ///
    /// # Errors
    ///
    /// Propagates a transport failure sending `REFUSE_TALK`.
    pub fn refuse_pending_request(&self) -> Result<(), ChatError> {
        let Some(request) = self.bridge.take_request() else {
            return Ok(());
        };
        let mut body = vec![ClientMessageType::RefuseTalk.to_byte()];
        body.extend_from_slice(request.peer.as_bytes());
        self.channel.send(&body)
    }

    /// `<line>`: send one chat line over the live peer session, tunneled
    /// inside a server-session `TALKING` frame.
    ///
    /// # Errors
    ///
    /// [`ChatError::WrongState`] if no talk is active.
    pub fn send_line(&self, line: &str) -> Result<(), ChatError> {
        self.require_state(TalkState::Yes, "no active talk")?;
        let framed = self
            .peer_link
            .seal(line.as_bytes())?
            .ok_or_else(|| ChatError::wrong_state("no peer session installed"))?;
        let mut body = vec![ClientMessageType::Talking.to_byte()];
        body.extend_from_slice(&framed);
        self.channel.send(&body)
    }

    /// `:q`: end the active talk and wait for the server's `END_TALK` echo.
    ///
    /// # Errors
    ///
    /// [`ChatError::WrongState`] if no talk is active; [`ChatError::DeadlineExceeded`]
    /// if the echo does not arrive within [`CONTROL_REPLY_DEADLINE`].
    pub fn end_talk(&self) -> Result<(), ChatError> {
        self.require_state(TalkState::Yes, "no active talk to end")?;
        self.channel.send(&[ClientMessageType::EndTalk.to_byte()])?;
        self.bridge.set_state(TalkState::Closing);

        let deadline = Instant::now() + self.control_reply_deadline;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ChatError::deadline_exceeded("end_talk"));
            }
            match self.bridge.wait_for_message_timeout(remaining) {
                Some(BridgeMessage::Closed) => break,
                Some(BridgeMessage::Data(_)) => continue,
                None => return Err(ChatError::deadline_exceeded("end_talk")),
            }
        }

        self.peer_link.clear();
        self.bridge.set_state(TalkState::No);
        Ok(())
    }

    /// `exit`: log out cleanly and tear down (§4.4).
    ///
    /// # Errors
    ///
    /// Propagates a transport failure sending `EXIT`.
    pub fn exit(&self) -> Result<(), ChatError> {
        self.channel.send(&[ClientMessageType::Exit.to_byte()])?;
        self.bridge.force_release();
        self.channel.shutdown();
        Ok(())
    }

    /// Drain one decoded chat line from the bridge, if any is waiting.
    ///
    /// Returns `None` both when the bridge has nothing pending within
    /// `timeout` and when it has been force-released.
    #[must_use]
    pub fn drain_talk_message(&self, timeout: Duration) -> Option<String> {
        match self.bridge.wait_for_message_timeout(timeout) {
            Some(BridgeMessage::Data(bytes)) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            _ => None,
        }
    }

    /// Current talk state, for the input loop to decide what to prompt for.
    #[must_use]
    pub fn state(&self) -> TalkState {
        self.bridge.get_state()
    }

    /// The username of a pending peer-initiated talk request, if any,
    /// without consuming it — so the caller can prompt before deciding
    /// whether to [`Self::accept_pending_request`] or
    /// [`Self::refuse_pending_request`].
    #[must_use]
    pub fn peek_pending_request(&self) -> Option<String> {
        self.bridge.check_request().map(|r| r.peer)
    }
}

fn server_error_to_chat_error(sub: ErrorSubCode) -> ChatError {
    match sub {
        ErrorSubCode::WrongType => ChatError::wrong_state("server reported an unexpected message type"),
        ErrorSubCode::Generic => ChatError::Other("server reported an error".into()),
    }
}

/// Runs a peer handshake over the already-established server session:
/// handshake messages are framed as `TALKING` client messages and delivered
/// back through the bridge, since the reader thread is the socket's sole
/// reader. Before a peer session is installed the bridge's `inbox` is
/// otherwise idle, so this reuses it rather than adding a third slot.
struct TunneledHandshakeIo<'a> {
    channel: &'a SecureChannel,
    bridge: &'a ThreadBridge,
}

impl HandshakeIo for TunneledHandshakeIo<'_> {
    fn send(&mut self, bytes: &[u8]) -> Result<(), ChatError> {
        let mut frame = vec![ClientMessageType::Talking.to_byte()];
        frame.extend_from_slice(bytes);
        self.channel.send(&frame)
    }

    fn recv(&mut self, deadline: Instant) -> Result<Vec<u8>, ChatError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ChatError::deadline_exceeded("handshake"));
        }
        match self.bridge.wait_for_message_timeout(remaining) {
            Some(BridgeMessage::Data(bytes)) => Ok(bytes),
            Some(BridgeMessage::Closed) | None => Err(ChatError::deadline_exceeded("handshake")),
        }
    }
}
