//! Network Reader Loop (NRL) — §4.5.
//!
//! The sole consumer of the server socket's read half. Runs from login to
//! exit on its own thread, classifying every decrypted server-session frame
//! by its first plaintext byte and routing it to whichever of TSC's two
//! inboxes (the one-slot reply channel, or the Thread Bridge) is the right
//! destination.

use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::error::ChatError;
use crate::protocol::{ClientMessageType, ErrorSubCode, ServerMessageType};
use crate::secure_channel::{SecureChannel, SecureChannelCrypto};
use crate::sync::OneSlot;
use crate::thread_bridge::{BridgeMessage, PendingTalkRequest, RequestOutcome, TalkState, ThreadBridge};

/// Reply to an outstanding control request, delivered outside the Thread
/// Bridge (§4.5: "replies to outstanding control requests, delivered to TSC
/// via a one-slot reply channel, not TB").
#[derive(Debug, Clone)]
pub enum ServerReply {
    /// Success; payload carries any reply body (e.g. the `show` listing).
    Ok(Vec<u8>),
    /// Failure; carries the sub-code from §6.
    Error(ErrorSubCode),
}

/// Holds the peer-session crypto state while a talk is live.
///
/// Shared between the main thread, which installs it once the peer
/// handshake completes and clears it on `END_TALK`, and the reader thread,
/// which uses it to open and the main thread which uses it to seal tunneled
/// frames.
#[derive(Default)]
pub struct PeerLink {
    crypto: Mutex<Option<SecureChannelCrypto>>,
}

impl PeerLink {
    /// Create an empty link (no active peer session).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly negotiated peer-session key, replacing any prior one.
    pub fn install(&self, crypto: SecureChannelCrypto) {
        *self.crypto.lock().unwrap() = Some(crypto);
    }

    /// Tear down the peer session.
    pub fn clear(&self) {
        *self.crypto.lock().unwrap() = None;
    }

    /// Whether a peer session is currently installed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.crypto.lock().unwrap().is_some()
    }

    /// Decrypt a tunneled peer-session frame using the installed key.
    ///
    /// Returns `Ok(None)` if no peer session is installed — a `TALKING`
    /// frame arriving outside an active talk, which the caller treats as a
    /// protocol anomaly rather than an SC failure on the server session.
    pub fn open(&self, framed: &[u8]) -> Result<Option<Vec<u8>>, ChatError> {
        let mut guard = self.crypto.lock().unwrap();
        match guard.as_mut() {
            Some(crypto) => crypto.open_framed(framed).map(Some),
            None => Ok(None),
        }
    }

    /// Encrypt a plaintext chat line for tunneling inside a server-session frame.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Option<Vec<u8>>, ChatError> {
        let mut guard = self.crypto.lock().unwrap();
        match guard.as_mut() {
            Some(crypto) => crypto.seal_framed(plaintext).map(Some),
            None => Ok(None),
        }
    }
}

/// The reader thread's state: the server-session channel, the bridge it
/// feeds, the one-slot reply channel, and the shared peer link.
pub struct NetworkReader {
    channel: Arc<SecureChannel>,
    bridge: Arc<ThreadBridge>,
    replies: Arc<OneSlot<ServerReply>>,
    peer_link: Arc<PeerLink>,
}

impl NetworkReader {
    /// Build a reader bound to the given server-session channel and shared state.
    #[must_use]
    pub fn new(
        channel: Arc<SecureChannel>,
        bridge: Arc<ThreadBridge>,
        replies: Arc<OneSlot<ServerReply>>,
        peer_link: Arc<PeerLink>,
    ) -> Self {
        Self {
            channel,
            bridge,
            replies,
            peer_link,
        }
    }

    /// Run until the server session fails or is torn down.
    ///
    /// On any fatal error this forces the bridge and reply channel released
    /// and returns; per §7, all transport and cryptographic errors observed
    /// on the server session are fatal.
    pub fn run(&self) {
        loop {
            let frame = match self.channel.recv() {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(error = %err, "server session read failed, tearing down");
                    self.shut_down();
                    return;
                }
            };

            if let Err(err) = self.dispatch(&frame) {
                if err.is_fatal_on_server_session() {
                    warn!(error = %err, "fatal error on server session, tearing down");
                    self.shut_down();
                    return;
                }
                warn!(error = %err, "non-fatal protocol error dispatching server frame");
            }
        }
    }

    fn shut_down(&self) {
        self.bridge.force_release();
        self.replies.force_release(None);
    }

    fn dispatch(&self, frame: &[u8]) -> Result<(), ChatError> {
        let (&type_byte, payload) = frame.split_first().ok_or(ChatError::ShortRead)?;
        match ServerMessageType::from_byte(type_byte)? {
            ServerMessageType::Ok => {
                self.replies.put(ServerReply::Ok(payload.to_vec()));
            }
            ServerMessageType::Error => {
                let sub_code = payload
                    .first()
                    .copied()
                    .map(ErrorSubCode::from_byte)
                    .unwrap_or(ErrorSubCode::Generic);
                self.replies.put(ServerReply::Error(sub_code));
            }
            ServerMessageType::RequestToTalk => {
                // Payload: 4-byte BE username length, the username, then the
                // requesting peer's signing public key (SPKI DER) — bundled
                // here rather than fetched by a separate lookup message, so
                // the responder can run the handshake without one (§9:
                // `KeyStore::fetch_peer_pub` is populated from this, not
                // from a dedicated wire round trip).
                if payload.len() < 4 {
                    return Err(ChatError::ShortRead);
                }
                let (len_bytes, rest) = payload.split_at(4);
                let username_len = u32::from_be_bytes(len_bytes.try_into().unwrap()) as usize;
                if rest.len() < username_len {
                    return Err(ChatError::ShortRead);
                }
                let (username_bytes, pubkey_der) = rest.split_at(username_len);
                let peer = String::from_utf8_lossy(username_bytes).into_owned();
                let request = PendingTalkRequest {
                    peer: peer.clone(),
                    peer_pubkey_der: pubkey_der.to_vec(),
                };
                if self.bridge.add_request(request) == RequestOutcome::Rejected {
                    self.auto_refuse(&peer)?;
                }
            }
            ServerMessageType::EndTalk => {
                let state = self.bridge.get_state();
                if matches!(state, TalkState::Yes | TalkState::Closing) {
                    self.bridge.set_state(TalkState::No);
                    self.peer_link.clear();
                    self.bridge.notify_message_sentinel();
                }
            }
            ServerMessageType::Talking => {
                // Once a peer session is installed this is chat ciphertext,
                // decrypted under the peer key before reaching the bridge.
                // Before that (mid peer-handshake) the bridge is otherwise
                // idle, so the raw handshake bytes ride the same inbox.
                match self.peer_link.open(payload)? {
                    Some(plaintext) => {
                        self.bridge.notify_message(plaintext);
                    }
                    None => {
                        self.bridge.notify_message(payload.to_vec());
                    }
                }
            }
        }
        Ok(())
    }

    /// Auto-refuse a peer's talk request that arrived while one was already
    /// pending or a talk was already live (scenario 3, P6).
    fn auto_refuse(&self, peer: &str) -> Result<(), ChatError> {
        let mut body = vec![ClientMessageType::RefuseTalk.to_byte()];
        body.extend_from_slice(peer.as_bytes());
        self.channel.send(&body)
    }
}
