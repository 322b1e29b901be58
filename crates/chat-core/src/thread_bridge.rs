//! Thread Bridge (TB) — coordination between the reader and main threads (§4.3).
//!
//! Built directly on [`crate::sync`]'s generic primitives: `inbox` is a
//! [`OneSlot`], `request` is a [`NonBlockingCell`], and `talk_state` is a
//! plain atomic (§9: "a bounded (capacity 1) channel for `inbox`, an atomic
//! cell for `request`, and an atomic for `talk_state`").

use std::sync::atomic::{AtomicU8, Ordering};

use crate::sync::{NonBlockingCell, OneSlot};

/// The shared talk state (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TalkState {
    /// No active or pending talk.
    No,
    /// A talk is live; chat lines flow in both directions.
    Yes,
    /// End-of-talk has been initiated; waiting for the server's echo.
    Closing,
    /// Unrecoverable error observed on the server session.
    Err,
}

impl TalkState {
    fn to_byte(self) -> u8 {
        match self {
            TalkState::No => 0,
            TalkState::Yes => 1,
            TalkState::Closing => 2,
            TalkState::Err => 3,
        }
    }

    fn from_byte(byte: u8) -> Self {
        match byte {
            1 => TalkState::Yes,
            2 => TalkState::Closing,
            3 => TalkState::Err,
            _ => TalkState::No,
        }
    }
}

/// Outcome of [`ThreadBridge::add_request`] (§4.3: "accepts only if slot
/// empty and state is NO").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The request was queued for the main thread to see.
    Accepted,
    /// The slot was occupied, or the state was not NO; the caller must
    /// refuse the incoming talk request.
    Rejected,
}

/// A peer-initiated talk request, carrying the key material needed to run
/// the handshake as responder without a separate lookup round trip (the
/// peer's public key rides along with `REQUEST_TO_TALK`; see
/// [`chat_crypto::keystore::KeyStore::remember_peer_pub`]).
#[derive(Debug, Clone)]
pub struct PendingTalkRequest {
    /// The requesting peer's username.
    pub peer: String,
    /// The requesting peer's signing public key, SPKI DER-encoded.
    pub peer_pubkey_der: Vec<u8>,
}

/// A peer-session plaintext message, or the sentinel the reader installs on
/// shutdown (§4.3 `force_release`: "a sentinel empty message so a blocked
/// consumer returns with a NULL result").
#[derive(Debug, Clone)]
pub enum BridgeMessage {
    /// Plaintext bytes recovered from a decrypted peer-session frame.
    Data(Vec<u8>),
    /// Installed by `force_release`; the consumer treats this as "no message,
    /// the bridge is shutting down" rather than real talk content.
    Closed,
}

/// The synchronization object shared between the reader thread (NRL) and the
/// main thread (TSC).
pub struct ThreadBridge {
    inbox: OneSlot<BridgeMessage>,
    request: NonBlockingCell<PendingTalkRequest>,
    talk_state: AtomicU8,
}

impl ThreadBridge {
    /// Create a bridge with state `NO` and both slots empty.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inbox: OneSlot::new(),
            request: NonBlockingCell::new(),
            talk_state: AtomicU8::new(TalkState::No.to_byte()),
        }
    }

    /// Block until `inbox` is non-empty, then atomically drain and signal the producer.
    #[must_use]
    pub fn wait_for_message(&self) -> Option<BridgeMessage> {
        self.inbox.take()
    }

    /// Like [`Self::wait_for_message`], but gives up after `timeout`.
    #[must_use]
    pub fn wait_for_message_timeout(&self, timeout: std::time::Duration) -> Option<BridgeMessage> {
        self.inbox.take_timeout(timeout)
    }

    /// Store `bytes` into `inbox`, blocking until any prior message has been consumed.
    ///
    /// Returns `false` if the bridge has been released (the reader should stop).
    pub fn notify_message(&self, bytes: Vec<u8>) -> bool {
        self.inbox.put(BridgeMessage::Data(bytes))
    }

    /// Push the `Closed` sentinel into `inbox` without touching `talk_state`,
    /// waking a blocked consumer (used on `SERVER_END_TALK`, which transitions
    /// the state to `NO` rather than `ERR`, unlike `force_release`).
    pub fn notify_message_sentinel(&self) -> bool {
        self.inbox.put(BridgeMessage::Closed)
    }

    /// Return the currently pending talk request, if any, without blocking.
    #[must_use]
    pub fn check_request(&self) -> Option<PendingTalkRequest> {
        self.request.peek()
    }

    /// Remove and return the currently pending talk request, if any.
    #[must_use]
    pub fn take_request(&self) -> Option<PendingTalkRequest> {
        self.request.take()
    }

    /// Queue `request` as a pending talk request.
    ///
    /// Accepts only if the slot is empty and `talk_state` is `NO` (P6).
    pub fn add_request(&self, request: PendingTalkRequest) -> RequestOutcome {
        if self.get_state() != TalkState::No {
            return RequestOutcome::Rejected;
        }
        if self.request.try_insert(request) {
            RequestOutcome::Accepted
        } else {
            RequestOutcome::Rejected
        }
    }

    /// Read the current talk state (sequentially consistent).
    #[must_use]
    pub fn get_state(&self) -> TalkState {
        TalkState::from_byte(self.talk_state.load(Ordering::SeqCst))
    }

    /// Set the current talk state (sequentially consistent).
    pub fn set_state(&self, state: TalkState) {
        self.talk_state.store(state.to_byte(), Ordering::SeqCst);
    }

    /// Shut down the bridge: set state to `ERR`, install the `Closed`
    /// sentinel so a blocked consumer wakes with a non-data result, and wake
    /// all waiters. No further operation is valid after this call.
    pub fn force_release(&self) {
        self.set_state(TalkState::Err);
        self.inbox.force_release(Some(BridgeMessage::Closed));
    }
}

impl Default for ThreadBridge {
    fn default() -> Self {
        Self::new()
    }
}
