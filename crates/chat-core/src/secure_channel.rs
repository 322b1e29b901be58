//! Secure Channel (SC) — authenticated, confidential framing (§4.1).
//!
//! [`SecureChannelCrypto`] is the pure framing-plus-cipher state: given a
//! 256-bit key and a direction-local counter pair, it turns plaintext into
//! self-describing frames and back, independent of any transport. The same
//! type backs both the server session and a tunneled peer session — for the
//! peer session, the caller is [`crate::talk_session`], not a socket.
//!
//! [`SecureChannel`] adds the socket plumbing: it owns a cloned
//! [`TcpStream`] and the send-mutex required by I3, so the reader thread and
//! the main thread can share one underlying file descriptor safely.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Mutex;

use chat_crypto::aead::{AeadKey, IV_LEN, KEY_LEN, TAG_LEN};
use chat_crypto::random::fill_random;

use crate::error::ChatError;

/// Default cap on a frame's declared length (§4.1): 16 MiB.
pub const DEFAULT_MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Length prefix size on the wire.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Counter size on the wire (also the AAD length).
pub const COUNTER_LEN: usize = 4;

/// The cryptographic half of a Secure Channel: key, counters, cap.
///
/// Reusable for any byte stream, whether it is the server session's socket
/// or a peer session tunneled through `TALKING` frames.
pub struct SecureChannelCrypto {
    key: AeadKey,
    send_counter: u32,
    recv_counter: u32,
    max_frame_len: u32,
}

impl SecureChannelCrypto {
    /// Construct a channel with fresh (zeroed) counters, per the Handshake
    /// Engine's output contract (§4.2: "counters zeroed").
    #[must_use]
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self::with_max_frame_len(key, DEFAULT_MAX_FRAME_LEN)
    }

    /// Construct a channel with a non-default frame-length cap.
    #[must_use]
    pub fn with_max_frame_len(key: [u8; KEY_LEN], max_frame_len: u32) -> Self {
        Self {
            key: AeadKey::new(key),
            send_counter: 0,
            recv_counter: 0,
            max_frame_len,
        }
    }

    /// Current send counter (tests and diagnostics only).
    #[must_use]
    pub fn send_counter(&self) -> u32 {
        self.send_counter
    }

    /// Current receive counter (tests and diagnostics only).
    #[must_use]
    pub fn recv_counter(&self) -> u32 {
        self.recv_counter
    }

    /// Encrypt `plaintext` into a frame body: IV ‖ counter ‖ ciphertext ‖ tag,
    /// without the 4-byte length prefix. Used by [`SecureChannel`], which
    /// writes the length prefix itself as part of the socket write.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::CounterOverflow`] if the send counter has been
    /// exhausted (§4.1 send operation, step a).
    pub fn seal_body(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, ChatError> {
        if self.send_counter == u32::MAX {
            return Err(ChatError::CounterOverflow);
        }

        let mut iv = [0u8; IV_LEN];
        fill_random(&mut iv).map_err(ChatError::from)?;
        let aad = self.send_counter.to_be_bytes();

        let ciphertext = self.key.encrypt(&iv, plaintext, &aad)?;

        let mut body = Vec::with_capacity(IV_LEN + COUNTER_LEN + ciphertext.len());
        body.extend_from_slice(&iv);
        body.extend_from_slice(&aad);
        body.extend_from_slice(&ciphertext);

        self.send_counter += 1;
        Ok(body)
    }

    /// Encrypt `plaintext` into a complete self-describing frame: the
    /// 4-byte length prefix followed by [`Self::seal_body`]'s output. Used
    /// to build a tunneled peer-session frame that is itself carried as the
    /// payload of a server-session `TALKING` frame.
    ///
    /// # Errors
    ///
    /// See [`Self::seal_body`].
    pub fn seal_framed(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, ChatError> {
        let body = self.seal_body(plaintext)?;
        let mut framed = Vec::with_capacity(LENGTH_PREFIX_LEN + body.len());
        framed.extend_from_slice(&(body.len() as u32).to_be_bytes());
        framed.extend_from_slice(&body);
        Ok(framed)
    }

    /// Decrypt a frame body (IV ‖ counter ‖ ciphertext ‖ tag, no length
    /// prefix), as already stripped of its length prefix by [`SecureChannel`]'s
    /// socket read.
    ///
    /// # Errors
    ///
    /// [`ChatError::ShortRead`] if `body` is too short to contain an IV,
    /// counter, and tag; [`ChatError::ReplayOrReorder`] if the counter does
    /// not match the expected next value; [`ChatError::AuthFailed`] if GCM
    /// authentication fails.
    pub fn open_body(&mut self, body: &[u8]) -> Result<Vec<u8>, ChatError> {
        if body.len() < IV_LEN + COUNTER_LEN + TAG_LEN {
            return Err(ChatError::ShortRead);
        }

        let (iv, rest) = body.split_at(IV_LEN);
        let (counter_bytes, ciphertext) = rest.split_at(COUNTER_LEN);

        let mut iv_arr = [0u8; IV_LEN];
        iv_arr.copy_from_slice(iv);
        let counter = u32::from_be_bytes(counter_bytes.try_into().unwrap());

        if counter != self.recv_counter {
            return Err(ChatError::ReplayOrReorder {
                expected: self.recv_counter,
                actual: counter,
            });
        }

        let plaintext = self.key.decrypt(&iv_arr, ciphertext, counter_bytes)?;
        self.recv_counter += 1;
        Ok(plaintext)
    }

    /// Decrypt a complete self-describing frame (length prefix included),
    /// as handed to the Network Reader Loop when unwrapping a tunneled peer
    /// frame carried inside a `TALKING` frame's plaintext.
    ///
    /// # Errors
    ///
    /// [`ChatError::ShortRead`] if `framed` is shorter than its declared
    /// length; [`ChatError::OversizedFrame`] if the declared length exceeds
    /// the configured cap; see [`Self::open_body`] for the remaining cases.
    pub fn open_framed(&mut self, framed: &[u8]) -> Result<Vec<u8>, ChatError> {
        if framed.len() < LENGTH_PREFIX_LEN {
            return Err(ChatError::ShortRead);
        }
        let (len_bytes, rest) = framed.split_at(LENGTH_PREFIX_LEN);
        let len = u32::from_be_bytes(len_bytes.try_into().unwrap());
        if len > self.max_frame_len {
            return Err(ChatError::OversizedFrame {
                len,
                cap: self.max_frame_len,
            });
        }
        if (rest.len() as u64) < u64::from(len) {
            return Err(ChatError::ShortRead);
        }
        self.open_body(&rest[..len as usize])
    }
}

/// A Secure Channel bound to a live TCP socket, serializing writes under a
/// send-mutex per I3.
pub struct SecureChannel {
    crypto: Mutex<SecureChannelCrypto>,
    write_half: Mutex<TcpStream>,
    read_half: Mutex<TcpStream>,
}

impl SecureChannel {
    /// Wrap `stream` (already connected) with a fresh crypto state.
    ///
    /// `stream` is cloned so the reader thread and the main thread can each
    /// hold an owned handle to the same socket (§5: "The server socket file
    /// descriptor is shared by main and reader; writes serialized by the
    /// send-mutex; reads performed only by reader.").
    ///
    /// # Errors
    ///
    /// Propagates the underlying `TcpStream::try_clone` I/O error.
    pub fn new(stream: TcpStream, key: [u8; KEY_LEN]) -> std::io::Result<Self> {
        let read_half = stream.try_clone()?;
        Ok(Self {
            crypto: Mutex::new(SecureChannelCrypto::new(key)),
            write_half: Mutex::new(stream),
            read_half: Mutex::new(read_half),
        })
    }

    /// Encrypt and send `plaintext` as one frame, serialized by the send-mutex.
    ///
    /// # Errors
    ///
    /// See [`SecureChannelCrypto::seal_body`]; also returns
    /// [`ChatError::WriteFailed`] if the socket write fails.
    pub fn send(&self, plaintext: &[u8]) -> Result<(), ChatError> {
        let body = self.crypto.lock().unwrap().seal_body(plaintext)?;
        let mut socket = self.write_half.lock().unwrap();
        let len = (body.len() as u32).to_be_bytes();
        socket
            .write_all(&len)
            .and_then(|()| socket.write_all(&body))
            .map_err(|e| ChatError::WriteFailed(e.to_string().into()))
    }

    /// Block until one full frame has been read from the socket, then
    /// decrypt and return its plaintext.
    ///
    /// # Errors
    ///
    /// [`ChatError::ShortRead`] on a closed or truncated connection;
    /// [`ChatError::OversizedFrame`] if the declared length exceeds the cap;
    /// see [`SecureChannelCrypto::open_body`] for the remaining cases.
    pub fn recv(&self) -> Result<Vec<u8>, ChatError> {
        let mut socket = self.read_half.lock().unwrap();

        let mut len_bytes = [0u8; LENGTH_PREFIX_LEN];
        socket
            .read_exact(&mut len_bytes)
            .map_err(|_| ChatError::ShortRead)?;
        let len = u32::from_be_bytes(len_bytes);

        let max_frame_len = {
            let crypto = self.crypto.lock().unwrap();
            crypto.max_frame_len
        };
        if len > max_frame_len {
            return Err(ChatError::OversizedFrame {
                len,
                cap: max_frame_len,
            });
        }

        let mut body = vec![0u8; len as usize];
        socket.read_exact(&mut body).map_err(|_| ChatError::ShortRead)?;
        drop(socket);

        self.crypto.lock().unwrap().open_body(&body)
    }

    /// Shut down both halves of the socket, unblocking a thread parked in
    /// [`Self::recv`] (§9's sentinel + socket-shutdown force-release combination).
    pub fn shutdown(&self) {
        let _ = self.write_half.lock().unwrap().shutdown(Shutdown::Both);
    }
}
