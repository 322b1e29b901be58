//! Handshake Engine (HSE) — the Station-to-Station key exchange (§4.2).
//!
//! Ephemeral key agreement is finite-field Diffie-Hellman over the fixed
//! 2048-bit safe-prime group the original source loaded via OpenSSL's
//! built-in DH parameters ([`chat_crypto::dh`]), authenticated by each
//! side's long-term RSA-PSS signature over the transcript.
//!
//! The same engine runs in both directions: client↔server (the client is
//! always the initiator there, authenticating the server's identity via its
//! CA-issued certificate) and client↔client (either role, authenticating the
//! peer's identity via a public key fetched out of band over the server
//! session, per [`chat_crypto::keystore::KeyStore::fetch_peer_pub`]).

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use chat_crypto::aead::{AeadKey, IV_LEN};
use chat_crypto::certs::CertificateStore;
use chat_crypto::dh::{PrivateKey as DhPrivateKey, PublicKey as DhPublicKey, DH_PUBLIC_LEN};
use chat_crypto::hash::derive_session_key;
use chat_crypto::random::fill_random;
use chat_crypto::rsa_signing::{SigningKey, VerifyingKey};

use crate::error::ChatError;

/// Total deadline for a handshake, from first send to `READY` (§4.2, §5).
pub const HANDSHAKE_DEADLINE: Duration = Duration::from_secs(30);

/// Associated data bound to every handshake-message encryption (§4.2: "handshake tag `0x00`").
const HANDSHAKE_AAD: [u8; 1] = [0x00];

const MAX_HANDSHAKE_MESSAGE_LEN: u32 = 1024 * 1024;

/// Framed byte exchange the Handshake Engine runs over. A raw socket before
/// any session key exists, so there is no Secure Channel framing here — just
/// a 4-byte big-endian length prefix per message.
pub trait HandshakeIo {
    /// Send one length-prefixed handshake message.
    fn send(&mut self, bytes: &[u8]) -> Result<(), ChatError>;

    /// Block until one length-prefixed handshake message arrives, or until
    /// `deadline` passes.
    fn recv(&mut self, deadline: Instant) -> Result<Vec<u8>, ChatError>;
}

impl HandshakeIo for TcpStream {
    fn send(&mut self, bytes: &[u8]) -> Result<(), ChatError> {
        let len = (bytes.len() as u32).to_be_bytes();
        self.write_all(&len)
            .and_then(|()| self.write_all(bytes))
            .map_err(|e| ChatError::WriteFailed(e.to_string().into()))
    }

    fn recv(&mut self, deadline: Instant) -> Result<Vec<u8>, ChatError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ChatError::deadline_exceeded("handshake"));
        }
        self.set_read_timeout(Some(remaining))
            .map_err(|e| ChatError::WriteFailed(e.to_string().into()))?;

        let mut len_bytes = [0u8; 4];
        read_timing_out(self, &mut len_bytes)?;
        let len = u32::from_be_bytes(len_bytes);
        if len > MAX_HANDSHAKE_MESSAGE_LEN {
            return Err(ChatError::OversizedFrame {
                len,
                cap: MAX_HANDSHAKE_MESSAGE_LEN,
            });
        }

        let mut body = vec![0u8; len as usize];
        read_timing_out(self, &mut body)?;
        Ok(body)
    }
}

fn read_timing_out(stream: &mut TcpStream, buf: &mut [u8]) -> Result<(), ChatError> {
    stream.read_exact(buf).map_err(|e| {
        if matches!(
            e.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ) {
            ChatError::deadline_exceeded("handshake")
        } else {
            ChatError::ShortRead
        }
    })
}

/// Which role this side plays in the exchange (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A: sends M1 and M3, verifies M2.
    Initiator,
    /// B: sends M2, verifies M1's claimed username and M3.
    Responder,
}

/// The identity credential a responder presents in M2.
pub enum Credential {
    /// A CA-issued certificate (DER), used by the server case.
    Certificate(Vec<u8>),
    /// A bare signing public key (SPKI DER), used by the peer case —
    /// the initiator already holds the expected key via
    /// [`chat_crypto::keystore::KeyStore::fetch_peer_pub`] and compares bitwise.
    RawKey(Vec<u8>),
}

/// How the initiator authenticates the responder's M2 credential.
pub enum PeerIdentityCheck<'a> {
    /// Verify a certificate against a CA store (server case).
    ViaCa(&'a CertificateStore),
    /// Compare a raw key bitwise against an already-known key (peer case).
    ViaKnownKey(VerifyingKey),
}

/// The result of a completed handshake: a ready Secure Channel key and the
/// peer's confirmed username.
pub struct HandshakeOutcome {
    /// The username the other party proved ownership of.
    pub peer_username: String,
    /// The 256-bit key to hand to a new [`crate::secure_channel::SecureChannelCrypto`].
    pub session_key: [u8; 32],
}

/// Run the initiator side of the handshake (A in §4.2's state machine).
///
/// # Errors
///
/// [`ChatError::SignatureInvalid`] if the responder's M2 signature fails to
/// verify; [`ChatError::CertificateInvalid`] or [`ChatError::Revoked`] if the
/// CA check fails; [`ChatError::DeadlineExceeded`] if `handshake_deadline`
/// elapses before `READY`; transport errors on I/O failure.
pub fn run_initiator(
    io: &mut dyn HandshakeIo,
    my_username: &str,
    my_signing_key: &SigningKey,
    expected_peer_username: &str,
    identity_check: PeerIdentityCheck<'_>,
    handshake_deadline: Duration,
) -> Result<HandshakeOutcome, ChatError> {
    let deadline = Instant::now() + handshake_deadline;

    // SENT_M1
    let my_ephemeral = DhPrivateKey::generate(&mut rand_core::OsRng);
    let g_a = my_ephemeral.public_key().to_bytes();
    let mut m1 = Vec::with_capacity(DH_PUBLIC_LEN + my_username.len());
    m1.extend_from_slice(&g_a);
    m1.extend_from_slice(my_username.as_bytes());
    io.send(&m1)?;

    // RECV_M2
    let m2 = io.recv(deadline)?;
    if m2.len() < DH_PUBLIC_LEN + IV_LEN {
        return Err(ChatError::ShortRead);
    }
    let (g_b_bytes, rest) = m2.split_at(DH_PUBLIC_LEN);
    let mut g_b_arr = [0u8; DH_PUBLIC_LEN];
    g_b_arr.copy_from_slice(g_b_bytes);
    let g_b = DhPublicKey::from_bytes(g_b_arr);

    let shared = my_ephemeral
        .exchange(&g_b)
        .ok_or_else(|| ChatError::CertificateInvalid("low-order peer public key".into()))?;
    let session_key = derive_session_key(shared.as_bytes());
    let aead = AeadKey::new(session_key);

    let (iv_bytes, ciphertext) = rest.split_at(IV_LEN);
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(iv_bytes);
    let plaintext = aead.decrypt(&iv, ciphertext, &HANDSHAKE_AAD)?;

    let (credential, signature) = decode_m2_plaintext(&plaintext)?;

    let transcript_b = handshake_transcript(&g_b_arr, &g_a);
    let responder_key = verify_m2_credential(
        expected_peer_username,
        &credential,
        &identity_check,
    )?;
    responder_key.verify(&transcript_b, &signature)?;

    // SENT_M3
    let transcript_a = handshake_transcript(&g_a, &g_b_arr);
    let sig_a = my_signing_key.sign(&transcript_a);
    let mut iv3 = [0u8; IV_LEN];
    fill_random(&mut iv3)?;
    let ct3 = aead.encrypt(&iv3, &sig_a, &HANDSHAKE_AAD)?;
    let mut m3 = Vec::with_capacity(IV_LEN + ct3.len());
    m3.extend_from_slice(&iv3);
    m3.extend_from_slice(&ct3);
    io.send(&m3)?;

    Ok(HandshakeOutcome {
        peer_username: expected_peer_username.to_string(),
        session_key,
    })
}

/// Run the responder side of the handshake (B in §4.2's state machine).
///
/// This client only ever plays the responder role in the peer case (when
/// accepting an incoming talk request), so `my_credential` is always a raw
/// key in practice, but the [`Credential`] type is kept general to mirror
/// the wire message shape.
///
/// # Errors
///
/// [`ChatError::SignatureInvalid`] if M1's claimed initiator fails M3
/// verification; [`ChatError::DeadlineExceeded`] if `handshake_deadline`
/// elapses; transport errors on I/O failure.
pub fn run_responder(
    io: &mut dyn HandshakeIo,
    my_signing_key: &SigningKey,
    my_credential: Credential,
    initiator_key: VerifyingKey,
    handshake_deadline: Duration,
) -> Result<HandshakeOutcome, ChatError> {
    let deadline = Instant::now() + handshake_deadline;

    // RECV_M1
    let m1 = io.recv(deadline)?;
    if m1.len() < DH_PUBLIC_LEN {
        return Err(ChatError::ShortRead);
    }
    let (g_a_bytes, username_bytes) = m1.split_at(DH_PUBLIC_LEN);
    let mut g_a_arr = [0u8; DH_PUBLIC_LEN];
    g_a_arr.copy_from_slice(g_a_bytes);
    let g_a = DhPublicKey::from_bytes(g_a_arr);
    let peer_username = String::from_utf8(username_bytes.to_vec())
        .map_err(|_| ChatError::bad_username("non-UTF-8 username in M1"))?;

    // SENT_M2
    let my_ephemeral = DhPrivateKey::generate(&mut rand_core::OsRng);
    let g_b = my_ephemeral.public_key().to_bytes();

    let shared = my_ephemeral
        .exchange(&g_a)
        .ok_or_else(|| ChatError::CertificateInvalid("low-order peer public key".into()))?;
    let session_key = derive_session_key(shared.as_bytes());
    let aead = AeadKey::new(session_key);

    let transcript_b = handshake_transcript(&g_b, &g_a_arr);
    let sig_b = my_signing_key.sign(&transcript_b);
    let plaintext = encode_m2_plaintext(&my_credential, &sig_b);

    let mut iv2 = [0u8; IV_LEN];
    fill_random(&mut iv2)?;
    let ct2 = aead.encrypt(&iv2, &plaintext, &HANDSHAKE_AAD)?;

    let mut m2 = Vec::with_capacity(DH_PUBLIC_LEN + IV_LEN + ct2.len());
    m2.extend_from_slice(&g_b);
    m2.extend_from_slice(&iv2);
    m2.extend_from_slice(&ct2);
    io.send(&m2)?;

    // RECV_M3
    let m3 = io.recv(deadline)?;
    if m3.len() < IV_LEN {
        return Err(ChatError::ShortRead);
    }
    let (iv3_bytes, ct3) = m3.split_at(IV_LEN);
    let mut iv3 = [0u8; IV_LEN];
    iv3.copy_from_slice(iv3_bytes);
    let sig_a = aead.decrypt(&iv3, ct3, &HANDSHAKE_AAD)?;

    let transcript_a = handshake_transcript(&g_a_arr, &g_b);
    initiator_key.verify(&transcript_a, &sig_a)?;

    Ok(HandshakeOutcome {
        peer_username,
        session_key,
    })
}

fn handshake_transcript(first: &[u8; DH_PUBLIC_LEN], second: &[u8; DH_PUBLIC_LEN]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + 2 * DH_PUBLIC_LEN);
    out.extend_from_slice(&(DH_PUBLIC_LEN as u32).to_be_bytes());
    out.extend_from_slice(first);
    out.extend_from_slice(&(DH_PUBLIC_LEN as u32).to_be_bytes());
    out.extend_from_slice(second);
    out
}

fn encode_m2_plaintext(credential: &Credential, signature: &[u8]) -> Vec<u8> {
    let (tag, credential_bytes): (u8, &[u8]) = match credential {
        Credential::Certificate(der) => (0x00, der),
        Credential::RawKey(der) => (0x01, der),
    };
    let mut out = Vec::with_capacity(1 + 4 + signature.len() + credential_bytes.len());
    out.push(tag);
    out.extend_from_slice(&(signature.len() as u32).to_be_bytes());
    out.extend_from_slice(signature);
    out.extend_from_slice(credential_bytes);
    out
}

fn decode_m2_plaintext(plaintext: &[u8]) -> Result<(Credential, Vec<u8>), ChatError> {
    if plaintext.len() < 5 {
        return Err(ChatError::ShortRead);
    }
    let tag = plaintext[0];
    let sig_len = u32::from_be_bytes(plaintext[1..5].try_into().unwrap()) as usize;
    if plaintext.len() < 5 + sig_len {
        return Err(ChatError::ShortRead);
    }
    let signature = plaintext[5..5 + sig_len].to_vec();
    let credential_bytes = plaintext[5 + sig_len..].to_vec();
    let credential = match tag {
        0x00 => Credential::Certificate(credential_bytes),
        _ => Credential::RawKey(credential_bytes),
    };
    Ok((credential, signature))
}

fn verify_m2_credential(
    expected_username: &str,
    credential: &Credential,
    identity_check: &PeerIdentityCheck<'_>,
) -> Result<VerifyingKey, ChatError> {
    match (credential, identity_check) {
        (Credential::Certificate(der), PeerIdentityCheck::ViaCa(store)) => {
            Ok(store.verify_binding(expected_username, der)?)
        }
        (Credential::RawKey(der), PeerIdentityCheck::ViaKnownKey(expected_key)) => {
            let presented = VerifyingKey::from_public_key_der(der)?;
            if presented == *expected_key {
                Ok(presented)
            } else {
                Err(ChatError::CertificateInvalid(
                    "presented key does not match the key on record".into(),
                ))
            }
        }
        _ => Err(ChatError::CertificateInvalid(
            "credential kind does not match the configured identity check".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::RsaPrivateKey;
    use std::sync::mpsc::{self, Receiver, Sender};

    fn fresh_signing_key() -> SigningKey {
        let private = RsaPrivateKey::new(&mut OsRng, 2048).unwrap();
        let pem = private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        SigningKey::from_pkcs8_pem(&pem).unwrap()
    }

    /// In-memory duplex transport for exercising both handshake roles
    /// within a single test process.
    struct Duplex {
        tx: Sender<Vec<u8>>,
        rx: Receiver<Vec<u8>>,
    }

    fn duplex_pair() -> (Duplex, Duplex) {
        let (tx_a, rx_a) = mpsc::channel();
        let (tx_b, rx_b) = mpsc::channel();
        (Duplex { tx: tx_a, rx: rx_b }, Duplex { tx: tx_b, rx: rx_a })
    }

    impl HandshakeIo for Duplex {
        fn send(&mut self, bytes: &[u8]) -> Result<(), ChatError> {
            self.tx
                .send(bytes.to_vec())
                .map_err(|_| ChatError::write_failed("peer disconnected"))
        }

        fn recv(&mut self, deadline: Instant) -> Result<Vec<u8>, ChatError> {
            let remaining = deadline.saturating_duration_since(Instant::now());
            self.rx
                .recv_timeout(remaining)
                .map_err(|_| ChatError::deadline_exceeded("handshake"))
        }
    }

    #[test]
    fn matched_peer_handshake_round_trips_and_agrees_on_key() {
        let (mut alice_io, mut bob_io) = duplex_pair();
        let alice_key = fresh_signing_key();
        let bob_key = fresh_signing_key();
        let alice_verifying = alice_key.verifying_key();
        let bob_verifying = bob_key.verifying_key();
        let bob_public_der = bob_verifying.to_public_key_der().unwrap();

        let bob_thread = std::thread::spawn(move || {
            run_responder(
                &mut bob_io,
                &bob_key,
                Credential::RawKey(bob_public_der),
                alice_verifying,
                HANDSHAKE_DEADLINE,
            )
        });

        let alice_outcome = run_initiator(
            &mut alice_io,
            "alice",
            &alice_key,
            "bob",
            PeerIdentityCheck::ViaKnownKey(bob_verifying),
            HANDSHAKE_DEADLINE,
        )
        .unwrap();

        let bob_outcome = bob_thread.join().unwrap().unwrap();

        assert_eq!(alice_outcome.peer_username, "bob");
        assert_eq!(bob_outcome.peer_username, "alice");
        assert_eq!(alice_outcome.session_key, bob_outcome.session_key);
    }

    #[test]
    fn forged_signature_under_unrelated_key_is_rejected() {
        let (mut alice_io, mut bob_io) = duplex_pair();
        let alice_key = fresh_signing_key();
        let bob_key = fresh_signing_key();
        let unrelated_key = fresh_signing_key();

        // bob signs with a key different from the one alice expects
        let bob_public_der = bob_key.verifying_key().to_public_key_der().unwrap();
        let expected_key = unrelated_key.verifying_key();

        let alice_thread = std::thread::spawn(move || {
            run_initiator(
                &mut alice_io,
                "alice",
                &alice_key,
                "bob",
                PeerIdentityCheck::ViaKnownKey(expected_key),
                HANDSHAKE_DEADLINE,
            )
        });

        let _ = run_responder(
            &mut bob_io,
            &bob_key,
            Credential::RawKey(bob_public_der),
            fresh_signing_key().verifying_key(),
            HANDSHAKE_DEADLINE,
        );

        let result = alice_thread.join().unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn deadline_exceeded_when_responder_never_replies() {
        let (mut alice_io, _bob_io) = duplex_pair();
        let alice_key = fresh_signing_key();
        let expected_key = fresh_signing_key().verifying_key();

        // override the deadline indirectly: Duplex::recv already honors
        // whatever deadline run_initiator computes, so with no responder
        // listening the recv_timeout will itself elapse once 30s pass.
        // To keep this test fast, we exercise the recv() timeout path
        // directly instead of waiting out the real 30-second deadline.
        let soon = Instant::now() + Duration::from_millis(20);
        let result = alice_io.recv(soon);
        assert!(matches!(result, Err(ChatError::DeadlineExceeded(_))));
        let _ = alice_key;
        let _ = expected_key;
    }

    #[test]
    fn server_case_via_ca_store_rejects_uncertified_key() {
        // a RawKey credential can never satisfy a ViaCa check: the two
        // identity-check modes are not interchangeable regardless of what
        // the CA store itself contains.
        let bob_key = fresh_signing_key();
        let bob_public_der = bob_key.verifying_key().to_public_key_der().unwrap();
        let ca = self_signed_ca("test-ca");
        let crl_der = empty_crl("test-ca", &ca.signing);
        let store = CertificateStore::new(&ca.cert_der, &crl_der).unwrap();

        let result = verify_m2_credential(
            "bob",
            &Credential::RawKey(bob_public_der),
            &PeerIdentityCheck::ViaCa(&store),
        );
        assert!(result.is_err());
    }

    #[test]
    fn server_case_via_ca_store_round_trips_with_a_properly_signed_certificate() {
        let (mut alice_io, mut bob_io) = duplex_pair();
        let alice_key = fresh_signing_key();
        let alice_verifying = alice_key.verifying_key();

        let ca = self_signed_ca("test-ca");
        let crl_der = empty_crl("test-ca", &ca.signing);
        let (bob_signing, bob_spki) = fresh_signing_key_and_spki();
        let bob_tbs = build_tbs_certificate(42, "test-ca", "bob", &bob_spki);
        let bob_cert_der = build_certificate(&bob_tbs, &ca.signing.sign(&bob_tbs));

        let bob_thread = std::thread::spawn(move || {
            run_responder(
                &mut bob_io,
                &bob_signing,
                Credential::Certificate(bob_cert_der),
                alice_verifying,
                HANDSHAKE_DEADLINE,
            )
        });

        let store = CertificateStore::new(&ca.cert_der, &crl_der).unwrap();
        let alice_outcome = run_initiator(
            &mut alice_io,
            "alice",
            &alice_key,
            "bob",
            PeerIdentityCheck::ViaCa(&store),
            HANDSHAKE_DEADLINE,
        )
        .unwrap();

        let bob_outcome = bob_thread.join().unwrap().unwrap();
        assert_eq!(alice_outcome.peer_username, "bob");
        assert_eq!(alice_outcome.session_key, bob_outcome.session_key);
    }

    #[test]
    fn server_case_via_ca_store_rejects_revoked_certificate() {
        let (mut alice_io, mut bob_io) = duplex_pair();

        let ca = self_signed_ca("test-ca");
        let revoked_tbs = build_tbs_cert_list("test-ca", &[42]);
        let revoked_crl_der = build_crl(&revoked_tbs, &ca.signing.sign(&revoked_tbs));
        let (bob_signing, bob_spki) = fresh_signing_key_and_spki();
        let bob_tbs = build_tbs_certificate(42, "test-ca", "bob", &bob_spki);
        let bob_cert_der = build_certificate(&bob_tbs, &ca.signing.sign(&bob_tbs));

        let bob_thread = std::thread::spawn(move || {
            run_responder(
                &mut bob_io,
                &bob_signing,
                Credential::Certificate(bob_cert_der),
                fresh_signing_key().verifying_key(),
                Duration::from_millis(200),
            )
        });

        let store = CertificateStore::new(&ca.cert_der, &revoked_crl_der).unwrap();
        let result = run_initiator(
            &mut alice_io,
            "alice",
            &fresh_signing_key(),
            "bob",
            PeerIdentityCheck::ViaCa(&store),
            HANDSHAKE_DEADLINE,
        );

        assert!(matches!(result, Err(ChatError::Revoked)));
        let _ = bob_thread.join();
    }

    // A minimal hand-rolled DER encoder for the X.509/CRL structures these
    // tests need (RFC 5280); see `chat_crypto::certs`'s own test module for
    // the same encoder exercising `CertificateStore::verify_binding` directly.

    fn encode_len(len: usize) -> Vec<u8> {
        if len < 0x80 {
            vec![len as u8]
        } else {
            let mut digits = Vec::new();
            let mut n = len;
            while n > 0 {
                digits.insert(0, (n & 0xff) as u8);
                n >>= 8;
            }
            let mut out = vec![0x80 | digits.len() as u8];
            out.extend(digits);
            out
        }
    }

    fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
        let mut out = vec![tag];
        out.extend(encode_len(content.len()));
        out.extend_from_slice(content);
        out
    }

    fn der_sequence(parts: &[Vec<u8>]) -> Vec<u8> {
        tlv(0x30, &parts.concat())
    }

    fn der_set(parts: &[Vec<u8>]) -> Vec<u8> {
        tlv(0x31, &parts.concat())
    }

    fn der_integer_u64(value: u64) -> Vec<u8> {
        let mut bytes = value.to_be_bytes().to_vec();
        while bytes.len() > 1 && bytes[0] == 0 {
            bytes.remove(0);
        }
        if bytes[0] & 0x80 != 0 {
            bytes.insert(0, 0);
        }
        tlv(0x02, &bytes)
    }

    fn base128(mut value: u64) -> Vec<u8> {
        let mut chunks = vec![(value & 0x7f) as u8];
        value >>= 7;
        while value > 0 {
            chunks.push(((value & 0x7f) as u8) | 0x80);
            value >>= 7;
        }
        chunks.reverse();
        chunks
    }

    fn der_oid(dotted: &str) -> Vec<u8> {
        let arcs: Vec<u64> = dotted.split('.').map(|s| s.parse().unwrap()).collect();
        let mut body = vec![(arcs[0] * 40 + arcs[1]) as u8];
        for &arc in &arcs[2..] {
            body.extend(base128(arc));
        }
        tlv(0x06, &body)
    }

    fn der_null() -> Vec<u8> {
        vec![0x05, 0x00]
    }

    fn der_utf8_string(s: &str) -> Vec<u8> {
        tlv(0x0c, s.as_bytes())
    }

    fn der_utc_time(s: &str) -> Vec<u8> {
        tlv(0x17, s.as_bytes())
    }

    fn der_bit_string(bytes: &[u8]) -> Vec<u8> {
        let mut content = vec![0u8];
        content.extend_from_slice(bytes);
        tlv(0x03, &content)
    }

    fn rsa_encryption_alg_id() -> Vec<u8> {
        der_sequence(&[der_oid("1.2.840.113549.1.1.1"), der_null()])
    }

    fn name_with_cn(cn: &str) -> Vec<u8> {
        der_sequence(&[der_set(&[der_sequence(&[der_oid("2.5.4.3"), der_utf8_string(cn)])])])
    }

    fn build_tbs_certificate(serial: u64, issuer_cn: &str, subject_cn: &str, spki_der: &[u8]) -> Vec<u8> {
        der_sequence(&[
            der_integer_u64(serial),
            rsa_encryption_alg_id(),
            name_with_cn(issuer_cn),
            der_sequence(&[der_utc_time("250101000000Z"), der_utc_time("350101000000Z")]),
            name_with_cn(subject_cn),
            spki_der.to_vec(),
        ])
    }

    fn build_certificate(tbs: &[u8], signature: &[u8]) -> Vec<u8> {
        der_sequence(&[tbs.to_vec(), rsa_encryption_alg_id(), der_bit_string(signature)])
    }

    fn build_tbs_cert_list(issuer_cn: &str, revoked_serials: &[u64]) -> Vec<u8> {
        let entries: Vec<Vec<u8>> = revoked_serials
            .iter()
            .map(|&serial| der_sequence(&[der_integer_u64(serial), der_utc_time("260101000000Z")]))
            .collect();
        let mut parts = vec![
            rsa_encryption_alg_id(),
            name_with_cn(issuer_cn),
            der_utc_time("260101000000Z"),
            der_utc_time("270101000000Z"),
        ];
        if !entries.is_empty() {
            parts.push(der_sequence(&entries));
        }
        der_sequence(&parts)
    }

    fn build_crl(tbs: &[u8], signature: &[u8]) -> Vec<u8> {
        der_sequence(&[tbs.to_vec(), rsa_encryption_alg_id(), der_bit_string(signature)])
    }

    fn fresh_signing_key_and_spki() -> (SigningKey, Vec<u8>) {
        use rsa::pkcs8::EncodePublicKey;
        let private = RsaPrivateKey::new(&mut OsRng, 2048).expect("key generation");
        let spki_der = private
            .to_public_key()
            .to_public_key_der()
            .unwrap()
            .as_bytes()
            .to_vec();
        let pem = private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        (SigningKey::from_pkcs8_pem(&pem).unwrap(), spki_der)
    }

    struct TestCa {
        signing: SigningKey,
        cert_der: Vec<u8>,
    }

    fn self_signed_ca(cn: &str) -> TestCa {
        let (signing, spki_der) = fresh_signing_key_and_spki();
        let tbs = build_tbs_certificate(1, cn, cn, &spki_der);
        let signature = signing.sign(&tbs);
        TestCa {
            signing,
            cert_der: build_certificate(&tbs, &signature),
        }
    }

    fn empty_crl(issuer_cn: &str, ca: &SigningKey) -> Vec<u8> {
        let tbs = build_tbs_cert_list(issuer_cn, &[]);
        let signature = ca.sign(&tbs);
        build_crl(&tbs, &signature)
    }
}
