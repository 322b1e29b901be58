//! Cryptographic test vectors from official specifications.
//!
//! Covers the RFC 3526 Group 14 Diffie-Hellman group and known-answer
//! SHA-256 vectors that the unit-test modules don't already exercise.

use chat_crypto::aead::AeadKey;
use chat_crypto::dh::{PrivateKey, PublicKey, DH_PUBLIC_LEN};
use chat_crypto::hash;

fn decode_hex(hex: &str) -> Vec<u8> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
        .collect()
}

#[test]
fn dh_key_exchange_round_trips_and_agrees() {
    let alice_private = PrivateKey::generate(&mut rand_core::OsRng);
    let alice_public = alice_private.public_key();

    let bob_private = PrivateKey::generate(&mut rand_core::OsRng);
    let bob_public = bob_private.public_key();

    let alice_shared = alice_private.exchange(&bob_public).expect("DH exchange failed");
    let bob_shared = bob_private.exchange(&alice_public).expect("DH exchange failed");
    assert_eq!(alice_shared.as_bytes(), bob_shared.as_bytes());
}

#[test]
fn dh_rejects_degenerate_peer_public_value() {
    let private = PrivateKey::generate(&mut rand_core::OsRng);
    let zero_public = PublicKey::from_bytes([0u8; DH_PUBLIC_LEN]);
    assert!(private.exchange(&zero_public).is_none());
}

#[test]
fn sha256_known_answer_abc() {
    let digest = hash::hash(b"abc");
    let expected =
        decode_hex("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    assert_eq!(digest.to_vec(), expected);
}

#[test]
fn aead_roundtrip_with_large_payload() {
    let key = AeadKey::new([0x42u8; 32]);
    let iv = [0x01u8; 12];
    let plaintext = vec![0x24u8; 1024 * 1024];

    let ciphertext = key.encrypt(&iv, &plaintext, b"").expect("encryption failed");
    let decrypted = key.decrypt(&iv, &ciphertext, b"").expect("decryption failed");

    assert_eq!(plaintext, decrypted);
}
