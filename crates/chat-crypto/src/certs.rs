//! X.509 certificate and CRL verification for username-to-key binding.
//!
//! This is the Rust-idiomatic equivalent of
//! `build_store_certificate_and_validate_check` in the original client: a
//! username is trusted to own a long-term RSA public key only if a
//! certificate issued by the configured CA binds that username (as the
//! subject common name) to that key, and the certificate's serial number
//! does not appear on the CA's certificate revocation list.

use crate::rsa_signing::VerifyingKey;
use crate::CryptoError;
use der::asn1::Ia5String;
use der::oid::db::rfc4519::CN;
use der::Decode;
use x509_cert::certificate::Certificate;
use x509_cert::crl::CertificateList;
use x509_cert::der::Encode;
use x509_cert::name::Name;

/// A loaded CA certificate plus its current certificate revocation list.
///
/// Both are provided to the client out of band (filenames mirror the
/// original source's `FoundationsOfCybersecurity_cert.pem` /
/// `FoundationsOfCybersecurity_crl.pem`) and are not fetched over the wire.
pub struct CertificateStore {
    ca_key: VerifyingKey,
    revoked_serials: Vec<Vec<u8>>,
}

impl CertificateStore {
    /// Build a store from a parsed CA certificate and its CRL.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::CertificateInvalid`] if the CA certificate's
    /// own public key cannot be extracted.
    pub fn new(ca_certificate_der: &[u8], crl_der: &[u8]) -> Result<Self, CryptoError> {
        let ca_cert = Certificate::from_der(ca_certificate_der)
            .map_err(|e| CryptoError::CertificateInvalid(e.to_string()))?;
        let spki_der = ca_cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| CryptoError::CertificateInvalid(e.to_string()))?;
        let ca_key = VerifyingKey::from_public_key_der(&spki_der)?;

        let crl = CertificateList::from_der(crl_der)
            .map_err(|e| CryptoError::CertificateInvalid(e.to_string()))?;
        let revoked_serials = crl
            .tbs_cert_list
            .revoked_certificates
            .unwrap_or_default()
            .into_iter()
            .map(|entry| entry.serial_number.as_bytes().to_vec())
            .collect();

        Ok(Self {
            ca_key,
            revoked_serials,
        })
    }

    /// Verify that `cert_der` is signed by the configured CA, binds
    /// `expected_username` as its subject common name, and is not revoked.
    /// On success, returns the RSA public key the certificate certifies.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::CertificateInvalid`] if the certificate fails
    /// to parse, does not chain to the CA, or does not name
    /// `expected_username`; returns [`CryptoError::Revoked`] if the serial
    /// number is on the CRL.
    pub fn verify_binding(
        &self,
        expected_username: &str,
        cert_der: &[u8],
    ) -> Result<VerifyingKey, CryptoError> {
        let cert = Certificate::from_der(cert_der)
            .map_err(|e| CryptoError::CertificateInvalid(e.to_string()))?;

        let tbs_der = cert
            .tbs_certificate
            .to_der()
            .map_err(|e| CryptoError::CertificateInvalid(e.to_string()))?;
        let signature = cert.signature.raw_bytes();
        self.ca_key
            .verify(&tbs_der, signature)
            .map_err(|_| CryptoError::CertificateInvalid("CA signature mismatch".into()))?;

        let serial = cert.tbs_certificate.serial_number.as_bytes();
        if self.revoked_serials.iter().any(|s| s.as_slice() == serial) {
            return Err(CryptoError::Revoked);
        }

        let cn = common_name(&cert.tbs_certificate.subject)
            .ok_or_else(|| CryptoError::CertificateInvalid("missing subject CN".into()))?;
        if cn != expected_username {
            return Err(CryptoError::CertificateInvalid(format!(
                "certificate is bound to '{cn}', not '{expected_username}'"
            )));
        }

        let spki_der = cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| CryptoError::CertificateInvalid(e.to_string()))?;
        VerifyingKey::from_public_key_der(&spki_der)
    }
}

fn common_name(subject: &Name) -> Option<String> {
    subject.0.iter().find_map(|rdn| {
        rdn.0.iter().find_map(|atv| {
            if atv.oid == CN {
                atv.value
                    .decode_as::<Ia5String>()
                    .map(|s| s.to_string())
                    .ok()
                    .or_else(|| {
                        std::str::from_utf8(atv.value.value()).ok().map(str::to_owned)
                    })
            } else {
                None
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rsa_signing::SigningKey;
    use rand::rngs::OsRng;
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use rsa::RsaPrivateKey;

    #[test]
    fn common_name_returns_none_for_empty_subject() {
        let empty = Name::default();
        assert!(common_name(&empty).is_none());
    }

    // A minimal hand-rolled DER encoder for the handful of X.509/CRL
    // structures these tests need (RFC 5280). Builds v1 certificates: no
    // extensions, so no `[3]` field and no version tag (defaults to v1).

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

    /// A fresh RSA-2048 signing key plus its SPKI DER, ready to splice into
    /// a hand-built `subjectPublicKeyInfo` field.
    fn fresh_signing_key_and_spki() -> (SigningKey, Vec<u8>) {
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

    #[test]
    fn verify_binding_accepts_properly_signed_certificate() {
        let ca = self_signed_ca("test-ca");
        let (alice_signing, alice_spki) = fresh_signing_key_and_spki();
        let alice_tbs = build_tbs_certificate(42, "test-ca", "alice", &alice_spki);
        let alice_cert_der = build_certificate(&alice_tbs, &ca.signing.sign(&alice_tbs));
        let crl_der = empty_crl("test-ca", &ca.signing);

        let store = CertificateStore::new(&ca.cert_der, &crl_der).unwrap();
        let key = store.verify_binding("alice", &alice_cert_der).unwrap();
        assert!(key == alice_signing.verifying_key());
    }

    #[test]
    fn verify_binding_rejects_certificate_signed_by_an_unrelated_key() {
        let ca = self_signed_ca("test-ca");
        let impostor = self_signed_ca("impostor-ca");
        let (_alice_signing, alice_spki) = fresh_signing_key_and_spki();
        let alice_tbs = build_tbs_certificate(42, "test-ca", "alice", &alice_spki);
        // signed by the impostor's key, not the configured CA's
        let forged_cert_der = build_certificate(&alice_tbs, &impostor.signing.sign(&alice_tbs));
        let crl_der = empty_crl("test-ca", &ca.signing);

        let store = CertificateStore::new(&ca.cert_der, &crl_der).unwrap();
        let result = store.verify_binding("alice", &forged_cert_der);
        assert!(matches!(result, Err(CryptoError::CertificateInvalid(_))));
    }

    #[test]
    fn verify_binding_rejects_username_mismatch() {
        let ca = self_signed_ca("test-ca");
        let (_alice_signing, alice_spki) = fresh_signing_key_and_spki();
        let alice_tbs = build_tbs_certificate(42, "test-ca", "alice", &alice_spki);
        let alice_cert_der = build_certificate(&alice_tbs, &ca.signing.sign(&alice_tbs));
        let crl_der = empty_crl("test-ca", &ca.signing);

        let store = CertificateStore::new(&ca.cert_der, &crl_der).unwrap();
        let result = store.verify_binding("bob", &alice_cert_der);
        assert!(matches!(result, Err(CryptoError::CertificateInvalid(_))));
    }

    #[test]
    fn verify_binding_rejects_revoked_serial() {
        let ca = self_signed_ca("test-ca");
        let (_alice_signing, alice_spki) = fresh_signing_key_and_spki();
        let alice_tbs = build_tbs_certificate(42, "test-ca", "alice", &alice_spki);
        let alice_cert_der = build_certificate(&alice_tbs, &ca.signing.sign(&alice_tbs));

        let revoked_tbs = build_tbs_cert_list("test-ca", &[42]);
        let revoked_crl_der = build_crl(&revoked_tbs, &ca.signing.sign(&revoked_tbs));

        let store = CertificateStore::new(&ca.cert_der, &revoked_crl_der).unwrap();
        let result = store.verify_binding("alice", &alice_cert_der);
        assert!(matches!(result, Err(CryptoError::Revoked)));
    }
}
