/***************************************************************************************************
 * Default software `CryptoProvider`
 *
 * A ready-to-use implementation built on standard RustCrypto crates, reachable only behind the
 * `software-crypto` feature - matching the teacher's pattern of keeping a richer default available
 * but opt-in (see `fido2_minicbor`'s `full` feature) rather than always compiled in.
 **************************************************************************************************/
use crate::crypto::CryptoProvider;

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use fido2_error::Fido2Error;
use sha2::{Digest, Sha256, Sha512};

/// A [`CryptoProvider`] backed by `sha2`, `aes-gcm`, `ed25519-dalek` and `getrandom`.
///
/// Suitable for hosts that can afford a software crypto stack; a resource-constrained target is
/// expected to supply its own `CryptoProvider` backed by a hardware crypto engine instead.
#[derive(Default)]
pub struct SoftwareCrypto;

impl CryptoProvider for SoftwareCrypto {
    fn sha256(&self, data: &[u8], out: &mut [u8; 32]) {
        out.copy_from_slice(&Sha256::digest(data));
    }

    fn sha512(&self, data: &[u8], out: &mut [u8; 64]) {
        out.copy_from_slice(&Sha512::digest(data));
    }

    fn aes_gcm_encrypt(
        &self,
        key: &[u8; 32],
        iv: &[u8; 12],
        aad: &[u8],
        pt: &[u8],
        ct: &mut [u8],
        tag: &mut [u8; 16],
    ) -> Result<(), Fido2Error> {
        if ct.len() != pt.len() {
            return Err(Fido2Error::ShortBuffer(pt.len()));
        }
        ct.copy_from_slice(pt);
        let cipher = Aes256Gcm::new(key.into());
        let computed_tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(iv), aad, ct)
            .map_err(|_| Fido2Error::Crypto)?;
        tag.copy_from_slice(&computed_tag);
        Ok(())
    }

    fn aes_gcm_decrypt(
        &self,
        key: &[u8; 32],
        iv: &[u8; 12],
        aad: &[u8],
        ct: &[u8],
        tag: &[u8; 16],
        pt: &mut [u8],
    ) -> Result<(), Fido2Error> {
        if pt.len() != ct.len() {
            return Err(Fido2Error::ShortBuffer(ct.len()));
        }
        pt.copy_from_slice(ct);
        let cipher = Aes256Gcm::new(key.into());
        cipher
            .decrypt_in_place_detached(Nonce::from_slice(iv), aad, pt, Tag::from_slice(tag))
            .map_err(|_| Fido2Error::IntegrityCheckFailed)
    }

    fn ed25519_sign(
        &self,
        sk: &[u8; 32],
        msg: &[u8],
        sig: &mut [u8; 64],
    ) -> Result<(), Fido2Error> {
        let signing_key = SigningKey::from_bytes(sk);
        let signature = signing_key.sign(msg);
        sig.copy_from_slice(&signature.to_bytes());
        Ok(())
    }

    fn ed25519_verify(&self, pk: &[u8; 32], msg: &[u8], sig: &[u8; 64]) -> bool {
        let verifying_key = match VerifyingKey::from_bytes(pk) {
            Ok(key) => key,
            Err(_) => return false,
        };
        let signature = Signature::from_bytes(sig);
        verifying_key.verify(msg, &signature).is_ok()
    }

    fn random(&self, buf: &mut [u8]) -> Result<(), Fido2Error> {
        getrandom::getrandom(buf).map_err(|_| Fido2Error::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_vector() {
        let crypto = SoftwareCrypto;
        let mut out = [0u8; 32];
        crypto.sha256(b"abc", &mut out);
        let expected: [u8; 32] = [
            0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae,
            0x22, 0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61,
            0xf2, 0x00, 0x15, 0xad,
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn aes_gcm_round_trips() {
        let crypto = SoftwareCrypto;
        let key = [0x42u8; 32];
        let iv = [0x24u8; 12];
        let aad = b"blob";
        let pt = b"large-blob payload";
        let mut ct = [0u8; 18];
        let mut tag = [0u8; 16];
        crypto
            .aes_gcm_encrypt(&key, &iv, aad, pt, &mut ct, &mut tag)
            .unwrap();
        let mut recovered = [0u8; 18];
        crypto
            .aes_gcm_decrypt(&key, &iv, aad, &ct, &tag, &mut recovered)
            .unwrap();
        assert_eq!(&recovered, pt);
    }

    #[test]
    fn aes_gcm_decrypt_rejects_tampered_tag() {
        let crypto = SoftwareCrypto;
        let key = [0x01u8; 32];
        let iv = [0x02u8; 12];
        let pt = b"payload";
        let mut ct = [0u8; 7];
        let mut tag = [0u8; 16];
        crypto
            .aes_gcm_encrypt(&key, &iv, b"", pt, &mut ct, &mut tag)
            .unwrap();
        tag[0] ^= 0xff;
        let mut recovered = [0u8; 7];
        assert!(matches!(
            crypto.aes_gcm_decrypt(&key, &iv, b"", &ct, &tag, &mut recovered),
            Err(Fido2Error::IntegrityCheckFailed)
        ));
    }

    #[test]
    fn ed25519_sign_then_verify_round_trips() {
        let crypto = SoftwareCrypto;
        let sk = [0x07u8; 32];
        let signing_key = SigningKey::from_bytes(&sk);
        let pk = signing_key.verifying_key().to_bytes();
        let msg = b"assertion client data hash";
        let mut sig = [0u8; 64];
        crypto.ed25519_sign(&sk, msg, &mut sig).unwrap();
        assert!(crypto.ed25519_verify(&pk, msg, &sig));
    }
}
