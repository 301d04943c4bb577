/***************************************************************************************************
 * Crypto provider surface
 *
 * Generalizes the original implementation's mutable global crypto function table
 * (fido_aes_gcm_encrypt/fido_aes_gcm_decrypt/fido_ed25519_sign/fido_ed25519_verify/fido_sha256/
 * fido_sha512) into an object-safe trait. `fido2_client::Device` is constructed with a
 * `&dyn CryptoProvider` rather than reaching into a global, so there is no "provider not yet
 * installed" state to guard against at call time - the precondition moves to construction.
 **************************************************************************************************/
use fido2_error::Fido2Error;

/// Cryptographic primitives required by the CTAP2 protocol engine.
///
/// All methods take `&self` so a single provider instance can be shared behind `&dyn
/// CryptoProvider` across concurrent read-only callers; none of the operations below require
/// mutable state in the provider itself.
pub trait CryptoProvider: Send + Sync {
    /// SHA-256 digest of `data`.
    fn sha256(&self, data: &[u8], out: &mut [u8; 32]);

    /// SHA-512 digest of `data`.
    fn sha512(&self, data: &[u8], out: &mut [u8; 64]);

    /// AES-256-GCM authenticated encryption of `pt` under `key`/`iv`/`aad`, writing ciphertext to
    /// `ct` (must be exactly `pt.len()` bytes) and the 16-byte authentication tag to `tag`.
    fn aes_gcm_encrypt(
        &self,
        key: &[u8; 32],
        iv: &[u8; 12],
        aad: &[u8],
        pt: &[u8],
        ct: &mut [u8],
        tag: &mut [u8; 16],
    ) -> Result<(), Fido2Error>;

    /// AES-256-GCM authenticated decryption of `ct`/`tag` under `key`/`iv`/`aad`, writing
    /// plaintext to `pt` (must be exactly `ct.len()` bytes). Fails with
    /// `Fido2Error::IntegrityCheckFailed` if the tag does not verify.
    fn aes_gcm_decrypt(
        &self,
        key: &[u8; 32],
        iv: &[u8; 12],
        aad: &[u8],
        ct: &[u8],
        tag: &[u8; 16],
        pt: &mut [u8],
    ) -> Result<(), Fido2Error>;

    /// Ed25519 sign `msg` under `sk`, writing the 64-byte signature to `sig`.
    fn ed25519_sign(&self, sk: &[u8; 32], msg: &[u8], sig: &mut [u8; 64]) -> Result<(), Fido2Error>;

    /// Ed25519 verify `sig` over `msg` under public key `pk`.
    fn ed25519_verify(&self, pk: &[u8; 32], msg: &[u8], sig: &[u8; 64]) -> bool;

    /// Fill `buf` with cryptographically secure random bytes.
    fn random(&self, buf: &mut [u8]) -> Result<(), Fido2Error>;
}
