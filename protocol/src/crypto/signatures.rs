//! # Digital Signatures
//!
//! ECDSA over secp256k1, signing fixed-width 32-byte digests.
//!
//! The caller picks the digest algorithm (we use `double_sha256` everywhere,
//! see [`super::hash`]); this module only ever sees the 32 bytes. Signer and
//! verifier must agree on how those bytes were produced: that's on the
//! caller, and [`crate::transaction::signing`] is the one place that does it.
//!
//! ## Why wrap k256 at all?
//!
//! 1. A single place to audit all signing operations.
//! 2. `verify` is a pure predicate: malformed keys, malformed signatures and
//!    plain mismatches are all just `false`. No error oracle, no panics.
//! 3. Nonces are RFC 6979 deterministic and `s` is normalized low, so the
//!    same key and digest always give the same signature. No RNG at signing
//!    time means no PlayStation 3 moments.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::Signature as EcdsaSignature;
use thiserror::Error;

use super::keys::{KeyPair, PublicKey, Signature};

/// Errors during signing. Verification never errors; it returns `false`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SigningError {
    /// The private scalar is zero or not below the curve order.
    #[error("invalid signing key material")]
    InvalidSecretKey,

    /// The backend refused to produce a signature.
    #[error("signing failed")]
    SigningFailed,
}

/// Sign a 32-byte digest with a keypair.
///
/// # Example
///
/// ```
/// use docanchor_protocol::crypto::{double_sha256, sign, verify, KeyPair};
///
/// let kp = KeyPair::generate();
/// let digest = double_sha256(b"snapshot v3");
/// let sig = sign(&kp, &digest).unwrap();
/// assert!(verify(&kp.public_key(), &digest, &sig));
/// ```
pub fn sign(keypair: &KeyPair, digest: &[u8; 32]) -> Result<Signature, SigningError> {
    let sig: EcdsaSignature = keypair
        .signing_key()
        .sign_prehash(digest)
        .map_err(|_| SigningError::SigningFailed)?;
    Ok(Signature::from_ecdsa(&sig))
}

/// Sign with a raw private scalar.
///
/// This is the "I only have 32 bytes" variant. A zero or out-of-range scalar
/// is fatal: [`SigningError::InvalidSecretKey`].
pub fn sign_with_scalar(scalar: &[u8; 32], digest: &[u8; 32]) -> Result<Signature, SigningError> {
    let keypair = KeyPair::from_secret_bytes(scalar).map_err(|_| SigningError::InvalidSecretKey)?;
    sign(&keypair, digest)
}

/// Verify a signature over a 32-byte digest.
///
/// Returns `true` only if everything checks out. A public key that isn't on
/// the curve, a signature with `r` or `s` out of range, a high-S signature,
/// a different digest, a different key: all `false`.
pub fn verify(public_key: &PublicKey, digest: &[u8; 32], signature: &Signature) -> bool {
    let Some(verifying_key) = public_key.to_verifying_key() else {
        return false;
    };
    let Some(sig) = signature.to_ecdsa() else {
        return false;
    };
    // Malleated (high-S) twins of a valid signature are not accepted.
    if sig.normalize_s().is_some() {
        return false;
    }
    verifying_key.verify_prehash(digest, &sig).is_ok()
}

/// Verify a batch of `(key, digest, signature)` triples.
///
/// `true` only if every single one verifies. If you need to know which one
/// is bad, verify them individually.
pub fn verify_all(items: &[(PublicKey, [u8; 32], Signature)]) -> bool {
    items
        .iter()
        .all(|(key, digest, sig)| verify(key, digest, sig))
}
