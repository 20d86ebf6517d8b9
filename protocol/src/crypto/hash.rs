//! # Hashing Utilities
//!
//! The three hash constructions the ledger actually speaks:
//!
//! - **SHA-256**: the building block.
//! - **double SHA-256**: transaction ids and signature digests. Protects
//!   against length extension, and more importantly, it's what every
//!   ledger tool on the planet expects.
//! - **HASH160**: `RIPEMD-160(SHA-256(x))`, the 20-byte public key hash
//!   inside every pay-to-pubkey-hash address.
//!
//! We don't add more without a very good reason.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use docanchor_protocol::crypto::sha256;
///
/// let hash = sha256(b"DocAnchor");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Compute `SHA-256(SHA-256(data))`.
///
/// Used for transaction ids and for the per-input signature digest. Signer
/// and verifier both use this, so they always agree on the digest.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute `RIPEMD-160(SHA-256(data))`.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(sha256(data)).into()
}

/// Feed multiple slices into one SHA-256 without a temporary buffer.
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
