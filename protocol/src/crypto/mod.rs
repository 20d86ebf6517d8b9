//! # Cryptographic Primitives for DocAnchor
//!
//! Everything security-related flows through here: every digest we sign,
//! every key we derive a public point from, every signature we check.
//!
//! We deliberately chose boring, well-audited cryptography:
//!
//! - **ECDSA over secp256k1** for signatures, because that's what the ledger
//!   verifies. RFC 6979 nonces, low-S signatures.
//! - **SHA-256 / double SHA-256** for digests and transaction ids.
//! - **HASH160** for the public key hash inside addresses.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. Everything here is a thin, type-safe wrapper around `k256`,
//! `sha2` and `ripemd`. If you're tempted to optimize these functions,
//! please reconsider.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{double_sha256, hash160, sha256};
pub use keys::{KeyError, KeyPair, PublicKey, Signature};
pub use signatures::{sign, sign_with_scalar, verify, SigningError};
