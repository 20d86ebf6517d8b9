//! # Hierarchical Key Derivation
//!
//! Deterministic BIP-32 private derivation: one master seed, a tree of keys.
//!
//! ```text
//! seed ──HMAC-SHA512──> master key
//!                         └─ 44' ─ 236' ─ 1' ─ row' ─ col'   (entity keys)
//!                         └─ 44' ─ 236' ─ 0' ─ 1'  ─ 0'      (change)
//! ```
//!
//! Hardened steps (the `'`) mix the parent's *private* key into the child.
//! That's the whole point: a leaked child key tells an attacker nothing
//! about its siblings or its parent. [`derive`] therefore refuses any path
//! with a soft step. [`DerivationPath`] can still *represent* soft steps
//! so that such paths parse and get a precise error.
//!
//! Nothing here caches, logs keys, or touches global state. Same seed, same
//! path, same key, every time, on every platform.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::{HARDENED_OFFSET, MAX_SEED_LENGTH, MIN_SEED_LENGTH};
use crate::crypto::keys::KeyPair;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Configuration-class failures of key derivation. Never retryable: the same
/// inputs will fail the same way forever.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DerivationError {
    #[error("master seed is empty")]
    EmptySeed,

    #[error("master seed must be {min}..={max} bytes, got {got}")]
    InvalidSeedLength {
        /// Lower bound.
        min: usize,
        /// Upper bound.
        max: usize,
        /// What we were handed.
        got: usize,
    },

    #[error("master seed is not valid hex")]
    MalformedSeed,

    #[error("malformed derivation path '{path}': {reason}")]
    MalformedPath {
        /// The offending input.
        path: String,
        /// What's wrong with it.
        reason: String,
    },

    #[error("path component {index} out of range (must be below 2^31)")]
    IndexOutOfRange {
        /// The component that didn't fit.
        index: u64,
    },

    #[error("path '{path}' has a non-hardened step at position {position}")]
    NonHardenedStep {
        /// The path as given.
        path: String,
        /// Zero-based position of the first soft step.
        position: usize,
    },

    #[error("root prefix '{path}' must be hardened at every level")]
    NonHardenedRoot {
        /// The prefix as given.
        path: String,
    },

    #[error("BIP-32 derivation failed: {0}")]
    Bip32(String),
}

// ---------------------------------------------------------------------------
// MasterSeed
// ---------------------------------------------------------------------------

/// The wallet's master seed. Opaque bytes, zeroized on drop.
///
/// The `Debug` impl prints the length and nothing else.
#[derive(Clone)]
pub struct MasterSeed {
    bytes: Zeroizing<Vec<u8>>,
}

impl MasterSeed {
    /// Wrap seed bytes, enforcing the BIP-32 length bounds.
    ///
    /// An empty seed is its own error: it almost always means a credential
    /// source handed us nothing, and we'd rather fail loudly than derive
    /// from a placeholder.
    pub fn new(bytes: Vec<u8>) -> Result<Self, DerivationError> {
        let bytes = Zeroizing::new(bytes);
        if bytes.is_empty() {
            return Err(DerivationError::EmptySeed);
        }
        if bytes.len() < MIN_SEED_LENGTH || bytes.len() > MAX_SEED_LENGTH {
            return Err(DerivationError::InvalidSeedLength {
                min: MIN_SEED_LENGTH,
                max: MAX_SEED_LENGTH,
                got: bytes.len(),
            });
        }
        Ok(Self { bytes })
    }

    /// Convenience for seeds stored as hex.
    pub fn from_hex(s: &str) -> Result<Self, DerivationError> {
        let bytes = hex::decode(s.trim()).map_err(|_| DerivationError::MalformedSeed)?;
        Self::new(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Seed length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always `false`: empty seeds can't be constructed. Here for clippy.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for MasterSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MasterSeed({} bytes, redacted)", self.bytes.len())
    }
}

// ---------------------------------------------------------------------------
// ChildIndex / DerivationPath
// ---------------------------------------------------------------------------

/// One step of a derivation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChildIndex {
    index: u32,
    hardened: bool,
}

impl ChildIndex {
    /// A hardened step. `index` must be below 2^31.
    pub fn hardened(index: u32) -> Result<Self, DerivationError> {
        Self::checked(index, true)
    }

    /// A soft (non-hardened) step. `index` must be below 2^31.
    pub fn normal(index: u32) -> Result<Self, DerivationError> {
        Self::checked(index, false)
    }

    fn checked(index: u32, hardened: bool) -> Result<Self, DerivationError> {
        if index >= HARDENED_OFFSET {
            return Err(DerivationError::IndexOutOfRange {
                index: u64::from(index),
            });
        }
        Ok(Self { index, hardened })
    }

    /// The index without the hardened bit.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn is_hardened(&self) -> bool {
        self.hardened
    }

    /// The BIP-32 wire value: index with the top bit set when hardened.
    pub fn raw(&self) -> u32 {
        if self.hardened {
            self.index | HARDENED_OFFSET
        } else {
            self.index
        }
    }
}

impl fmt::Display for ChildIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

/// An ordered list of derivation steps below the master key.
///
/// Parses the usual notation (`m/44'/236'/1'`, `h` accepted for `'`) and
/// always displays with `'`.
///
/// ```
/// use docanchor_protocol::identity::derivation::DerivationPath;
///
/// let path: DerivationPath = "m/44'/236'/1h".parse().unwrap();
/// assert_eq!(path.to_string(), "m/44'/236'/1'");
/// assert!(path.is_fully_hardened());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DerivationPath {
    steps: Vec<ChildIndex>,
}

impl DerivationPath {
    /// The master key itself (`m`).
    pub fn master() -> Self {
        Self::default()
    }

    /// Build from explicit steps.
    pub fn from_steps(steps: Vec<ChildIndex>) -> Self {
        Self { steps }
    }

    /// A new path with one more step appended.
    pub fn child(&self, step: ChildIndex) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }

    pub fn steps(&self) -> &[ChildIndex] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// `true` when every step is hardened (vacuously true for `m`).
    pub fn is_fully_hardened(&self) -> bool {
        self.steps.iter().all(ChildIndex::is_hardened)
    }
}

impl FromStr for DerivationPath {
    type Err = DerivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| DerivationError::MalformedPath {
            path: s.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = s.trim().split('/');
        if parts.next() != Some("m") {
            return Err(malformed("must start with 'm'"));
        }

        let mut steps = Vec::new();
        for part in parts {
            let (digits, hardened) = match part
                .strip_suffix('\'')
                .or_else(|| part.strip_suffix('h'))
            {
                Some(digits) => (digits, true),
                None => (part, false),
            };
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed("components must be decimal indexes"));
            }
            let index: u64 = digits
                .parse()
                .map_err(|_| DerivationError::IndexOutOfRange { index: u64::MAX })?;
            if index >= u64::from(HARDENED_OFFSET) {
                return Err(DerivationError::IndexOutOfRange { index });
            }
            steps.push(ChildIndex::checked(index as u32, hardened)?);
        }
        Ok(Self { steps })
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for step in &self.steps {
            write!(f, "/{}", step)?;
        }
        Ok(())
    }
}

impl Serialize for DerivationPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DerivationPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derive the keypair at `path` below the seed's master key.
///
/// Pure and deterministic. Every step of `path` must be hardened. The
/// failures are configuration-class: a soft step, a seed BIP-32 refuses,
/// or (astronomically unlikely) an invalid child.
pub fn derive(seed: &MasterSeed, path: &DerivationPath) -> Result<KeyPair, DerivationError> {
    use coins_bip32::prelude::*;
    use k256::ecdsa::SigningKey;

    if let Some(position) = path.steps().iter().position(|step| !step.is_hardened()) {
        return Err(DerivationError::NonHardenedStep {
            path: path.to_string(),
            position,
        });
    }

    let mut key = XPriv::root_from_seed(seed.as_bytes(), None)
        .map_err(|e| DerivationError::Bip32(e.to_string()))?;

    for step in path.steps() {
        key = key
            .derive_child(step.raw())
            .map_err(|e| DerivationError::Bip32(e.to_string()))?;
    }

    // XPriv implements AsRef<SigningKey>.
    let signing_key: &SigningKey = key.as_ref();
    Ok(KeyPair::from_signing_key(signing_key.clone()))
}
