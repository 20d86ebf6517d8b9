//! # Addresses
//!
//! The human-facing form of a public key: a pay-to-pubkey-hash address,
//! Base58Check encoded.
//!
//! ```text
//! public_key (33 bytes, compressed)
//!     -> HASH160(public_key)            -> 20 bytes
//!     -> version || hash || checksum(4) -> Base58
//!     -> 1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH
//! ```
//!
//! The version byte says which network the address belongs to (`0x00` for
//! mainnet, `0x6f` for testnet), so a testnet address can't be fat-fingered
//! into a mainnet payment. The 4-byte checksum catches typos.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::Network;
use crate::crypto::hash::hash160;
use crate::crypto::keys::PublicKey;

/// Length of the public key hash inside an address.
pub const PUBKEY_HASH_LENGTH: usize = 20;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from parsing an address string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Not Base58, or the checksum doesn't match.
    #[error("base58check decode error: {0}")]
    Base58(String),

    /// The version byte isn't one we know.
    #[error("unknown address version byte 0x{0:02x}")]
    UnknownVersion(u8),

    /// The decoded payload has an unexpected length.
    #[error("invalid address payload length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes.
        got: usize,
    },
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A P2PKH address: a network plus the HASH160 of a compressed public key.
///
/// # Examples
///
/// ```
/// use docanchor_protocol::config::Network;
/// use docanchor_protocol::crypto::KeyPair;
/// use docanchor_protocol::identity::Address;
///
/// let kp = KeyPair::generate();
/// let addr = Address::from_public_key(&kp.public_key(), Network::Mainnet);
/// let text = addr.to_string();
/// assert!(text.starts_with('1'));
///
/// let parsed: Address = text.parse().unwrap();
/// assert_eq!(addr, parsed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    pubkey_hash: [u8; PUBKEY_HASH_LENGTH],
}

impl Address {
    /// Derive the address of a public key on a given network.
    pub fn from_public_key(public_key: &PublicKey, network: Network) -> Self {
        Self {
            network,
            pubkey_hash: hash160(public_key.as_bytes()),
        }
    }

    /// Build directly from a known pubkey hash.
    pub fn from_pubkey_hash(pubkey_hash: [u8; PUBKEY_HASH_LENGTH], network: Network) -> Self {
        Self {
            network,
            pubkey_hash,
        }
    }

    /// Parse a Base58Check address, validating checksum, version and length.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let decoded = bs58::decode(s.trim())
            .with_check(None)
            .into_vec()
            .map_err(|e| AddressError::Base58(e.to_string()))?;

        // with_check keeps the version byte and strips the checksum.
        let (&version, hash) = decoded.split_first().ok_or(AddressError::InvalidLength {
            expected: PUBKEY_HASH_LENGTH + 1,
            got: 0,
        })?;

        let network = Network::from_p2pkh_version(version)
            .ok_or(AddressError::UnknownVersion(version))?;

        let pubkey_hash: [u8; PUBKEY_HASH_LENGTH] =
            hash.try_into().map_err(|_| AddressError::InvalidLength {
                expected: PUBKEY_HASH_LENGTH,
                got: hash.len(),
            })?;

        Ok(Self {
            network,
            pubkey_hash,
        })
    }

    /// Is `s` a well-formed address for `network`? Checksum, version and
    /// length all have to line up.
    pub fn validate(s: &str, network: Network) -> bool {
        matches!(Self::parse(s), Ok(addr) if addr.network == network)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// The 20-byte HASH160 of the public key.
    pub fn pubkey_hash(&self) -> &[u8; PUBKEY_HASH_LENGTH] {
        &self.pubkey_hash
    }

    /// Does this public key hash to this address?
    ///
    /// Addresses parsed from text carry only the hash, so this is how a
    /// verifier ties a signature's public key back to an address.
    pub fn matches_public_key(&self, public_key: &PublicKey) -> bool {
        hash160(public_key.as_bytes()) == self.pubkey_hash
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = bs58::encode(self.pubkey_hash)
            .with_check_version(self.network.p2pkh_version())
            .into_string();
        f.write_str(&encoded)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
