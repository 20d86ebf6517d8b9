//! # Key Management
//!
//! secp256k1 keypairs, public keys, and signatures for DocAnchor.
//!
//! Every input we spend and every entity address we hand out traces back
//! to one of these keys. Most are derived (see [`crate::identity::derivation`]);
//! random generation exists for tests and throwaway change keys.
//!
//! ## Security considerations
//!
//! - Private scalars are zeroized on drop (k256's `SigningKey` does this).
//! - `KeyPair` has no `Serialize` impl and its `Debug` output only shows the
//!   public key. Serializing private keys should be a deliberate act, not
//!   something that happens because someone shoved a keypair into a log line.
//! - Key bytes are never logged. If you add logging to this module,
//!   you will be asked to leave.

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::signatures::SigningError;

/// Length of a compressed SEC1 public key.
pub const PUBLIC_KEY_LENGTH: usize = 33;

/// Length of a compact `r || s` signature.
pub const SIGNATURE_LENGTH: usize = 64;

/// Errors that can occur during key operations.
///
/// These are intentionally vague about *why* something failed: leaking
/// details about key material through error messages is a classic footgun.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid secret key bytes: zero or not below the curve order")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a compressed secp256k1 point")]
    InvalidPublicKey,

    #[error("invalid signature bytes: expected 64 bytes")]
    InvalidSignature,
}

// ---------------------------------------------------------------------------
// KeyPair
// ---------------------------------------------------------------------------

/// A secp256k1 keypair: the private scalar plus its public point.
///
/// # Examples
///
/// ```
/// use docanchor_protocol::crypto::{double_sha256, KeyPair};
///
/// let kp = KeyPair::generate();
/// let digest = double_sha256(b"cell B2 = 42");
/// let sig = kp.sign_digest(&digest).unwrap();
/// assert!(kp.public_key().verify_digest(&digest, &sig));
/// ```
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Reconstruct a keypair from a raw 32-byte private scalar.
    ///
    /// Zero and values at or above the curve order are rejected.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, KeyError> {
        let signing_key =
            SigningKey::from_bytes(bytes.into()).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self { signing_key })
    }

    /// Wrap an existing k256 signing key (what BIP-32 derivation hands us).
    pub(crate) fn from_signing_key(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// The public half, compressed.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(self.signing_key.verifying_key())
    }

    /// Exports the raw 32-byte private scalar.
    ///
    /// **Handle with extreme care.** Don't log it. Don't put it in an error.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }

    /// Sign a 32-byte pre-hashed digest. See [`super::signatures::sign`].
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature, SigningError> {
        super::signatures::sign(self, digest)
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret key material in debug output. Not even "partially."
        write!(f, "KeyPair(pub={})", self.public_key().to_hex())
    }
}

impl PartialEq for KeyPair {
    /// Compares public keys. Comparing secret material in a non-constant-time
    /// way is a bad habit, and the public key identifies the pair anyway.
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for KeyPair {}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// A compressed secp256k1 public key (33 bytes, `0x02`/`0x03` prefix).
///
/// Safe to share, log, and print on a receipt.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    bytes: [u8; PUBLIC_KEY_LENGTH],
}

impl PublicKey {
    fn from_verifying_key(key: &VerifyingKey) -> Self {
        let encoded = key.to_encoded_point(true);
        let mut bytes = [0u8; PUBLIC_KEY_LENGTH];
        bytes.copy_from_slice(encoded.as_bytes());
        Self { bytes }
    }

    /// Parse compressed SEC1 bytes, rejecting anything that isn't a point
    /// on the curve.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        if slice.len() != PUBLIC_KEY_LENGTH {
            return Err(KeyError::InvalidPublicKey);
        }
        let key = VerifyingKey::from_sec1_bytes(slice).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self::from_verifying_key(&key))
    }

    /// Raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.bytes
    }

    /// Verify a signature over a 32-byte digest. Returns `false`, never an
    /// error, for anything that doesn't check out.
    pub fn verify_digest(&self, digest: &[u8; 32], signature: &Signature) -> bool {
        super::signatures::verify(self, digest, signature)
    }

    pub(crate) fn to_verifying_key(self) -> Option<VerifyingKey> {
        VerifyingKey::from_sec1_bytes(&self.bytes).ok()
    }

    /// Hex-encoded representation. 66 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::try_from_slice(&bytes)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// A compact ECDSA signature: 32-byte `r` followed by 32-byte low-S `s`.
///
/// Stored as raw bytes so that a malformed signature can still be carried
/// around and handed to [`super::signatures::verify`], which will simply say
/// no.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    bytes: [u8; SIGNATURE_LENGTH],
}

impl Signature {
    /// Wrap raw compact bytes. No validation; verification does that.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self { bytes }
    }

    pub(crate) fn from_ecdsa(sig: &EcdsaSignature) -> Self {
        let mut bytes = [0u8; SIGNATURE_LENGTH];
        bytes.copy_from_slice(&sig.to_bytes());
        Self { bytes }
    }

    pub(crate) fn to_ecdsa(self) -> Option<EcdsaSignature> {
        EcdsaSignature::from_slice(&self.bytes).ok()
    }

    /// Raw compact bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.bytes
    }

    /// DER encoding, as it appears inside a ledger unlocking script.
    pub fn to_der(&self) -> Result<Vec<u8>, KeyError> {
        let sig = self.to_ecdsa().ok_or(KeyError::InvalidSignature)?;
        Ok(sig.to_der().as_bytes().to_vec())
    }

    /// Hex-encoded compact form. 128 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl FromStr for Signature {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidSignature)?;
        let bytes: [u8; SIGNATURE_LENGTH] =
            bytes.try_into().map_err(|_| KeyError::InvalidSignature)?;
        Ok(Self { bytes })
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        write!(f, "Signature({}...{})", &hex_str[..8], &hex_str[120..])
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_produces_compressed_key() {
        let kp = KeyPair::generate();
        let pk = kp.public_key();
        assert!(pk.as_bytes()[0] == 0x02 || pk.as_bytes()[0] == 0x03);
        assert_eq!(pk.to_hex().len(), 66);
    }

    #[test]
    fn test_known_scalar_one() {
        // Private key 1 maps to the generator point G.
        let mut one = [0u8; 32];
        one[31] = 1;
        let kp = KeyPair::from_secret_bytes(&one).unwrap();
        assert_eq!(
            kp.public_key().to_hex(),
            "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
    }

    #[test]
    fn test_zero_scalar_rejected() {
        assert_eq!(
            KeyPair::from_secret_bytes(&[0u8; 32]).unwrap_err(),
            KeyError::InvalidSecretKey
        );
    }

    #[test]
    fn test_scalar_above_order_rejected() {
        assert!(KeyPair::from_secret_bytes(&[0xFF; 32]).is_err());
    }

    #[test]
    fn test_secret_roundtrip() {
        let kp = KeyPair::generate();
        let restored = KeyPair::from_secret_bytes(&kp.secret_bytes()).unwrap();
        assert_eq!(kp, restored);
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let kp = KeyPair::from_secret_bytes(&[0x11; 32]).unwrap();
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.starts_with("KeyPair(pub="));
        assert!(!debug_str.contains(&hex::encode([0x11u8; 32])));
    }

    #[test]
    fn public_key_hex_roundtrip() {
        let pk = KeyPair::generate().public_key();
        let parsed: PublicKey = pk.to_hex().parse().unwrap();
        assert_eq!(pk, parsed);
    }

    #[test]
    fn public_key_rejects_off_curve_bytes() {
        let mut bogus = [0u8; 33];
        bogus[0] = 0x02;
        bogus[1..].copy_from_slice(&[0xFF; 32]);
        assert!(PublicKey::try_from_slice(&bogus).is_err());
        assert!(PublicKey::try_from_slice(&[0x02; 10]).is_err());
    }

    #[test]
    fn public_key_serde_as_hex() {
        let pk = KeyPair::generate().public_key();
        let json = serde_json::to_string(&pk).unwrap();
        assert_eq!(json, format!("\"{}\"", pk.to_hex()));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(pk, back);
    }

    #[test]
    fn signature_der_export() {
        let kp = KeyPair::generate();
        let sig = kp.sign_digest(&[7u8; 32]).unwrap();
        let der = sig.to_der().unwrap();
        // DER SEQUENCE tag.
        assert_eq!(der[0], 0x30);
        assert!(der.len() <= 72);
    }

    #[test]
    fn signature_hex_rejects_wrong_length() {
        assert!("deadbeef".parse::<Signature>().is_err());
    }
}
