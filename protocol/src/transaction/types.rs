//! Core type definitions for ledger transactions.
//!
//! These types form the vocabulary of every transaction the builder produces.
//! They are intentionally kept small and `Copy`-friendly where possible.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::keys::PublicKey;
use crate::identity::address::Address;
use crate::identity::derivation::DerivationPath;
use crate::identity::entity::EntityId;

// ---------------------------------------------------------------------------
// TxId
// ---------------------------------------------------------------------------

/// A 32-byte transaction identifier. Displays as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId([u8; 32]);

impl TxId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", self.to_hex())
    }
}

impl FromStr for TxId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for TxId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Reference to a previous transaction's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: TxId,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: TxId, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

/// Which key spends an output. Resolved by a
/// [`SigningKeySource`](super::builder::SigningKeySource) at build time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyRef {
    /// The key of an entity (cell) address.
    Entity(EntityId),
    /// An explicit derivation path below the master key. Must be hardened
    /// at every step or the build fails.
    Path(DerivationPath),
}

/// An unspent output the wallet can spend, as reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub outpoint: OutPoint,
    /// Value in the smallest ledger unit.
    pub value: u64,
    pub key_ref: KeyRef,
}

impl Utxo {
    pub fn new(outpoint: OutPoint, value: u64, key_ref: KeyRef) -> Self {
        Self {
            outpoint,
            value,
            key_ref,
        }
    }
}

/// A spent UTXO bound to the public key that signs for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub outpoint: OutPoint,
    pub value: u64,
    pub key_ref: KeyRef,
    pub public_key: PublicKey,
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// What a data-carrier output belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataRole {
    /// Chunk of the n-th application payload (0-based, in builder order).
    Payload(u32),
    /// Chunk of the serialized attestation.
    Attestation,
}

/// The shape of an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputKind {
    /// Spendable value to an address. Change outputs are payments.
    Payment { address: Address },
    /// Zero-value, unspendable data carrier.
    Data {
        role: DataRole,
        sequence: u32,
        #[serde(with = "hex::serde")]
        chunk: Vec<u8>,
    },
    /// Zero-value inscription envelope.
    Inscription {
        #[serde(with = "hex::serde")]
        envelope: Vec<u8>,
    },
    /// Minimal-value output marking an entity address in the chain.
    Marker { address: Address },
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub kind: OutputKind,
}

impl TxOutput {
    pub fn payment(address: Address, value: u64) -> Self {
        Self {
            value,
            kind: OutputKind::Payment { address },
        }
    }

    pub fn data(role: DataRole, sequence: u32, chunk: Vec<u8>) -> Self {
        Self {
            value: 0,
            kind: OutputKind::Data {
                role,
                sequence,
                chunk,
            },
        }
    }

    pub fn inscription(envelope: Vec<u8>) -> Self {
        Self {
            value: 0,
            kind: OutputKind::Inscription { envelope },
        }
    }

    pub fn marker(address: Address, value: u64) -> Self {
        Self {
            value,
            kind: OutputKind::Marker { address },
        }
    }

    /// Bytes of embedded data this output carries (zero for value outputs).
    pub fn data_len(&self) -> usize {
        match &self.kind {
            OutputKind::Data { chunk, .. } => chunk.len(),
            OutputKind::Inscription { envelope } => envelope.len(),
            OutputKind::Payment { .. } | OutputKind::Marker { .. } => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// Application bytes plus a content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    content_type: String,
    #[serde(with = "hex::serde")]
    bytes: Vec<u8>,
}

impl Payload {
    pub fn new(content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Serialize an application record as an `application/json` payload.
    pub fn json<T: Serialize>(record: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new("application/json", serde_json::to_vec(record)?))
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// A single cell edit, the most common thing anyone anchors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellEdit {
    pub row: u32,
    pub col: u32,
    pub value: String,
    /// Unix milliseconds.
    pub timestamp: u64,
}

impl CellEdit {
    pub fn entity_id(&self) -> EntityId {
        EntityId::new(self.row, self.col)
    }

    pub fn to_payload(&self) -> Result<Payload, serde_json::Error> {
        Payload::json(self)
    }
}

// ---------------------------------------------------------------------------
// FeeRate
// ---------------------------------------------------------------------------

/// A linear fee rate, stored per 1000 bytes so sub-unit-per-byte rates work.
///
/// Stored as `u128` so `per_byte(u64::MAX)` is exact. Fees round up: a
/// 1-byte transaction at 1 unit/kB still pays 1 unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeeRate {
    units_per_kb: u128,
}

impl FeeRate {
    pub const ZERO: FeeRate = FeeRate { units_per_kb: 0 };

    /// `units` per byte.
    pub fn per_byte(units: u64) -> Self {
        Self {
            units_per_kb: u128::from(units) * 1000,
        }
    }

    /// `units` per 1000 bytes.
    pub fn per_kilobyte(units: u64) -> Self {
        Self {
            units_per_kb: u128::from(units),
        }
    }

    pub fn units_per_kb(&self) -> u128 {
        self.units_per_kb
    }

    /// Fee for `size` bytes, rounded up. `None` when the fee doesn't fit in
    /// a u64.
    pub fn fee_for(&self, size: u64) -> Option<u64> {
        let scaled = u128::from(size).checked_mul(self.units_per_kb)?;
        u64::try_from(scaled.div_ceil(1000)).ok()
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        Self::per_byte(1)
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} units/kB", self.units_per_kb)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txid_hex_display_and_parse() {
        let id = TxId::from_bytes([0xAB; 32]);
        assert_eq!(id.to_string(), "ab".repeat(32));
        assert_eq!(id.to_string().parse::<TxId>().unwrap(), id);
        assert!("abcd".parse::<TxId>().is_err());
        assert!(format!("{:?}", id).starts_with("TxId("));
    }

    #[test]
    fn outpoint_display() {
        let op = OutPoint::new(TxId::from_bytes([0; 32]), 3);
        assert!(op.to_string().ends_with(":3"));
    }

    #[test]
    fn fee_rate_rounds_up() {
        assert_eq!(FeeRate::per_byte(50).fee_for(560), Some(28_000));
        assert_eq!(FeeRate::per_kilobyte(50).fee_for(560), Some(28));
        assert_eq!(FeeRate::per_kilobyte(1).fee_for(1), Some(1));
        assert_eq!(FeeRate::per_kilobyte(1000).fee_for(7), Some(7));
        assert_eq!(FeeRate::ZERO.fee_for(10_000), Some(0));
    }

    #[test]
    fn fee_rate_overflow_is_none() {
        assert_eq!(FeeRate::per_kilobyte(u64::MAX).fee_for(u64::MAX), None);
        assert_eq!(FeeRate::per_byte(u64::MAX).fee_for(u64::MAX), None);
    }

    #[test]
    fn huge_per_byte_rate_is_not_truncated() {
        let rate = FeeRate::per_byte(u64::MAX);
        assert_eq!(rate.units_per_kb(), u128::from(u64::MAX) * 1000);
        assert_eq!(rate.fee_for(1), Some(u64::MAX));
        assert_eq!(rate.fee_for(2), None);
        assert_ne!(rate, FeeRate::per_kilobyte(u64::MAX));
    }

    #[test]
    fn cell_edit_payload_is_json() {
        let edit = CellEdit {
            row: 3,
            col: 5,
            value: "42".to_string(),
            timestamp: 1_700_000_000_000,
        };
        let payload = edit.to_payload().unwrap();
        assert_eq!(payload.content_type(), "application/json");
        let back: CellEdit = serde_json::from_slice(payload.bytes()).unwrap();
        assert_eq!(back, edit);
        assert_eq!(edit.entity_id(), EntityId::new(3, 5));
    }

    #[test]
    fn data_len_counts_embedded_bytes_only() {
        let addr = Address::from_pubkey_hash([0; 20], crate::config::Network::Mainnet);
        assert_eq!(TxOutput::payment(addr, 1000).data_len(), 0);
        assert_eq!(TxOutput::marker(addr, 1).data_len(), 0);
        assert_eq!(TxOutput::data(DataRole::Attestation, 0, vec![1, 2, 3]).data_len(), 3);
        assert_eq!(TxOutput::inscription(vec![0; 9]).data_len(), 9);
    }

    #[test]
    fn output_json_is_tagged() {
        let out = TxOutput::data(DataRole::Payload(0), 1, vec![0xCA, 0xFE]);
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["kind"]["type"], "data");
        assert_eq!(json["kind"]["chunk"], "cafe");
        let back: TxOutput = serde_json::from_value(json).unwrap();
        assert_eq!(back, out);
    }
}
