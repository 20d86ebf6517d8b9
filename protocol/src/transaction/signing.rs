//! Canonical transaction bytes, ids and per-input signature digests.
//!
//! Signing is a separate step from assembling outputs because every input may
//! be owned by a different key. The builder resolves one key per input, then
//! this module signs each input's digest with that input's key.
//!
//! ```text
//! signable = canonical(inputs without signatures, outputs)
//! txid     = double_sha256(signable)
//! sighash  = double_sha256(signable || index u32 || outpoint || value u64)
//! ```
//!
//! The per-input suffix means a signature for input 0 can't be replayed as a
//! signature for input 1, even when both are owned by the same key.

use super::types::{DataRole, OutputKind, TxId, TxInput, TxOutput};
use crate::crypto::hash::{double_sha256, sha256, sha256_multi};
use crate::crypto::keys::{KeyPair, Signature};
use crate::crypto::signatures::{sign, verify, SigningError};

/// Version tag at the front of the canonical bytes.
pub const CANONICAL_FORMAT_VERSION: u16 = 1;

/// Returns the canonical byte representation used for ids and sighashes.
///
/// Fixed-width little-endian integers and length-prefixed byte strings.
/// JSON/serde is intentionally avoided because field ordering is not
/// guaranteed across serialization formats.
pub fn signable_bytes(inputs: &[TxInput], outputs: &[TxOutput]) -> Vec<u8> {
    let data: usize = outputs.iter().map(TxOutput::data_len).sum();
    let mut buf = Vec::with_capacity(16 + inputs.len() * 80 + outputs.len() * 40 + data);

    buf.extend_from_slice(&CANONICAL_FORMAT_VERSION.to_le_bytes());

    buf.extend_from_slice(&(inputs.len() as u32).to_le_bytes());
    for input in inputs {
        buf.extend_from_slice(input.outpoint.txid.as_bytes());
        buf.extend_from_slice(&input.outpoint.vout.to_le_bytes());
        buf.extend_from_slice(&input.value.to_le_bytes());
        buf.extend_from_slice(input.public_key.as_bytes());
    }

    buf.extend_from_slice(&(outputs.len() as u32).to_le_bytes());
    for output in outputs {
        buf.extend_from_slice(&output.value.to_le_bytes());
        match &output.kind {
            OutputKind::Payment { address } => {
                buf.push(0x00);
                buf.push(address.network().p2pkh_version());
                buf.extend_from_slice(address.pubkey_hash());
            }
            OutputKind::Data {
                role,
                sequence,
                chunk,
            } => {
                buf.push(0x01);
                match role {
                    DataRole::Payload(index) => {
                        buf.push(0x00);
                        buf.extend_from_slice(&index.to_le_bytes());
                    }
                    DataRole::Attestation => buf.push(0x01),
                }
                buf.extend_from_slice(&sequence.to_le_bytes());
                put_bytes(&mut buf, chunk);
            }
            OutputKind::Inscription { envelope } => {
                buf.push(0x02);
                put_bytes(&mut buf, envelope);
            }
            OutputKind::Marker { address } => {
                buf.push(0x03);
                buf.push(address.network().p2pkh_version());
                buf.extend_from_slice(address.pubkey_hash());
            }
        }
    }

    buf
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}

/// `double_sha256(signable_bytes)`. Stable across signing.
pub fn compute_txid(signable: &[u8]) -> TxId {
    TxId::from_bytes(double_sha256(signable))
}

/// The digest input `index` signs.
pub fn sighash(signable: &[u8], index: u32, input: &TxInput) -> [u8; 32] {
    let inner = sha256_multi(&[
        signable,
        &index.to_le_bytes(),
        input.outpoint.txid.as_bytes(),
        &input.outpoint.vout.to_le_bytes(),
        &input.value.to_le_bytes(),
    ]);
    sha256(&inner)
}

/// Sign every input with its bound key. `keys[i]` signs `inputs[i]`.
pub fn sign_inputs(
    signable: &[u8],
    inputs: &[TxInput],
    keys: &[KeyPair],
) -> Result<Vec<Signature>, SigningError> {
    inputs
        .iter()
        .zip(keys)
        .enumerate()
        .map(|(index, (input, key))| sign(key, &sighash(signable, index as u32, input)))
        .collect()
}

/// Check one input's signature against its embedded public key.
pub fn verify_input(signable: &[u8], index: u32, input: &TxInput, signature: &Signature) -> bool {
    verify(&input.public_key, &sighash(signable, index, input), signature)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
