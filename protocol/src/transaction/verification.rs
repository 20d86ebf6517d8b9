//! Transaction verification: structural checks and cryptographic validation.
//!
//! [`verify_transaction`] is what a broadcaster, or anyone handed a
//! [`BuiltTransaction`] over the wire, runs before trusting it. The checks
//! are ordered from cheapest to most expensive (integer sums before hashing,
//! hashing before signature verification) to fail fast on obvious garbage.

use thiserror::Error;

use super::builder::BuiltTransaction;
use super::signing::{compute_txid, verify_input};
use super::types::{OutputKind, TxId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during transaction verification.
///
/// Each variant maps to a specific validation rule.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// A transaction has to spend something.
    #[error("transaction has no inputs")]
    NoInputs,

    /// One signature per input, no more, no less.
    #[error("{signatures} signatures for {inputs} inputs")]
    SignatureCountMismatch { inputs: usize, signatures: usize },

    /// Data carriers and inscriptions must be zero-value.
    #[error("data output {index} carries value {value}")]
    ValuedDataOutput { index: usize, value: u64 },

    /// Input total doesn't equal output total plus fee.
    #[error("value imbalance: inputs {inputs}, outputs {outputs}, fee {fee}")]
    ValueImbalance { inputs: u64, outputs: u64, fee: u64 },

    /// Totals that don't fit in a u64.
    #[error("value overflow")]
    Overflow,

    /// The id does not match the double-SHA-256 of the canonical bytes.
    #[error("transaction ID mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: TxId, actual: TxId },

    /// An input's signature does not verify against its public key.
    #[error("invalid signature on input {index}")]
    InvalidSignature { index: usize },
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verifies a built transaction.
///
/// The checks, in order:
///
/// 1. **Inputs**: at least one.
/// 2. **Signature count**: exactly one per input.
/// 3. **Data outputs**: zero-value.
/// 4. **Value balance**: `inputs == outputs + fee`.
/// 5. **Transaction ID**: must equal `double_sha256(signable_bytes)`.
/// 6. **Signatures**: each input's signature over its own digest, against
///    the public key bound to that input.
///
/// # Errors
///
/// Returns the first failing check as a [`TransactionError`].
pub fn verify_transaction(tx: &BuiltTransaction) -> Result<(), TransactionError> {
    // 1. Something to spend.
    if tx.inputs.is_empty() {
        return Err(TransactionError::NoInputs);
    }

    // 2. One signature per input.
    if tx.signatures.len() != tx.inputs.len() {
        return Err(TransactionError::SignatureCountMismatch {
            inputs: tx.inputs.len(),
            signatures: tx.signatures.len(),
        });
    }

    // 3. Data carriers don't move value.
    for (index, output) in tx.outputs.iter().enumerate() {
        let is_data = matches!(
            output.kind,
            OutputKind::Data { .. } | OutputKind::Inscription { .. }
        );
        if is_data && output.value != 0 {
            return Err(TransactionError::ValuedDataOutput {
                index,
                value: output.value,
            });
        }
    }

    // 4. Value balance.
    let inputs = tx
        .inputs
        .iter()
        .try_fold(0u64, |acc, i| acc.checked_add(i.value))
        .ok_or(TransactionError::Overflow)?;
    let outputs = tx
        .outputs
        .iter()
        .try_fold(0u64, |acc, o| acc.checked_add(o.value))
        .ok_or(TransactionError::Overflow)?;
    if outputs.checked_add(tx.fee) != Some(inputs) {
        return Err(TransactionError::ValueImbalance {
            inputs,
            outputs,
            fee: tx.fee,
        });
    }

    // 5. Id integrity.
    let signable = tx.signable_bytes();
    let expected = compute_txid(&signable);
    if tx.id != expected {
        return Err(TransactionError::IdMismatch {
            expected,
            actual: tx.id,
        });
    }

    // 6. Every signature, against its own input.
    for (index, (input, signature)) in tx.inputs.iter().zip(&tx.signatures).enumerate() {
        if !verify_input(&signable, index as u32, input, signature) {
            return Err(TransactionError::InvalidSignature { index });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolConfig;
    use crate::crypto::keys::Signature;
    use crate::identity::entity::EntityId;
    use crate::transaction::builder::TransactionBuilder;
    use crate::transaction::types::{FeeRate, KeyRef, OutPoint, Payload, Utxo};
    use crate::vault::WalletContext;

    /// Helper: build and sign a valid two-input transaction.
    fn valid_tx() -> BuiltTransaction {
        let w = WalletContext::from_seed_bytes(vec![0x77; 32], ProtocolConfig::default()).unwrap();
        TransactionBuilder::new(w.config())
            .input(Utxo::new(
                OutPoint::new(TxId::from_bytes([1; 32]), 0),
                6_000,
                KeyRef::Entity(EntityId::new(0, 1)),
            ))
            .input(Utxo::new(
                OutPoint::new(TxId::from_bytes([2; 32]), 1),
                4_000,
                KeyRef::Entity(EntityId::new(1, 0)),
            ))
            .data_payload(Payload::new("text/plain", b"ledger".to_vec()))
            .fee_rate(FeeRate::per_kilobyte(50))
            .change_key(w.change_public_key().unwrap())
            .build(&w)
            .unwrap()
    }

    #[test]
    fn valid_transaction_passes() {
        assert!(verify_transaction(&valid_tx()).is_ok());
    }

    #[test]
    fn rejects_missing_signature() {
        let mut tx = valid_tx();
        tx.signatures.pop();
        assert_eq!(
            verify_transaction(&tx).unwrap_err(),
            TransactionError::SignatureCountMismatch {
                inputs: 2,
                signatures: 1
            }
        );
    }

    #[test]
    fn rejects_no_inputs() {
        let mut tx = valid_tx();
        tx.inputs.clear();
        tx.signatures.clear();
        assert_eq!(verify_transaction(&tx).unwrap_err(), TransactionError::NoInputs);
    }

    #[test]
    fn rejects_inflated_output() {
        let mut tx = valid_tx();
        let last = tx.outputs.len() - 1;
        tx.outputs[last].value += 1;
        assert!(matches!(
            verify_transaction(&tx),
            Err(TransactionError::ValueImbalance { .. })
        ));
    }

    #[test]
    fn rejects_valued_data_output() {
        let mut tx = valid_tx();
        tx.outputs[0].value = 5;
        tx.fee -= 5;
        assert_eq!(
            verify_transaction(&tx).unwrap_err(),
            TransactionError::ValuedDataOutput { index: 0, value: 5 }
        );
    }

    #[test]
    fn rejects_tampered_id() {
        let mut tx = valid_tx();
        tx.id = TxId::from_bytes([0; 32]);
        assert!(matches!(
            verify_transaction(&tx),
            Err(TransactionError::IdMismatch { .. })
        ));
    }

    #[test]
    fn rejects_tampered_payload() {
        let mut tx = valid_tx();
        if let OutputKind::Data { chunk, .. } = &mut tx.outputs[0].kind {
            chunk[0] ^= 0x01;
        }
        assert!(matches!(
            verify_transaction(&tx),
            Err(TransactionError::IdMismatch { .. })
        ));
    }

    #[test]
    fn rejects_swapped_signatures() {
        let mut tx = valid_tx();
        tx.signatures.swap(0, 1);
        assert_eq!(
            verify_transaction(&tx).unwrap_err(),
            TransactionError::InvalidSignature { index: 0 }
        );
    }

    #[test]
    fn rejects_garbage_signature() {
        let mut tx = valid_tx();
        tx.signatures[1] = Signature::from_bytes([0x42; 64]);
        assert_eq!(
            verify_transaction(&tx).unwrap_err(),
            TransactionError::InvalidSignature { index: 1 }
        );
    }

    #[test]
    fn survives_json_transport() {
        let tx = valid_tx();
        let json = serde_json::to_string(&tx).unwrap();
        let back: BuiltTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tx);
        assert!(verify_transaction(&back).is_ok());
    }
}
