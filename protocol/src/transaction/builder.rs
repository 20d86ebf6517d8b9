//! Transaction construction via the builder pattern.
//!
//! The [`TransactionBuilder`] enforces a disciplined construction flow:
//! add inputs and content, call `.build()` with something that can hand out
//! signing keys, and get back a fully signed [`BuiltTransaction`].
//!
//! ## Build order
//!
//! 1. No inputs? Fail before doing anything else.
//! 2. Resolve every input's key (inputs may belong to different entities).
//! 3. Outputs, in this order: payload chunks, inscriptions, attestation
//!    chunks, entity markers, change.
//! 4. Size and fee from the linear model in [`crate::config`].
//! 5. Change = inputs - fee - markers. Negative means
//!    [`BuildError::InsufficientFunds`], and nothing has been signed yet.
//!    Change at or below dust is folded into the fee.
//! 6. Sign each input's digest with its own key.
//!
//! The builder never selects UTXOs. It spends exactly what it's given.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::signing::{compute_txid, sign_inputs, signable_bytes};
use super::types::{DataRole, FeeRate, KeyRef, OutputKind, Payload, TxId, TxInput, TxOutput, Utxo};
use crate::attestation::record::{serialize, Attestation};
use crate::attestation::{parse, AttestationError};
use crate::config::{ProtocolConfig, TX_BASE_SIZE, TX_INPUT_SIZE, TX_OUTPUT_SIZE};
use crate::crypto::keys::{KeyPair, PublicKey, Signature};
use crate::crypto::signatures::SigningError;
use crate::envelope::chunk::{Chunk, ChunkCodec, Envelope};
use crate::envelope::inscription::{
    decode_inscription, encode_inscription, EncodingMode, Inscription,
};
use crate::envelope::EnvelopeError;
use crate::identity::address::Address;
use crate::identity::derivation::DerivationError;

// ---------------------------------------------------------------------------
// Key source
// ---------------------------------------------------------------------------

/// Anything that can turn a [`KeyRef`] into a private key.
///
/// [`WalletContext`](crate::vault::WalletContext) is the real one; a hardware
/// signer or a test stub would implement it too.
pub trait SigningKeySource {
    fn signing_key(&self, key_ref: &KeyRef) -> Result<KeyPair, DerivationError>;
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while building a transaction.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Nothing to spend.
    #[error("transaction has no inputs")]
    NoInputs,

    /// Inputs don't cover fee plus marker outputs.
    #[error("insufficient funds: have {available}, need {required}")]
    InsufficientFunds {
        /// Sum of input values.
        available: u64,
        /// Fee plus marker values.
        required: u64,
    },

    /// There is change worth keeping but nowhere to send it.
    #[error("change of {change} requires a change key")]
    MissingChangeKey {
        /// The change that would have been paid.
        change: u64,
    },

    /// Sums or sizes that don't fit in a u64.
    #[error("value overflow while computing {0}")]
    Overflow(&'static str),

    /// An input's key couldn't be derived.
    #[error("key derivation failed: {0}")]
    Derivation(#[from] DerivationError),

    /// A payload couldn't be chunked or inscribed.
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    /// Signing an input failed.
    #[error("signing failed: {0}")]
    Signing(#[from] SigningError),
}

// ---------------------------------------------------------------------------
// BuiltTransaction
// ---------------------------------------------------------------------------

/// A fully signed transaction, ready for an external broadcaster.
///
/// `signatures[i]` signs `inputs[i]`. The `id` is the double-SHA-256 of the
/// canonical bytes, which exclude signatures, so it's stable across signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltTransaction {
    pub id: TxId,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub signatures: Vec<Signature>,
    /// Input total minus output total, including any folded dust.
    pub fee: u64,
    /// Size used for the fee calculation.
    pub estimated_size: u64,
}

impl BuiltTransaction {
    /// Canonical bytes used for the id and the per-input digests.
    pub fn signable_bytes(&self) -> Vec<u8> {
        signable_bytes(&self.inputs, &self.outputs)
    }

    /// Recompute the id from the current contents.
    pub fn compute_id(&self) -> TxId {
        compute_txid(&self.signable_bytes())
    }

    pub fn total_input(&self) -> u64 {
        self.inputs.iter().map(|i| i.value).sum()
    }

    pub fn total_output(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }

    /// The change output, if one was added. Always the last output.
    pub fn change_output(&self) -> Option<&TxOutput> {
        self.outputs
            .last()
            .filter(|o| matches!(o.kind, OutputKind::Payment { .. }))
    }

    /// Reassemble the `index`-th data payload. `None` if there isn't one.
    ///
    /// An empty payload encodes to zero chunks and leaves no output behind,
    /// so it reads back as `None`, the same as a payload that was never
    /// added. Anchor an empty document as an inscription if its presence
    /// has to be visible on-chain.
    pub fn data_payload(&self, index: u32) -> Option<Vec<u8>> {
        let chunks = self.chunks_for(DataRole::Payload(index));
        if chunks.is_empty() {
            return None;
        }
        let envelope = Envelope::from_chunks(chunks).ok()?;
        Some(envelope.chunks().iter().flat_map(|c| c.bytes().iter().copied()).collect())
    }

    /// Parse the embedded attestation, if there is one.
    pub fn attestation(&self) -> Result<Option<Attestation>, AttestationError> {
        let chunks = self.chunks_for(DataRole::Attestation);
        if chunks.is_empty() {
            return Ok(None);
        }
        let envelope = Envelope::from_chunks(chunks)
            .map_err(|e| AttestationError::Malformed(e.to_string()))?;
        let bytes: Vec<u8> = envelope
            .chunks()
            .iter()
            .flat_map(|c| c.bytes().iter().copied())
            .collect();
        parse(&bytes).map(Some)
    }

    /// Decode every inscription output, in order.
    pub fn inscriptions(&self) -> Result<Vec<Inscription>, EnvelopeError> {
        self.outputs
            .iter()
            .filter_map(|o| match &o.kind {
                OutputKind::Inscription { envelope } => Some(decode_inscription(envelope)),
                _ => None,
            })
            .collect()
    }

    fn chunks_for(&self, wanted: DataRole) -> Vec<Chunk> {
        self.outputs
            .iter()
            .filter_map(|o| match &o.kind {
                OutputKind::Data {
                    role,
                    sequence,
                    chunk,
                } if *role == wanted => Some(Chunk::new(*sequence, chunk.clone())),
                _ => None,
            })
            .collect()
    }
}

/// The linear size model: base + per-input + per-output + embedded bytes.
pub fn estimate_size(inputs: usize, outputs: usize, data_bytes: usize) -> Option<u64> {
    let size = TX_BASE_SIZE
        .checked_add(inputs.checked_mul(TX_INPUT_SIZE)?)?
        .checked_add(outputs.checked_mul(TX_OUTPUT_SIZE)?)?
        .checked_add(data_bytes)?;
    u64::try_from(size).ok()
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for signed [`BuiltTransaction`]s.
///
/// # Usage
///
/// ```rust
/// use docanchor_protocol::config::ProtocolConfig;
/// use docanchor_protocol::identity::EntityId;
/// use docanchor_protocol::transaction::{
///     FeeRate, KeyRef, OutPoint, Payload, TransactionBuilder, TxId, Utxo,
/// };
/// use docanchor_protocol::vault::WalletContext;
///
/// let config = ProtocolConfig::default();
/// let wallet = WalletContext::from_seed_bytes(vec![42; 32], config.clone()).unwrap();
///
/// let utxo = Utxo::new(
///     OutPoint::new(TxId::from_bytes([1; 32]), 0),
///     10_000,
///     KeyRef::Entity(EntityId::new(0, 0)),
/// );
///
/// let tx = TransactionBuilder::new(&config)
///     .input(utxo)
///     .data_payload(Payload::new("text/plain", b"hello ledger".to_vec()))
///     .fee_rate(FeeRate::per_kilobyte(50))
///     .change_key(wallet.change_public_key().unwrap())
///     .build(&wallet)
///     .unwrap();
///
/// assert_eq!(tx.data_payload(0).unwrap(), b"hello ledger");
/// assert_eq!(tx.total_input(), tx.total_output() + tx.fee);
/// ```
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    config: ProtocolConfig,
    inputs: Vec<Utxo>,
    payloads: Vec<Payload>,
    inscriptions: Vec<(Payload, EncodingMode)>,
    attestation: Option<Attestation>,
    markers: Vec<Address>,
    fee_rate: FeeRate,
    change_key: Option<PublicKey>,
}

impl TransactionBuilder {
    /// Creates a new builder using `config`'s chunk size, dust threshold,
    /// marker value and network.
    ///
    /// Defaults: no inputs, no outputs, 1 unit/byte, no change key.
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            config: config.clone(),
            inputs: Vec::new(),
            payloads: Vec::new(),
            inscriptions: Vec::new(),
            attestation: None,
            markers: Vec::new(),
            fee_rate: FeeRate::default(),
            change_key: None,
        }
    }

    /// Spends a UTXO.
    pub fn input(mut self, utxo: Utxo) -> Self {
        self.inputs.push(utxo);
        self
    }

    /// Spends several UTXOs.
    pub fn inputs(mut self, utxos: impl IntoIterator<Item = Utxo>) -> Self {
        self.inputs.extend(utxos);
        self
    }

    /// Embeds a payload as data-carrier chunks.
    pub fn data_payload(mut self, payload: Payload) -> Self {
        self.payloads.push(payload);
        self
    }

    /// Embeds a payload as a single inscription envelope.
    pub fn inscription(mut self, payload: Payload, mode: EncodingMode) -> Self {
        self.inscriptions.push((payload, mode));
        self
    }

    /// Embeds an attestation. Replaces any earlier one.
    pub fn attestation(mut self, attestation: Attestation) -> Self {
        self.attestation = Some(attestation);
        self
    }

    /// Adds a minimal-value marker output at an entity address.
    pub fn entity_marker(mut self, address: Address) -> Self {
        self.markers.push(address);
        self
    }

    pub fn fee_rate(mut self, rate: FeeRate) -> Self {
        self.fee_rate = rate;
        self
    }

    /// Where change goes. Required whenever the change clears the dust
    /// threshold.
    pub fn change_key(mut self, public_key: PublicKey) -> Self {
        self.change_key = Some(public_key);
        self
    }

    /// Assemble, price and sign.
    pub fn build<S: SigningKeySource + ?Sized>(
        self,
        keys: &S,
    ) -> Result<BuiltTransaction, BuildError> {
        if self.inputs.is_empty() {
            return Err(BuildError::NoInputs);
        }

        // 1. One key per input.
        let mut signers = Vec::with_capacity(self.inputs.len());
        let mut inputs = Vec::with_capacity(self.inputs.len());
        for utxo in self.inputs {
            let key = keys.signing_key(&utxo.key_ref)?;
            inputs.push(TxInput {
                outpoint: utxo.outpoint,
                value: utxo.value,
                key_ref: utxo.key_ref,
                public_key: key.public_key(),
            });
            signers.push(key);
        }

        // 2-4. Content outputs.
        let codec = ChunkCodec::from_config(&self.config)?;
        let mut outputs = Vec::new();

        for (index, payload) in self.payloads.iter().enumerate() {
            let role = DataRole::Payload(index as u32);
            for chunk in codec.encode(payload.bytes()).into_chunks() {
                outputs.push(TxOutput::data(role, chunk.sequence(), chunk.bytes().to_vec()));
            }
        }

        for (payload, mode) in self.inscriptions {
            let content_type = payload.content_type().to_string();
            let inscription = Inscription::new(content_type, mode, payload.into_bytes())?;
            outputs.push(TxOutput::inscription(encode_inscription(
                &inscription,
                self.config.max_inscription_size,
            )?));
        }

        if let Some(attestation) = &self.attestation {
            let record = serialize(attestation);
            for chunk in codec.encode(record.bytes()).into_chunks() {
                outputs.push(TxOutput::data(
                    DataRole::Attestation,
                    chunk.sequence(),
                    chunk.bytes().to_vec(),
                ));
            }
        }

        for address in &self.markers {
            outputs.push(TxOutput::marker(*address, self.config.marker_output_value));
        }

        // 5. Size and fee. The +1 reserves a change slot whether or not
        //    change survives.
        let data_bytes: usize = outputs.iter().map(TxOutput::data_len).sum();
        let estimated_size = estimate_size(inputs.len(), outputs.len() + 1, data_bytes)
            .ok_or(BuildError::Overflow("size"))?;
        let fee = self
            .fee_rate
            .fee_for(estimated_size)
            .ok_or(BuildError::Overflow("fee"))?;

        // 6. Change, checked before anything is signed.
        let available = inputs
            .iter()
            .try_fold(0u64, |acc, i| acc.checked_add(i.value))
            .ok_or(BuildError::Overflow("input total"))?;
        let marker_total = outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.value))
            .ok_or(BuildError::Overflow("output total"))?;
        let required = fee
            .checked_add(marker_total)
            .ok_or(BuildError::Overflow("required total"))?;

        let Some(change) = available.checked_sub(required) else {
            warn!(available, required, fee, "insufficient funds for transaction");
            return Err(BuildError::InsufficientFunds {
                available,
                required,
            });
        };

        let mut change_paid = 0;
        if change > self.config.dust_threshold {
            let public_key = self
                .change_key
                .ok_or(BuildError::MissingChangeKey { change })?;
            let address = Address::from_public_key(&public_key, self.config.network);
            outputs.push(TxOutput::payment(address, change));
            change_paid = change;
        }

        // 7. Id and signatures.
        let signable = signable_bytes(&inputs, &outputs);
        let id = compute_txid(&signable);
        let signatures = sign_inputs(&signable, &inputs, &signers)?;

        let tx = BuiltTransaction {
            id,
            fee: available - marker_total - change_paid,
            inputs,
            outputs,
            signatures,
            estimated_size,
        };

        info!(
            txid = %tx.id,
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            fee = tx.fee,
            change = change_paid,
            size = estimated_size,
            "built transaction"
        );

        Ok(tx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
