//! # Transaction Module
//!
//! Construction, signing and verification of the ledger transactions that
//! carry payloads and attestations. Every anchored edit or snapshot ends up
//! as a [`BuiltTransaction`].
//!
//! ## Architecture
//!
//! ```text
//! types.rs       : Value types (TxId, Utxo, TxOutput, Payload, FeeRate)
//! builder.rs     : Fluent TransactionBuilder: outputs, fee, change, signing
//! signing.rs     : Canonical bytes, txid, per-input sighash
//! verification.rs: Structural and cryptographic verification
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build**: [`TransactionBuilder`] assembles outputs and prices them.
//! 2. **Sign**: the builder signs each input with the key its UTXO names.
//! 3. **Broadcast**: somebody else's job. The result serializes to JSON.
//! 4. **Verify**: [`verify_transaction`] before trusting one from outside.
//!
//! ## Design Decisions
//!
//! - Transaction IDs are `double_sha256` of the canonical byte representation
//!   (excluding signatures), so the id is known before signing.
//! - All amounts are `u64` in the smallest ledger unit. No floating point
//!   anywhere near monetary values.
//! - Insufficient funds are detected before any key touches a digest.

pub mod builder;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::{
    estimate_size, BuildError, BuiltTransaction, SigningKeySource, TransactionBuilder,
};
pub use signing::{compute_txid, sighash, signable_bytes};
pub use types::{
    CellEdit, DataRole, FeeRate, KeyRef, OutPoint, OutputKind, Payload, TxId, TxInput, TxOutput,
    Utxo,
};
pub use verification::{verify_transaction, TransactionError};
