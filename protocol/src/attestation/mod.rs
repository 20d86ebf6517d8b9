//! # Attestation Module
//!
//! Append-only version chains for documents, cells and snapshots.
//!
//! Each save produces an [`Attestation`]: "subject S is now at version N,
//! and version N-1 lives in transaction T". The record rides inside the same
//! transaction as the payload, so anyone holding the newest txid can walk the
//! whole history backwards without asking us.
//!
//! - [`record`]: the attestation type, its constructor and its byte format.
//! - [`log`]: the in-process registry of chain heads, plus history
//!   reconstruction.
//!
//! The rules are short:
//!
//! 1. Version 1 has no predecessor.
//! 2. Version N > 1 points at the transaction that carried version N-1.
//! 3. The k-th committed attestation for a subject is version k. No gaps,
//!    no forks.

pub mod log;
pub mod record;

use thiserror::Error;

use crate::transaction::types::TxId;

pub use log::{reconstruct_history, AttestationLog, ChainHead};
pub use record::{build_attestation, parse, serialize, Attestation, Subject, SubjectKind};

/// Errors from building, parsing or committing attestations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttestationError {
    #[error("subject id must not be empty")]
    EmptySubject,

    #[error("subject id too long ({0} bytes)")]
    SubjectTooLong(usize),

    #[error("invalid attestation version {0}")]
    InvalidVersion(u32),

    #[error("version 1 must not reference a predecessor")]
    UnexpectedPredecessor,

    #[error("version {version} must reference its predecessor")]
    MissingPredecessor {
        /// The version that was missing its link.
        version: u32,
    },

    #[error("not an attestation record for this protocol")]
    WrongProtocol,

    #[error("unsupported attestation operation")]
    WrongOperation,

    #[error("unknown subject kind '{0}'")]
    UnknownSubjectKind(String),

    #[error("malformed attestation record: {0}")]
    Malformed(String),

    #[error("expected version {expected}, got {got}")]
    NotNextVersion {
        /// Head version + 1.
        expected: u32,
        /// What was offered.
        got: u32,
    },

    #[error("predecessor does not match the chain head")]
    PredecessorMismatch,

    #[error("no attestation found in transaction {0}")]
    MissingRecord(TxId),

    #[error("broken history: {0}")]
    BrokenHistory(String),
}
