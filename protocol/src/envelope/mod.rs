//! # Envelope Module
//!
//! Ledger outputs are small. Documents are not. This module is how payloads
//! get in and out of transactions.
//!
//! Two formats:
//!
//! - **Data-carrier chunks** ([`chunk`]): split the payload into pieces no
//!   bigger than the configured chunk size, one zero-value output each.
//!   Reassembly is concatenation in sequence order. No header, no magic.
//! - **Inscriptions** ([`inscription`]): one self-describing blob: marker,
//!   version, content type, encoding mode, body. A reader that finds one can
//!   tell what it is without any side channel.
//!
//! Both formats are pure byte transforms. Neither knows anything about keys,
//! fees or transactions.

pub mod chunk;
pub mod inscription;

use thiserror::Error;

pub use chunk::{Chunk, ChunkCodec, Envelope};
pub use inscription::{decode_inscription, encode_inscription, EncodingMode, Inscription};

/// Everything that can go wrong encoding or decoding an envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("chunk size {size} out of range (must be 1..={max})")]
    InvalidChunkSize {
        /// Requested size.
        size: usize,
        /// Protocol maximum.
        max: usize,
    },

    #[error("chunk sequence broken: expected {expected}, got {got}")]
    ChunkSequence {
        /// The sequence number that should have come next.
        expected: u32,
        /// What actually came next.
        got: u32,
    },

    #[error("envelope marker mismatch")]
    MarkerMismatch,

    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u8),

    #[error("envelope truncated: needed {needed} more bytes")]
    Truncated {
        /// How many bytes were missing.
        needed: usize,
    },

    #[error("invalid content type: {0}")]
    InvalidContentType(String),

    #[error("unknown encoding mode {0}")]
    UnknownMode(u8),

    #[error("body is not valid UTF-8")]
    InvalidUtf8,

    #[error("body is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("payload of {size} bytes exceeds the {limit}-byte limit")]
    PayloadTooLarge {
        /// Actual size.
        size: usize,
        /// Applicable limit.
        limit: usize,
    },
}
