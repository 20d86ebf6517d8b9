//! Data-carrier chunking.
//!
//! ```text
//! payload (500 bytes), chunk size 220
//!     -> [0..220) [220..440) [440..500)
//!     -> chunk 0   chunk 1    chunk 2
//! ```
//!
//! Chunk count is always `ceil(len / size)`, every chunk but the last is
//! full, and the empty payload is zero chunks. No trailing empty chunk, ever.

use serde::{Deserialize, Serialize};

use super::EnvelopeError;
use crate::config::{ProtocolConfig, MAX_DATA_CARRIER_BYTES};

/// One piece of a payload, tagged with its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    sequence: u32,
    #[serde(with = "hex::serde")]
    bytes: Vec<u8>,
}

impl Chunk {
    pub fn new(sequence: u32, bytes: Vec<u8>) -> Self {
        Self { sequence, bytes }
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
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
}

/// An ordered list of chunks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Envelope {
    chunks: Vec<Chunk>,
}

impl Envelope {
    /// Reassemble an envelope from chunks read back off a ledger.
    ///
    /// Chunks may arrive in any order; they're sorted by sequence and must
    /// then run `0, 1, 2, ...` with no gaps or duplicates.
    pub fn from_chunks(mut chunks: Vec<Chunk>) -> Result<Self, EnvelopeError> {
        chunks.sort_by_key(Chunk::sequence);
        for (expected, chunk) in chunks.iter().enumerate() {
            let expected = expected as u32;
            if chunk.sequence != expected {
                return Err(EnvelopeError::ChunkSequence {
                    expected,
                    got: chunk.sequence,
                });
            }
        }
        Ok(Self { chunks })
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total payload bytes across all chunks.
    pub fn payload_len(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }

    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }
}

/// Splits and joins payloads at a fixed maximum chunk size.
///
/// ```
/// use docanchor_protocol::envelope::ChunkCodec;
///
/// let codec = ChunkCodec::new(220).unwrap();
/// let env = codec.encode(&[0xAB; 500]);
/// let sizes: Vec<usize> = env.chunks().iter().map(|c| c.len()).collect();
/// assert_eq!(sizes, vec![220, 220, 60]);
/// assert_eq!(codec.decode(&env), vec![0xAB; 500]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCodec {
    max_chunk_size: usize,
}

impl ChunkCodec {
    /// `max_chunk_size` must be in `1..=MAX_DATA_CARRIER_BYTES`.
    pub fn new(max_chunk_size: usize) -> Result<Self, EnvelopeError> {
        if max_chunk_size == 0 || max_chunk_size > MAX_DATA_CARRIER_BYTES {
            return Err(EnvelopeError::InvalidChunkSize {
                size: max_chunk_size,
                max: MAX_DATA_CARRIER_BYTES,
            });
        }
        Ok(Self { max_chunk_size })
    }

    /// A codec using the configured chunk size.
    pub fn from_config(config: &ProtocolConfig) -> Result<Self, EnvelopeError> {
        Self::new(config.chunk_size)
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// How many chunks a payload of `len` bytes becomes.
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.max_chunk_size)
    }

    pub fn encode(&self, payload: &[u8]) -> Envelope {
        let chunks = payload
            .chunks(self.max_chunk_size)
            .enumerate()
            .map(|(i, piece)| Chunk::new(i as u32, piece.to_vec()))
            .collect();
        Envelope { chunks }
    }

    /// Concatenate chunks in order.
    pub fn decode(&self, envelope: &Envelope) -> Vec<u8> {
        let mut out = Vec::with_capacity(envelope.payload_len());
        for chunk in &envelope.chunks {
            out.extend_from_slice(&chunk.bytes);
        }
        out
    }
}
