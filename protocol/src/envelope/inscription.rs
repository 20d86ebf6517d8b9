//! Self-describing inscription envelopes.
//!
//! ## Wire format
//!
//! ```text
//! +-----------+---------+--------+--------------+------+------+
//! | marker    | version | ct_len | content_type | mode | body |
//! | 9 bytes   | u8      | u8     | ct_len bytes | u8   | rest |
//! +-----------+---------+--------+--------------+------+------+
//! ```
//!
//! The marker is checked before anything else is looked at. A blob that
//! doesn't start with it isn't ours, and decoding says so instead of guessing.

use serde::{Deserialize, Serialize};

use super::EnvelopeError;
use crate::config::{
    ENVELOPE_MARKER, ENVELOPE_VERSION, MAX_CONTENT_TYPE_LENGTH, MAX_INSCRIPTION_BYTES,
};

/// How the body should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Opaque bytes.
    Binary,
    /// Must be valid UTF-8.
    Utf8,
    /// Must be valid UTF-8 *and* valid JSON.
    Json,
}

impl EncodingMode {
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Binary => 0,
            Self::Utf8 => 1,
            Self::Json => 2,
        }
    }

    pub fn from_byte(b: u8) -> Result<Self, EnvelopeError> {
        match b {
            0 => Ok(Self::Binary),
            1 => Ok(Self::Utf8),
            2 => Ok(Self::Json),
            other => Err(EnvelopeError::UnknownMode(other)),
        }
    }

    fn check_body(self, body: &[u8]) -> Result<(), EnvelopeError> {
        match self {
            Self::Binary => Ok(()),
            Self::Utf8 => std::str::from_utf8(body)
                .map(|_| ())
                .map_err(|_| EnvelopeError::InvalidUtf8),
            Self::Json => {
                std::str::from_utf8(body).map_err(|_| EnvelopeError::InvalidUtf8)?;
                serde_json::from_slice::<serde_json::Value>(body)
                    .map(|_| ())
                    .map_err(|e| EnvelopeError::InvalidJson(e.to_string()))
            }
        }
    }
}

/// A content-typed body with a declared encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inscription {
    content_type: String,
    mode: EncodingMode,
    #[serde(with = "hex::serde")]
    body: Vec<u8>,
}

impl Inscription {
    /// Validates the content type and that the body matches `mode`.
    pub fn new(
        content_type: impl Into<String>,
        mode: EncodingMode,
        body: Vec<u8>,
    ) -> Result<Self, EnvelopeError> {
        let content_type = content_type.into();
        check_content_type(&content_type)?;
        mode.check_body(&body)?;
        Ok(Self {
            content_type,
            mode,
            body,
        })
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn mode(&self) -> EncodingMode {
        self.mode
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The body as text, for `Utf8` and `Json` inscriptions.
    pub fn text(&self) -> Option<&str> {
        match self.mode {
            EncodingMode::Binary => None,
            EncodingMode::Utf8 | EncodingMode::Json => std::str::from_utf8(&self.body).ok(),
        }
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        ENVELOPE_MARKER.len() + 1 + 1 + self.content_type.len() + 1 + self.body.len()
    }
}

fn check_content_type(ct: &str) -> Result<(), EnvelopeError> {
    if ct.is_empty() {
        return Err(EnvelopeError::InvalidContentType("empty".to_string()));
    }
    if ct.len() > MAX_CONTENT_TYPE_LENGTH {
        return Err(EnvelopeError::InvalidContentType(format!(
            "{} bytes, max {}",
            ct.len(),
            MAX_CONTENT_TYPE_LENGTH
        )));
    }
    if !ct.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
        return Err(EnvelopeError::InvalidContentType(
            "must be printable ASCII".to_string(),
        ));
    }
    Ok(())
}

/// Encode an inscription, refusing anything over `max_size` (itself capped
/// at the protocol's hard limit).
pub fn encode_inscription(
    inscription: &Inscription,
    max_size: usize,
) -> Result<Vec<u8>, EnvelopeError> {
    let limit = max_size.min(MAX_INSCRIPTION_BYTES);
    let size = inscription.encoded_len();
    if size > limit {
        return Err(EnvelopeError::PayloadTooLarge { size, limit });
    }

    let mut out = Vec::with_capacity(size);
    out.extend_from_slice(ENVELOPE_MARKER);
    out.push(ENVELOPE_VERSION);
    // check_content_type bounds the length at 255.
    out.push(inscription.content_type.len() as u8);
    out.extend_from_slice(inscription.content_type.as_bytes());
    out.push(inscription.mode.to_byte());
    out.extend_from_slice(&inscription.body);
    Ok(out)
}

/// Decode and validate an inscription.
pub fn decode_inscription(bytes: &[u8]) -> Result<Inscription, EnvelopeError> {
    // Marker first, even before the size limit. A prefix of the marker is
    // still a mismatch.
    if !bytes.starts_with(ENVELOPE_MARKER) {
        return Err(EnvelopeError::MarkerMismatch);
    }
    if bytes.len() > MAX_INSCRIPTION_BYTES {
        return Err(EnvelopeError::PayloadTooLarge {
            size: bytes.len(),
            limit: MAX_INSCRIPTION_BYTES,
        });
    }

    let mut cursor = Cursor::new(bytes);
    cursor.take(ENVELOPE_MARKER.len())?;

    let version = cursor.byte()?;
    if version != ENVELOPE_VERSION {
        return Err(EnvelopeError::UnsupportedVersion(version));
    }

    let ct_len = cursor.byte()? as usize;
    let ct_bytes = cursor.take(ct_len)?;
    let content_type = std::str::from_utf8(ct_bytes)
        .map_err(|_| EnvelopeError::InvalidContentType("not ASCII".to_string()))?;

    let mode = EncodingMode::from_byte(cursor.byte()?)?;
    let body = cursor.rest().to_vec();

    Inscription::new(content_type, mode, body)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], EnvelopeError> {
        if self.remaining() < n {
            return Err(EnvelopeError::Truncated {
                needed: n - self.remaining(),
            });
        }
        let out = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn byte(&mut self) -> Result<u8, EnvelopeError> {
        Ok(self.take(1)?[0])
    }

    fn rest(&mut self) -> &'a [u8] {
        let out = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        out
    }
}
