//! Attestation records and their byte format.
//!
//! ## Wire format
//!
//! Every variable-length field is a `u16` little-endian length followed by
//! that many bytes. Integers are little-endian.
//!
//! ```text
//! protocol_id   (len-prefixed)  "DOCANCHOR"
//! operation     (len-prefixed)  "ATTEST"
//! subject_id    (len-prefixed)  e.g. "sheet-7"
//! subject_kind  (len-prefixed)  "document" | "cell" | "snapshot"
//! version       u32
//! timestamp_ms  u64
//! has_previous  u8              0 or 1
//! previous_ref  [u8; 32]        only when has_previous == 1
//! ```

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::AttestationError;
use crate::config::{ATTESTATION_CONTENT_TYPE, ATTESTATION_OPERATION, ATTESTATION_PROTOCOL_ID};
use crate::transaction::types::{Payload, TxId};

/// What kind of thing is being attested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Document,
    Cell,
    Snapshot,
}

impl SubjectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Cell => "cell",
            Self::Snapshot => "snapshot",
        }
    }

    fn from_tag(tag: &str) -> Result<Self, AttestationError> {
        match tag {
            "document" => Ok(Self::Document),
            "cell" => Ok(Self::Cell),
            "snapshot" => Ok(Self::Snapshot),
            other => Err(AttestationError::UnknownSubjectKind(other.to_string())),
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The thing a version chain is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    pub kind: SubjectKind,
}

impl Subject {
    pub fn new(id: impl Into<String>, kind: SubjectKind) -> Self {
        Self { id: id.into(), kind }
    }

    pub fn document(id: impl Into<String>) -> Self {
        Self::new(id, SubjectKind::Document)
    }

    pub fn cell(id: impl Into<String>) -> Self {
        Self::new(id, SubjectKind::Cell)
    }

    pub fn snapshot(id: impl Into<String>) -> Self {
        Self::new(id, SubjectKind::Snapshot)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// One link in a subject's version chain.
///
/// Construct with [`build_attestation`], which enforces the chain rules:
/// version 1 has no predecessor, every later version has exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    subject: Subject,
    version: u32,
    timestamp_ms: u64,
    previous: Option<TxId>,
}

impl Attestation {
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Unix milliseconds.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// The transaction carrying version `version - 1`, if any.
    pub fn previous(&self) -> Option<&TxId> {
        self.previous.as_ref()
    }

    /// Pin the timestamp. Tests and replays want this; live code doesn't.
    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }
}

/// Build an attestation, enforcing the chain rules.
pub fn build_attestation(
    subject: Subject,
    version: u32,
    previous: Option<TxId>,
) -> Result<Attestation, AttestationError> {
    if subject.id.is_empty() {
        return Err(AttestationError::EmptySubject);
    }
    if subject.id.len() > u16::MAX as usize {
        return Err(AttestationError::SubjectTooLong(subject.id.len()));
    }
    match (version, previous.is_some()) {
        (0, _) => return Err(AttestationError::InvalidVersion(0)),
        (1, true) => return Err(AttestationError::UnexpectedPredecessor),
        (v, false) if v > 1 => return Err(AttestationError::MissingPredecessor { version: v }),
        _ => {}
    }

    Ok(Attestation {
        subject,
        version,
        timestamp_ms: now_ms(),
        previous,
    })
}

fn now_ms() -> u64 {
    // Before 1970 is not a thing we support.
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Encode an attestation as an attestation-typed payload.
pub fn serialize(attestation: &Attestation) -> Payload {
    let mut out = Vec::with_capacity(64 + attestation.subject.id.len());
    put_field(&mut out, ATTESTATION_PROTOCOL_ID.as_bytes());
    put_field(&mut out, ATTESTATION_OPERATION.as_bytes());
    put_field(&mut out, attestation.subject.id.as_bytes());
    put_field(&mut out, attestation.subject.kind.as_str().as_bytes());
    out.extend_from_slice(&attestation.version.to_le_bytes());
    out.extend_from_slice(&attestation.timestamp_ms.to_le_bytes());
    match &attestation.previous {
        Some(txid) => {
            out.push(1);
            out.extend_from_slice(txid.as_bytes());
        }
        None => out.push(0),
    }
    Payload::new(ATTESTATION_CONTENT_TYPE, out)
}

// Subject ids are capped at u16::MAX by build_attestation; the fixed tags are short.
fn put_field(out: &mut Vec<u8>, field: &[u8]) {
    out.extend_from_slice(&(field.len() as u16).to_le_bytes());
    out.extend_from_slice(field);
}

/// Decode bytes produced by [`serialize`], re-checking the chain rules.
pub fn parse(bytes: &[u8]) -> Result<Attestation, AttestationError> {
    let mut r = Reader { bytes, pos: 0 };

    if r.field()? != ATTESTATION_PROTOCOL_ID.as_bytes() {
        return Err(AttestationError::WrongProtocol);
    }
    if r.field()? != ATTESTATION_OPERATION.as_bytes() {
        return Err(AttestationError::WrongOperation);
    }
    let id = std::str::from_utf8(r.field()?)
        .map_err(|_| AttestationError::Malformed("subject id is not UTF-8".to_string()))?
        .to_string();
    let kind_tag = std::str::from_utf8(r.field()?)
        .map_err(|_| AttestationError::Malformed("subject kind is not UTF-8".to_string()))?;
    let kind = SubjectKind::from_tag(kind_tag)?;

    let version = u32::from_le_bytes(r.array()?);
    let timestamp_ms = u64::from_le_bytes(r.array()?);
    let previous = match r.take(1)?[0] {
        0 => None,
        1 => Some(TxId::from_bytes(r.array()?)),
        flag => {
            return Err(AttestationError::Malformed(format!(
                "invalid predecessor flag {}",
                flag
            )))
        }
    };
    if r.pos != bytes.len() {
        return Err(AttestationError::Malformed(format!(
            "{} trailing bytes",
            bytes.len() - r.pos
        )));
    }

    Ok(build_attestation(Subject { id, kind }, version, previous)?.with_timestamp(timestamp_ms))
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], AttestationError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| AttestationError::Malformed("truncated record".to_string()))?;
        let out = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], AttestationError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn field(&mut self) -> Result<&'a [u8], AttestationError> {
        let len = u16::from_le_bytes(self.array()?) as usize;
        self.take(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn txid(b: u8) -> TxId {
        TxId::from_bytes([b; 32])
    }

    #[test]
    fn version_one_has_no_predecessor() {
        let a = build_attestation(Subject::document("sheet-1"), 1, None).unwrap();
        assert_eq!(a.version(), 1);
        assert!(a.previous().is_none());

        assert_eq!(
            build_attestation(Subject::document("sheet-1"), 1, Some(txid(1))).unwrap_err(),
            AttestationError::UnexpectedPredecessor
        );
    }

    #[test]
    fn later_versions_need_a_predecessor() {
        assert_eq!(
            build_attestation(Subject::document("sheet-1"), 3, None).unwrap_err(),
            AttestationError::MissingPredecessor { version: 3 }
        );
        let a = build_attestation(Subject::document("sheet-1"), 3, Some(txid(2))).unwrap();
        assert_eq!(a.previous(), Some(&txid(2)));
    }

    #[test]
    fn version_zero_and_empty_subject_rejected() {
        assert_eq!(
            build_attestation(Subject::cell("3,5"), 0, None).unwrap_err(),
            AttestationError::InvalidVersion(0)
        );
        assert_eq!(
            build_attestation(Subject::cell(""), 1, None).unwrap_err(),
            AttestationError::EmptySubject
        );
    }

    #[test]
    fn timestamp_defaults_to_now_and_can_be_pinned() {
        let before = now_ms();
        let a = build_attestation(Subject::snapshot("s"), 1, None).unwrap();
        assert!(a.timestamp_ms() >= before);
        assert_eq!(a.with_timestamp(1_700_000_000_000).timestamp_ms(), 1_700_000_000_000);
    }

    #[test]
    fn serialized_field_order() {
        let a = build_attestation(Subject::cell("3,5"), 2, Some(txid(0xAA)))
            .unwrap()
            .with_timestamp(0x0102);
        let payload = serialize(&a);
        assert_eq!(payload.content_type(), ATTESTATION_CONTENT_TYPE);

        let b = payload.bytes();
        assert_eq!(&b[0..2], &[9, 0]);
        assert_eq!(&b[2..11], b"DOCANCHOR");
        assert_eq!(&b[11..13], &[6, 0]);
        assert_eq!(&b[13..19], b"ATTEST");
        assert_eq!(&b[19..21], &[3, 0]);
        assert_eq!(&b[21..24], b"3,5");
        assert_eq!(&b[24..26], &[4, 0]);
        assert_eq!(&b[26..30], b"cell");
        assert_eq!(&b[30..34], &2u32.to_le_bytes());
        assert_eq!(&b[34..42], &0x0102u64.to_le_bytes());
        assert_eq!(b[42], 1);
        assert_eq!(&b[43..75], &[0xAA; 32]);
        assert_eq!(b.len(), 75);
    }

    #[test]
    fn parse_reads_back_serialized_records() {
        let first = build_attestation(Subject::document("doc"), 1, None)
            .unwrap()
            .with_timestamp(42);
        assert_eq!(parse(serialize(&first).bytes()).unwrap(), first);

        let second = build_attestation(Subject::document("doc"), 2, Some(txid(9))).unwrap();
        assert_eq!(parse(serialize(&second).bytes()).unwrap(), second);
    }

    #[test]
    fn parse_rejects_foreign_and_broken_records() {
        let a = build_attestation(Subject::document("doc"), 1, None).unwrap();
        let good = serialize(&a).bytes().to_vec();

        let mut foreign = good.clone();
        foreign[2] = b'X';
        assert_eq!(parse(&foreign).unwrap_err(), AttestationError::WrongProtocol);

        assert!(matches!(
            parse(&good[..good.len() - 3]),
            Err(AttestationError::Malformed(_))
        ));

        let mut trailing = good.clone();
        trailing.push(0);
        assert!(matches!(parse(&trailing), Err(AttestationError::Malformed(_))));

        let mut bad_flag = good;
        let last = bad_flag.len() - 1;
        bad_flag[last] = 7;
        assert!(matches!(parse(&bad_flag), Err(AttestationError::Malformed(_))));

        assert!(parse(&[]).is_err());
    }

    #[test]
    fn parse_enforces_chain_rules() {
        // Hand-craft a version 2 record with no predecessor.
        let a = build_attestation(Subject::document("doc"), 1, None).unwrap();
        let mut bytes = serialize(&a).bytes().to_vec();
        let version_at = bytes.len() - 1 - 8 - 4;
        bytes[version_at] = 2;
        assert_eq!(
            parse(&bytes).unwrap_err(),
            AttestationError::MissingPredecessor { version: 2 }
        );
    }
}
