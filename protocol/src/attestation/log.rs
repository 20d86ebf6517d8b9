//! Per-subject version chains.
//!
//! The log remembers, for every subject, the latest committed version and
//! the transaction that carried it. That's all it needs to hand out the next
//! attestation and to refuse anything that would fork or skip a chain.
//!
//! ```text
//! v1 (tx a) <── v2 (tx b) <── v3 (tx c)      head = (3, c)
//! ```

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::record::{build_attestation, Attestation, Subject};
use super::AttestationError;
use crate::transaction::types::TxId;

/// The latest committed link of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHead {
    pub version: u32,
    pub txid: TxId,
}

/// Thread-safe registry of chain heads.
///
/// `next` takes a read lock, `record` a write lock. Two writers racing to
/// commit the same version: one wins, the other gets
/// [`AttestationError::NotNextVersion`].
#[derive(Debug, Default)]
pub struct AttestationLog {
    heads: RwLock<HashMap<Subject, ChainHead>>,
}

impl AttestationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current head of a subject's chain, if it has one.
    pub fn head(&self, subject: &Subject) -> Option<ChainHead> {
        self.heads.read().get(subject).copied()
    }

    /// Number of subjects with at least one committed version.
    pub fn len(&self) -> usize {
        self.heads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.read().is_empty()
    }

    /// The attestation that would extend `subject`'s chain by one.
    ///
    /// Nothing is reserved. Commit it with [`record`](Self::record) once the
    /// carrying transaction has an id.
    pub fn next(&self, subject: &Subject) -> Result<Attestation, AttestationError> {
        match self.head(subject) {
            None => build_attestation(subject.clone(), 1, None),
            Some(head) => {
                let version = head
                    .version
                    .checked_add(1)
                    .ok_or(AttestationError::InvalidVersion(head.version))?;
                build_attestation(subject.clone(), version, Some(head.txid))
            }
        }
    }

    /// Commit `attestation` as carried by `carrier`.
    ///
    /// Only succeeds if it extends the current head by exactly one version
    /// and points at the head's transaction.
    pub fn record(
        &self,
        attestation: &Attestation,
        carrier: TxId,
    ) -> Result<ChainHead, AttestationError> {
        let subject = attestation.subject();
        let mut heads = self.heads.write();
        let current = heads.get(subject).copied();

        let expected = current.map_or(1, |h| h.version.saturating_add(1));
        if attestation.version() != expected {
            warn!(
                subject = %subject,
                expected,
                got = attestation.version(),
                "rejected attestation commit: not the next version"
            );
            return Err(AttestationError::NotNextVersion {
                expected,
                got: attestation.version(),
            });
        }

        let expected_prev = current.map(|h| h.txid);
        if attestation.previous().copied() != expected_prev {
            warn!(
                subject = %subject,
                version = expected,
                "rejected attestation commit: wrong predecessor"
            );
            return Err(AttestationError::PredecessorMismatch);
        }

        let head = ChainHead {
            version: attestation.version(),
            txid: carrier,
        };
        heads.insert(subject.clone(), head);
        debug!(
            subject = %subject,
            version = head.version,
            txid = %carrier,
            "attestation committed"
        );
        Ok(head)
    }
}

/// Walk a chain backwards from `head_txid` to version 1.
///
/// `lookup` returns the attestation carried by a transaction, or `None` if
/// it can't be found. The walk checks that every step keeps the subject and
/// drops the version by exactly one. Returns the history oldest first.
pub fn reconstruct_history<F>(
    head_txid: TxId,
    mut lookup: F,
) -> Result<Vec<(TxId, Attestation)>, AttestationError>
where
    F: FnMut(&TxId) -> Option<Attestation>,
{
    let mut history = Vec::new();
    let mut txid = head_txid;
    let mut current = lookup(&txid).ok_or(AttestationError::MissingRecord(txid))?;

    loop {
        let prev = current.previous().copied();
        let version = current.version();
        let subject = current.subject().clone();
        history.push((txid, current));

        let Some(prev_txid) = prev else {
            break;
        };
        let older = lookup(&prev_txid).ok_or(AttestationError::MissingRecord(prev_txid))?;

        if older.subject() != &subject {
            return Err(AttestationError::BrokenHistory(format!(
                "{} points at a record for {}",
                txid,
                older.subject()
            )));
        }
        if older.version().checked_add(1) != Some(version) {
            return Err(AttestationError::BrokenHistory(format!(
                "version {} points at version {}",
                version,
                older.version()
            )));
        }

        txid = prev_txid;
        current = older;
    }

    history.reverse();
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn txid(b: u8) -> TxId {
        TxId::from_bytes([b; 32])
    }

    #[test]
    fn kth_attestation_has_version_k() {
        let log = AttestationLog::new();
        let subject = Subject::document("sheet");
        for k in 1..=5u8 {
            let att = log.next(&subject).unwrap();
            assert_eq!(att.version(), u32::from(k));
            if k == 1 {
                assert!(att.previous().is_none());
            } else {
                assert_eq!(att.previous(), Some(&txid(k - 1)));
            }
            log.record(&att, txid(k)).unwrap();
        }
        assert_eq!(log.head(&subject), Some(ChainHead { version: 5, txid: txid(5) }));
    }

    #[test]
    fn subjects_are_independent() {
        let log = AttestationLog::new();
        let a = Subject::cell("3,5");
        let b = Subject::cell("5,3");
        log.record(&log.next(&a).unwrap(), txid(1)).unwrap();
        log.record(&log.next(&a).unwrap(), txid(2)).unwrap();
        assert_eq!(log.next(&b).unwrap().version(), 1);
        assert_eq!(log.len(), 1);

        // Same id, different kind: different chain.
        assert_eq!(log.next(&Subject::document("3,5")).unwrap().version(), 1);
    }

    #[test]
    fn stale_commit_rejected() {
        let log = AttestationLog::new();
        let s = Subject::document("d");
        let first = log.next(&s).unwrap();
        log.record(&first, txid(1)).unwrap();
        assert_eq!(
            log.record(&first, txid(2)).unwrap_err(),
            AttestationError::NotNextVersion { expected: 2, got: 1 }
        );
        assert_eq!(log.head(&s).unwrap().txid, txid(1));
    }

    #[test]
    fn wrong_predecessor_rejected() {
        let log = AttestationLog::new();
        let s = Subject::document("d");
        log.record(&log.next(&s).unwrap(), txid(1)).unwrap();

        let forked = build_attestation(s.clone(), 2, Some(txid(99))).unwrap();
        assert_eq!(
            log.record(&forked, txid(2)).unwrap_err(),
            AttestationError::PredecessorMismatch
        );
    }

    #[test]
    fn skipping_a_version_rejected() {
        let log = AttestationLog::new();
        let s = Subject::document("d");
        let skip = build_attestation(s, 2, Some(txid(1))).unwrap();
        assert!(matches!(
            log.record(&skip, txid(2)),
            Err(AttestationError::NotNextVersion { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn concurrent_commits_of_same_version_one_wins() {
        let log = Arc::new(AttestationLog::new());
        let s = Subject::document("race");
        let att = log.next(&s).unwrap();

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let log = Arc::clone(&log);
                let att = att.clone();
                thread::spawn(move || log.record(&att, txid(i)).is_ok())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(log.head(&s).unwrap().version, 1);
    }

    fn three_link_chain() -> HashMap<TxId, Attestation> {
        let log = AttestationLog::new();
        let s = Subject::snapshot("book");
        let mut store = HashMap::new();
        for k in 1..=3u8 {
            let att = log.next(&s).unwrap();
            log.record(&att, txid(k)).unwrap();
            store.insert(txid(k), att);
        }
        store
    }

    #[test]
    fn history_is_oldest_first() {
        let store = three_link_chain();
        let history = reconstruct_history(txid(3), |t| store.get(t).cloned()).unwrap();
        let versions: Vec<u32> = history.iter().map(|(_, a)| a.version()).collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(history[0].0, txid(1));
    }

    #[test]
    fn history_with_missing_link_fails() {
        let mut store = three_link_chain();
        store.remove(&txid(2));
        assert_eq!(
            reconstruct_history(txid(3), |t| store.get(t).cloned()).unwrap_err(),
            AttestationError::MissingRecord(txid(2))
        );
    }

    #[test]
    fn history_with_foreign_subject_fails() {
        let mut store = three_link_chain();
        let imposter = build_attestation(Subject::snapshot("other"), 2, Some(txid(1))).unwrap();
        store.insert(txid(2), imposter);
        assert!(matches!(
            reconstruct_history(txid(3), |t| store.get(t).cloned()),
            Err(AttestationError::BrokenHistory(_))
        ));
    }

    #[test]
    fn history_with_version_gap_fails() {
        let mut store = three_link_chain();
        let gap = build_attestation(Subject::snapshot("book"), 5, Some(txid(2))).unwrap();
        store.insert(txid(6), gap);
        assert!(matches!(
            reconstruct_history(txid(6), |t| store.get(t).cloned()),
            Err(AttestationError::BrokenHistory(_))
        ));
    }
}
