//! Property tests for the invariants every other module leans on.
//!
//! Key derivation is the slow part, so the derivation-heavy properties run
//! fewer cases and share one wallet.

use std::sync::OnceLock;

use proptest::prelude::*;
use rust_decimal::Decimal;

use docanchor_protocol::attestation::{AttestationLog, Subject};
use docanchor_protocol::config::ProtocolConfig;
use docanchor_protocol::crypto::{double_sha256, sign, verify, KeyPair, Signature};
use docanchor_protocol::envelope::ChunkCodec;
use docanchor_protocol::identity::{derive, ChildIndex, DerivationPath, EntityId, MasterSeed};
use docanchor_protocol::pricing::CostEstimator;
use docanchor_protocol::transaction::{
    verify_transaction, BuildError, FeeRate, KeyRef, OutPoint, Payload, TransactionBuilder, TxId,
    Utxo,
};
use docanchor_protocol::vault::WalletContext;

fn shared_wallet() -> &'static WalletContext {
    static WALLET: OnceLock<WalletContext> = OnceLock::new();
    WALLET.get_or_init(|| {
        WalletContext::from_seed_bytes(vec![0x5a; 32], ProtocolConfig::default())
            .expect("valid seed")
    })
}

fn entity_path(row: u32, col: u32) -> DerivationPath {
    DerivationPath::from_steps(vec![
        ChildIndex::hardened(44).unwrap(),
        ChildIndex::hardened(row).unwrap(),
        ChildIndex::hardened(col).unwrap(),
    ])
}

proptest! {
    #[test]
    fn chunking_is_lossless(
        payload in proptest::collection::vec(any::<u8>(), 0..2_000),
        size in 1usize..512,
    ) {
        let codec = ChunkCodec::new(size).unwrap();
        let envelope = codec.encode(&payload);

        prop_assert_eq!(envelope.len(), codec.chunk_count(payload.len()));
        prop_assert!(envelope.chunks().iter().all(|c| c.len() <= size && !c.is_empty()));
        for (i, chunk) in envelope.chunks().iter().enumerate() {
            prop_assert_eq!(chunk.sequence(), i as u32);
        }
        prop_assert_eq!(codec.decode(&envelope), payload);
    }

    #[test]
    fn any_bit_flip_breaks_a_signature(
        secret in any::<[u8; 32]>(),
        message in proptest::collection::vec(any::<u8>(), 0..128),
        bit in 0usize..512,
        digest_bit in 0usize..256,
    ) {
        let keypair = KeyPair::from_secret_bytes(&secret);
        prop_assume!(keypair.is_ok());
        let keypair = keypair.unwrap();
        let public_key = keypair.public_key();

        let digest = double_sha256(&message);
        let signature = sign(&keypair, &digest).unwrap();
        prop_assert!(verify(&public_key, &digest, &signature));

        let mut sig_bytes = *signature.as_bytes();
        sig_bytes[bit / 8] ^= 1 << (bit % 8);
        prop_assert!(!verify(&public_key, &digest, &Signature::from_bytes(sig_bytes)));

        let mut flipped = digest;
        flipped[digest_bit / 8] ^= 1 << (digest_bit % 8);
        prop_assert!(!verify(&public_key, &flipped, &signature));
    }

    #[test]
    fn cost_never_exceeds_the_cap(
        payload_size in 0u64..(1 << 40),
        units_per_kb in 0u64..10_000_000,
        rate in 0u64..1_000_000,
    ) {
        let estimator = CostEstimator::default();
        let estimate = estimator
            .estimate_cost(payload_size, FeeRate::per_kilobyte(units_per_kb), Decimal::from(rate))
            .unwrap();
        prop_assert!(estimate.cost <= estimator.cap());
        prop_assert_eq!(estimate.capped, estimate.uncapped_cost > estimator.cap());
    }

    #[test]
    fn kth_attestation_is_version_k(count in 1u8..30) {
        let log = AttestationLog::new();
        let subject = Subject::document("doc");
        for k in 1..=count {
            let attestation = log.next(&subject).unwrap();
            prop_assert_eq!(attestation.version(), u32::from(k));
            prop_assert_eq!(attestation.previous().is_some(), k > 1);
            log.record(&attestation, TxId::from_bytes([k; 32])).unwrap();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn distinct_paths_give_distinct_keys(
        a in (0u32..1_000, 0u32..1_000),
        b in (0u32..1_000, 0u32..1_000),
    ) {
        let seed = MasterSeed::new(vec![0x11; 32]).unwrap();
        let ka = derive(&seed, &entity_path(a.0, a.1)).unwrap();
        let kb = derive(&seed, &entity_path(b.0, b.1)).unwrap();
        prop_assert_eq!(a == b, ka.public_key() == kb.public_key());

        let again = derive(&seed, &entity_path(a.0, a.1)).unwrap();
        prop_assert_eq!(ka.public_key(), again.public_key());
    }

    #[test]
    fn builder_never_spends_more_than_it_has(
        values in proptest::collection::vec(1u64..200_000, 1..4),
        payload_len in 0usize..1_000,
        units_per_kb in 0u64..200_000,
    ) {
        let wallet = shared_wallet();
        let utxos = values.iter().enumerate().map(|(i, value)| {
            Utxo::new(
                OutPoint::new(TxId::from_bytes([i as u8 + 1; 32]), i as u32),
                *value,
                KeyRef::Entity(EntityId::new(0, i as u32)),
            )
        });

        let result = TransactionBuilder::new(wallet.config())
            .inputs(utxos)
            .data_payload(Payload::new("application/octet-stream", vec![0x17; payload_len]))
            .fee_rate(FeeRate::per_kilobyte(units_per_kb))
            .change_key(wallet.change_public_key().unwrap())
            .build(wallet);

        match result {
            Ok(tx) => {
                prop_assert_eq!(tx.total_input(), tx.total_output() + tx.fee);
                prop_assert!(verify_transaction(&tx).is_ok());
            }
            Err(BuildError::InsufficientFunds { available, required }) => {
                prop_assert!(available < required);
                prop_assert_eq!(available, values.iter().sum::<u64>());
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}
