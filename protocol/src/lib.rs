// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # DocAnchor Protocol: Core Library
//!
//! DocAnchor anchors documents and spreadsheet edits on a UTXO ledger. Every
//! saved edit becomes a small, signed, self-describing record that anyone can
//! find again with nothing but a transaction id and a little patience.
//!
//! The library stays out of the networking business. It derives keys, packs
//! bytes into outputs, signs transactions and checks attestation chains.
//! Broadcasting, fetching UTXOs and talking to indexers belong to whoever
//! embeds it.
//!
//! ## Architecture
//!
//! - **config**: Protocol constants, network parameters, TOML loading.
//! - **crypto**: secp256k1 keys, ECDSA over prehashed digests, hashing.
//! - **identity**: BIP-32 paths, per-cell keys, Base58Check addresses.
//! - **vault**: The wallet context. Holds the seed, caches entity keys.
//! - **envelope**: Chunking and the inscription envelope format.
//! - **attestation**: Versioned, hash-linked records about a subject.
//! - **transaction**: Build, sign and verify ledger transactions.
//! - **pricing**: Fiat cost estimates, capped.
//! - **logging**: `tracing` subscriber setup for embedding applications.
//! - **error**: The crate-level error taxonomy.
//!
//! ## Quick tour
//!
//! ```
//! use docanchor_protocol::config::ProtocolConfig;
//! use docanchor_protocol::identity::EntityId;
//! use docanchor_protocol::vault::WalletContext;
//!
//! let wallet = WalletContext::from_seed_bytes(vec![7u8; 32], ProtocolConfig::default())?;
//! let cell = wallet.entity_address(EntityId::new(3, 4))?;
//! assert_eq!(cell.path().to_string(), "m/44'/236'/1'/3'/4'");
//! # Ok::<(), docanchor_protocol::Error>(())
//! ```
//!
//! ## Ground rules
//!
//! 1. Same seed, same path, same key. Forever.
//! 2. Money is `u64` units or `rust_decimal`. Never a float.
//! 3. Secrets never reach `Debug` output or a log line.
//! 4. Nothing silently truncates. Oversized input is an error.

pub mod attestation;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod logging;
pub mod pricing;
pub mod transaction;
pub mod vault;

pub use error::{Error, Result};
