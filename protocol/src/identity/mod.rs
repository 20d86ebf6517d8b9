//! # Identity Module
//!
//! Where keys and addresses come from. Nothing in here is random: every key
//! the wallet ever uses falls out of the master seed and a derivation path.
//!
//! The identity stack is layered:
//!
//! 1. **Derivation**: BIP-32 hierarchical private derivation. Seed + path in,
//!    secp256k1 keypair out.
//! 2. **Entity**: the per-cell convention on top: `root / row' / col'`.
//! 3. **Address**: Base58Check pay-to-pubkey-hash. What users see and paste.
//!
//! ## Design Decisions
//!
//! - Entity paths are hardened at every level. A leaked cell key can't be
//!   walked back up to the root or sideways to a neighbouring cell.
//! - Addresses are plain P2PKH so any ledger explorer can display them.

pub mod address;
pub mod derivation;
pub mod entity;

pub use address::{Address, AddressError};
pub use derivation::{derive, ChildIndex, DerivationError, DerivationPath, MasterSeed};
pub use entity::{derive_for_entity, entity_path, EntityAddress, EntityId, EntityParseError};
