//! # Entity Addresses
//!
//! Every addressable thing in a document (a cell, for now) gets its own key
//! and its own address, derived from the wallet seed. An edit to cell 3,5 is
//! signed by cell 3,5's key, and anyone holding the address can tell which
//! cell a marker output belongs to without trusting us.
//!
//! Row and column are separate hardened components under the entity root:
//!
//! ```text
//! m/44'/236'/1'/3'/5'   <- cell 3,5
//! m/44'/236'/1'/5'/3'   <- cell 5,3 (different key, obviously)
//! ```
//!
//! Packing both into one index would collide sooner or later. Two components
//! never do.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::address::Address;
use super::derivation::{derive, ChildIndex, DerivationError, DerivationPath, MasterSeed};
use crate::config::Network;
use crate::crypto::keys::{KeyPair, PublicKey};

/// Why an entity id string didn't parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid entity id '{input}': expected \"row,col\"")]
pub struct EntityParseError {
    /// The rejected input.
    pub input: String,
}

/// A cell coordinate. Text form is `"row,col"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    pub row: u32,
    pub col: u32,
}

impl EntityId {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl FromStr for EntityId {
    type Err = EntityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || EntityParseError {
            input: s.to_string(),
        };
        let (row, col) = s.split_once(',').ok_or_else(err)?;
        let row = row.trim().parse().map_err(|_| err())?;
        let col = col.trim().parse().map_err(|_| err())?;
        Ok(Self { row, col })
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.row, self.col)
    }
}

/// An entity's derived key and address. Immutable once created.
#[derive(Debug, Clone)]
pub struct EntityAddress {
    entity_id: EntityId,
    path: DerivationPath,
    keypair: KeyPair,
    address: Address,
}

impl EntityAddress {
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    /// The full derivation path this key sits at.
    pub fn path(&self) -> &DerivationPath {
        &self.path
    }

    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    pub fn address(&self) -> &Address {
        &self.address
    }
}

/// The canonical path for an entity: `root / row' / col'`.
///
/// Fails if the root has any soft step, or if a coordinate doesn't fit in a
/// hardened index.
pub fn entity_path(
    root: &DerivationPath,
    entity_id: EntityId,
) -> Result<DerivationPath, DerivationError> {
    if !root.is_fully_hardened() {
        return Err(DerivationError::NonHardenedRoot {
            path: root.to_string(),
        });
    }
    Ok(root
        .child(ChildIndex::hardened(entity_id.row)?)
        .child(ChildIndex::hardened(entity_id.col)?))
}

/// Derive the key and address for one entity.
///
/// Pure. Same seed, root, entity and network always give the same address.
pub fn derive_for_entity(
    seed: &MasterSeed,
    root: &DerivationPath,
    entity_id: EntityId,
    network: Network,
) -> Result<EntityAddress, DerivationError> {
    let path = entity_path(root, entity_id)?;
    let keypair = derive(seed, &path)?;
    let address = Address::from_public_key(&keypair.public_key(), network);

    debug!(entity = %entity_id, path = %path, address = %address, "derived entity address");

    Ok(EntityAddress {
        entity_id,
        path,
        keypair,
        address,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ENTITY_ROOT;

    fn seed() -> MasterSeed {
        MasterSeed::new(vec![7u8; 32]).unwrap()
    }

    fn root() -> DerivationPath {
        DEFAULT_ENTITY_ROOT.parse().unwrap()
    }

    #[test]
    fn entity_id_parse_and_display() {
        let id: EntityId = "3,5".parse().unwrap();
        assert_eq!(id, EntityId::new(3, 5));
        assert_eq!(id.to_string(), "3,5");
        assert_eq!(" 12 , 0 ".parse::<EntityId>().unwrap(), EntityId::new(12, 0));
    }

    #[test]
    fn bad_entity_ids_rejected() {
        for bad in ["", "3", "3,", ",5", "a,b", "3,5,7", "-1,2"] {
            assert!(bad.parse::<EntityId>().is_err(), "{:?}", bad);
        }
    }

    #[test]
    fn same_entity_same_address() {
        let id: EntityId = "3,5".parse().unwrap();
        let a = derive_for_entity(&seed(), &root(), id, Network::Mainnet).unwrap();
        let b = derive_for_entity(&seed(), &root(), id, Network::Mainnet).unwrap();
        assert_eq!(a.address(), b.address());
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn transposed_entity_differs() {
        let a = derive_for_entity(&seed(), &root(), EntityId::new(3, 5), Network::Mainnet).unwrap();
        let b = derive_for_entity(&seed(), &root(), EntityId::new(5, 3), Network::Mainnet).unwrap();
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn path_is_root_row_col() {
        let a = derive_for_entity(&seed(), &root(), EntityId::new(3, 5), Network::Mainnet).unwrap();
        assert_eq!(a.path().to_string(), "m/44'/236'/1'/3'/5'");
        assert_eq!(a.entity_id(), EntityId::new(3, 5));
        assert!(a.address().matches_public_key(&a.public_key()));
    }

    #[test]
    fn soft_root_rejected() {
        let soft: DerivationPath = "m/44'/236'/1".parse().unwrap();
        assert!(matches!(
            derive_for_entity(&seed(), &soft, EntityId::new(0, 0), Network::Mainnet),
            Err(DerivationError::NonHardenedRoot { .. })
        ));
    }

    #[test]
    fn coordinate_too_large_rejected() {
        assert!(matches!(
            entity_path(&root(), EntityId::new(u32::MAX, 0)),
            Err(DerivationError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn network_changes_address_not_key() {
        let m = derive_for_entity(&seed(), &root(), EntityId::new(1, 1), Network::Mainnet).unwrap();
        let t = derive_for_entity(&seed(), &root(), EntityId::new(1, 1), Network::Testnet).unwrap();
        assert_eq!(m.public_key(), t.public_key());
        assert_ne!(m.address(), t.address());
    }
}
