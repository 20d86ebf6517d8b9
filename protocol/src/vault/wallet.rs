//! # Wallet Context
//!
//! A [`WalletContext`] is the one object that owns the master seed. Everything
//! else borrows it: the transaction builder asks it for signing keys, the
//! application asks it for entity addresses.
//!
//! There is no global wallet and no "demo mode". If there is no seed, there is
//! no context, and the caller finds out at construction time rather than
//! halfway through signing a transaction.
//!
//! ## Entity cache
//!
//! Deriving a BIP-32 key is five HMAC-SHA512 rounds plus an EC multiply per
//! step. Cheap, but not free, and the editor asks for the same cells over and
//! over. Derived [`EntityAddress`]es are cached by [`EntityId`] for the life of
//! the context.
//!
//! The cache is a `DashMap` and insertion goes through the entry API, which
//! holds the shard lock while deriving. Two threads asking for cell 3,5 at the
//! same time get the same `Arc`, never two different values.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use crate::config::{ConfigError, Network, ProtocolConfig};
use crate::crypto::keys::{KeyPair, PublicKey};
use crate::identity::address::Address;
use crate::identity::derivation::{derive, DerivationError, DerivationPath, MasterSeed};
use crate::identity::entity::{derive_for_entity, EntityAddress, EntityId};
use crate::transaction::builder::SigningKeySource;
use crate::transaction::types::KeyRef;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from setting up a wallet context.
#[derive(Debug, Error)]
pub enum WalletError {
    /// The seed was missing or malformed.
    #[error("key derivation error: {0}")]
    Derivation(#[from] DerivationError),

    /// The configuration didn't validate.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// WalletContext
// ---------------------------------------------------------------------------

/// Seed, configuration and entity cache, bundled.
///
/// # Thread Safety
///
/// `WalletContext` is `Send + Sync`. Share it behind an `Arc` and call
/// [`entity_address`](Self::entity_address) from as many threads as you like.
pub struct WalletContext {
    seed: MasterSeed,
    config: ProtocolConfig,
    entity_root: DerivationPath,
    change_path: DerivationPath,
    cache: DashMap<EntityId, Arc<EntityAddress>>,
}

impl WalletContext {
    /// Create a context, validating the configuration and its derivation
    /// paths up front.
    pub fn new(seed: MasterSeed, config: ProtocolConfig) -> Result<Self, WalletError> {
        config.validate()?;
        let entity_root = config.entity_root_path()?;
        let change_path = config.change_derivation_path()?;

        debug!(
            network = %config.network,
            seed_len = seed.len(),
            entity_root = %entity_root,
            "wallet context created"
        );

        Ok(Self {
            seed,
            config,
            entity_root,
            change_path,
            cache: DashMap::new(),
        })
    }

    /// Shorthand for `new(MasterSeed::new(bytes)?, config)`.
    ///
    /// An empty byte vector is [`DerivationError::EmptySeed`], not a
    /// placeholder wallet.
    pub fn from_seed_bytes(bytes: Vec<u8>, config: ProtocolConfig) -> Result<Self, WalletError> {
        Self::new(MasterSeed::new(bytes)?, config)
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn network(&self) -> Network {
        self.config.network
    }

    /// The cached key and address for an entity, deriving it on first use.
    pub fn entity_address(
        &self,
        entity_id: EntityId,
    ) -> Result<Arc<EntityAddress>, DerivationError> {
        // Fast path: shared lock only.
        if let Some(hit) = self.cache.get(&entity_id) {
            debug!(entity = %entity_id, "entity address cache hit");
            return Ok(Arc::clone(hit.value()));
        }

        let entry = self.cache.entry(entity_id).or_try_insert_with(|| {
            derive_for_entity(&self.seed, &self.entity_root, entity_id, self.config.network)
                .map(Arc::new)
        })?;
        Ok(Arc::clone(entry.value()))
    }

    /// Number of entities derived so far.
    pub fn cached_entities(&self) -> usize {
        self.cache.len()
    }

    /// Derive the key at an arbitrary fully hardened path. Not cached.
    pub fn derive_path(&self, path: &DerivationPath) -> Result<KeyPair, DerivationError> {
        derive(&self.seed, path)
    }

    /// The wallet's change key.
    pub fn change_keypair(&self) -> Result<KeyPair, DerivationError> {
        self.derive_path(&self.change_path)
    }

    /// Public half of the change key, for
    /// [`TransactionBuilder::change_key`](crate::transaction::TransactionBuilder::change_key).
    pub fn change_public_key(&self) -> Result<PublicKey, DerivationError> {
        Ok(self.change_keypair()?.public_key())
    }

    pub fn change_address(&self) -> Result<Address, DerivationError> {
        Ok(Address::from_public_key(
            &self.change_public_key()?,
            self.config.network,
        ))
    }
}

impl SigningKeySource for WalletContext {
    fn signing_key(&self, key_ref: &KeyRef) -> Result<KeyPair, DerivationError> {
        match key_ref {
            KeyRef::Entity(entity_id) => Ok(self.entity_address(*entity_id)?.keypair().clone()),
            KeyRef::Path(path) => self.derive_path(path),
        }
    }
}

impl std::fmt::Debug for WalletContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletContext")
            .field("seed", &self.seed)
            .field("network", &self.config.network)
            .field("cached_entities", &self.cache.len())
            .finish()
    }
}
