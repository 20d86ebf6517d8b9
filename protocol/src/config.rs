//! # Protocol Configuration & Constants
//!
//! Every magic number in DocAnchor lives here. If you're hardcoding a
//! constant somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! Two layers:
//!
//! - `const` items: values baked into the wire formats (envelope marker,
//!   attestation protocol id, size model). Changing these breaks every
//!   indexer that has ever scanned our outputs. Don't.
//! - [`ProtocolConfig`]: the knobs an embedding application may tune per
//!   deployment (network, chunk size, dust policy, cost cap). Loadable from
//!   TOML so operators don't need a rebuild to move the cost cap.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::derivation::DerivationPath;

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Base58Check version byte for mainnet pay-to-pubkey-hash addresses.
pub const MAINNET_P2PKH_VERSION: u8 = 0x00;

/// Base58Check version byte for testnet pay-to-pubkey-hash addresses.
pub const TESTNET_P2PKH_VERSION: u8 = 0x6f;

/// The ledger network an address or transaction belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Mainnet. Mistakes here cost real money.
    #[default]
    Mainnet,
    /// Testnet. Coins are free, and so are the mistakes.
    Testnet,
}

impl Network {
    /// The Base58Check version byte used for P2PKH addresses on this network.
    pub fn p2pkh_version(self) -> u8 {
        match self {
            Self::Mainnet => MAINNET_P2PKH_VERSION,
            Self::Testnet => TESTNET_P2PKH_VERSION,
        }
    }

    /// Reverse lookup from a version byte. Unknown bytes get `None`: we
    /// don't guess.
    pub fn from_p2pkh_version(version: u8) -> Option<Self> {
        match version {
            MAINNET_P2PKH_VERSION => Some(Self::Mainnet),
            TESTNET_P2PKH_VERSION => Some(Self::Testnet),
            _ => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
        }
    }
}

// ---------------------------------------------------------------------------
// Key Derivation
// ---------------------------------------------------------------------------

/// BIP-32 seeds must be between 128 and 512 bits.
pub const MIN_SEED_LENGTH: usize = 16;

/// Upper bound of the BIP-32 seed length, in bytes.
pub const MAX_SEED_LENGTH: usize = 64;

/// Offset that marks a BIP-32 child index as hardened.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// Root under which per-entity (per-cell) keys are derived. Coin type 236
/// is the registered SLIP-44 value for our target ledger; account 1 is
/// reserved for entity keys so they never collide with funding keys.
pub const DEFAULT_ENTITY_ROOT: &str = "m/44'/236'/1'";

/// Where change goes unless the deployment says otherwise.
pub const DEFAULT_CHANGE_PATH: &str = "m/44'/236'/0'/1'/0'";

// ---------------------------------------------------------------------------
// Envelope Format
// ---------------------------------------------------------------------------

/// Default maximum bytes per data-carrier chunk. One chunk per ledger output.
pub const DEFAULT_CHUNK_SIZE: usize = 220;

/// Hard ceiling on a single data-carrier chunk. A configured chunk size
/// above this is a configuration error, not a suggestion.
pub const MAX_DATA_CARRIER_BYTES: usize = 100_000;

/// Marker that opens every inscription envelope. Indexers scanning the
/// ledger look for exactly these bytes before parsing anything else.
pub const ENVELOPE_MARKER: &[u8] = b"docanchor";

/// Inscription envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// Hard protocol limit on a whole inscription envelope.
pub const MAX_INSCRIPTION_BYTES: usize = 100_000;

/// Content types are length-prefixed with a single byte.
pub const MAX_CONTENT_TYPE_LENGTH: usize = 255;

// ---------------------------------------------------------------------------
// Attestation Format
// ---------------------------------------------------------------------------

/// Protocol identifier written as the first field of every attestation.
pub const ATTESTATION_PROTOCOL_ID: &str = "DOCANCHOR";

/// Operation tag for a version attestation.
pub const ATTESTATION_OPERATION: &str = "ATTEST";

/// Content type of serialized attestations.
pub const ATTESTATION_CONTENT_TYPE: &str = "application/x-docanchor-attestation";

// ---------------------------------------------------------------------------
// Fee & Size Model
// ---------------------------------------------------------------------------

/// Outputs at or below this value are not worth recording; they get
/// folded into the fee instead.
pub const DUST_THRESHOLD: u64 = 546;

/// Value carried by an entity chain marker output. The smallest thing the
/// ledger will relay.
pub const MARKER_OUTPUT_VALUE: u64 = 1;

/// Version, locktime, and the in/out counters.
pub const TX_BASE_SIZE: usize = 10;

/// A signed P2PKH input: outpoint, script with DER signature and
/// compressed pubkey, sequence.
pub const TX_INPUT_SIZE: usize = 148;

/// Output value, script length, and a P2PKH-sized script.
pub const TX_OUTPUT_SIZE: usize = 34;

/// Smallest units per whole coin.
pub const UNITS_PER_COIN: u64 = 100_000_000;

/// Bytes the cost estimator adds on top of the payload to account for
/// inputs, change, and the attestation that rides along with every save.
pub const COST_FIXED_OVERHEAD_BYTES: u64 = 400;

/// Upper bound on the fiat cost shown before a save. Product policy: the
/// UI number is predictable even when it under-reports a huge payload.
pub const DEFAULT_COST_CAP: Decimal = Decimal::ONE;

// ---------------------------------------------------------------------------
// ProtocolConfig
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a [`ProtocolConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {field}: {reason}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// What's wrong with it.
        reason: String,
    },
}

/// Cost estimation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Bytes added to every payload before pricing.
    pub fixed_overhead_bytes: u64,
    /// Fiat ceiling for any single estimate.
    pub cap: Decimal,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            fixed_overhead_bytes: COST_FIXED_OVERHEAD_BYTES,
            cap: DEFAULT_COST_CAP,
        }
    }
}

/// Deployment-tunable parameters.
///
/// Every field has a default, so an empty TOML document is a valid config.
///
/// ```
/// use docanchor_protocol::config::ProtocolConfig;
///
/// let cfg = ProtocolConfig::from_toml_str("network = \"testnet\"\nchunk_size = 100").unwrap();
/// assert_eq!(cfg.chunk_size, 100);
/// assert_eq!(cfg.dust_threshold, 546);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub network: Network,
    pub chunk_size: usize,
    pub dust_threshold: u64,
    pub marker_output_value: u64,
    pub entity_root: String,
    pub change_path: String,
    pub max_inscription_size: usize,
    pub cost: CostConfig,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            chunk_size: DEFAULT_CHUNK_SIZE,
            dust_threshold: DUST_THRESHOLD,
            marker_output_value: MARKER_OUTPUT_VALUE,
            entity_root: DEFAULT_ENTITY_ROOT.to_string(),
            change_path: DEFAULT_CHANGE_PATH.to_string(),
            max_inscription_size: MAX_INSCRIPTION_BYTES,
            cost: CostConfig::default(),
        }
    }
}

impl ProtocolConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with a different network. Handy for tests and testnet tooling.
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    /// Checks the invariants serde can't express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 || self.chunk_size > MAX_DATA_CARRIER_BYTES {
            return Err(ConfigError::Invalid {
                field: "chunk_size",
                reason: format!("must be in 1..={}", MAX_DATA_CARRIER_BYTES),
            });
        }
        if self.max_inscription_size == 0 || self.max_inscription_size > MAX_INSCRIPTION_BYTES {
            return Err(ConfigError::Invalid {
                field: "max_inscription_size",
                reason: format!("must be in 1..={}", MAX_INSCRIPTION_BYTES),
            });
        }
        if self.marker_output_value == 0 {
            return Err(ConfigError::Invalid {
                field: "marker_output_value",
                reason: "marker outputs must carry value".to_string(),
            });
        }
        if self.cost.cap.is_sign_negative() {
            return Err(ConfigError::Invalid {
                field: "cost.cap",
                reason: "must not be negative".to_string(),
            });
        }
        self.entity_root_path()?;
        self.change_derivation_path()?;
        Ok(())
    }

    /// The entity root as a parsed, fully hardened path.
    pub fn entity_root_path(&self) -> Result<DerivationPath, ConfigError> {
        Self::hardened_path("entity_root", &self.entity_root)
    }

    /// The change path as a parsed, fully hardened path.
    pub fn change_derivation_path(&self) -> Result<DerivationPath, ConfigError> {
        Self::hardened_path("change_path", &self.change_path)
    }

    fn hardened_path(field: &'static str, raw: &str) -> Result<DerivationPath, ConfigError> {
        let path: DerivationPath = raw.parse().map_err(|e| ConfigError::Invalid {
            field,
            reason: format!("{}", e),
        })?;
        if !path.is_fully_hardened() {
            return Err(ConfigError::Invalid {
                field,
                reason: "every step must be hardened".to_string(),
            });
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_versions_are_distinct() {
        assert_ne!(MAINNET_P2PKH_VERSION, TESTNET_P2PKH_VERSION);
        assert_eq!(Network::from_p2pkh_version(0x00), Some(Network::Mainnet));
        assert_eq!(Network::from_p2pkh_version(0x6f), Some(Network::Testnet));
        assert_eq!(Network::from_p2pkh_version(0x05), None);
    }

    #[test]
    fn test_default_config_is_valid() {
        let cfg = ProtocolConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.chunk_size, 220);
        assert_eq!(cfg.dust_threshold, 546);
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg = ProtocolConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, ProtocolConfig::default());
    }

    #[test]
    fn test_toml_overrides() {
        let cfg = ProtocolConfig::from_toml_str(
            r#"
            network = "testnet"
            chunk_size = 80
            entity_root = "m/44'/236'/9'"

            [cost]
            fixed_overhead_bytes = 250
            cap = "0.25"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.network, Network::Testnet);
        assert_eq!(cfg.chunk_size, 80);
        assert_eq!(cfg.entity_root, "m/44'/236'/9'");
        assert_eq!(cfg.cost.fixed_overhead_bytes, 250);
        assert_eq!(cfg.cost.cap, Decimal::new(25, 2));
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = ProtocolConfig::from_toml_str("chunk_size = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "chunk_size", .. }));
    }

    #[test]
    fn test_soft_entity_root_rejected() {
        // A non-hardened root would let a leaked child key walk back up.
        let err = ProtocolConfig::from_toml_str("entity_root = \"m/44'/236'/1\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "entity_root", .. }));
    }

    #[test]
    fn test_garbage_toml_is_a_parse_error() {
        let err = ProtocolConfig::from_toml_str("chunk_size = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_size_model_sanity() {
        // An output is cheaper than an input, and the dust threshold is
        // above the marker value. Obvious, but stranger things have shipped.
        assert!(TX_OUTPUT_SIZE < TX_INPUT_SIZE);
        assert!(MARKER_OUTPUT_VALUE < DUST_THRESHOLD);
        assert!(DEFAULT_CHUNK_SIZE <= MAX_DATA_CARRIER_BYTES);
    }
}
