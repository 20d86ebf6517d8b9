//! # Error Taxonomy
//!
//! Every module has its own `thiserror` enum. This one folds them into the
//! five categories a caller actually branches on:
//!
//! | Category            | Typical cause                                        |
//! |---------------------|------------------------------------------------------|
//! | `Configuration`     | bad seed, bad path, bad config, no inputs            |
//! | `InsufficientFunds` | inputs don't cover fee + markers                     |
//! | `Encoding`          | payload too large, malformed envelope, bad JSON      |
//! | `Signing`           | invalid key material, transaction fails verification |
//! | `Attestation`       | chain rules violated, malformed record               |
//!
//! Nothing here is retryable. Every operation in this crate is deterministic,
//! so the same inputs fail the same way on the second try. Fix the input.

use thiserror::Error;

use crate::attestation::AttestationError;
use crate::config::ConfigError;
use crate::crypto::keys::KeyError;
use crate::crypto::signatures::SigningError;
use crate::envelope::EnvelopeError;
use crate::identity::address::AddressError;
use crate::identity::derivation::DerivationError;
use crate::identity::entity::EntityParseError;
use crate::pricing::PricingError;
use crate::transaction::builder::BuildError;
use crate::transaction::verification::TransactionError;
use crate::vault::wallet::WalletError;

/// Result alias for the crate-level error.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-level error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("insufficient funds: have {available}, need {required}")]
    InsufficientFunds {
        /// Sum of input values.
        available: u64,
        /// Fee plus marker values.
        required: u64,
    },

    #[error("encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("signing error: {0}")]
    Signing(#[from] SigningFailure),

    #[error("attestation error: {0}")]
    Attestation(#[from] AttestationError),
}

impl Error {
    /// Always `false`. See the module docs.
    pub fn is_retryable(&self) -> bool {
        false
    }

    /// Short category name, for metrics labels and log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::Encoding(_) => "encoding",
            Self::Signing(_) => "signing",
            Self::Attestation(_) => "attestation",
        }
    }
}

/// Configuration-class failures.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Derivation(#[from] DerivationError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    EntityId(#[from] EntityParseError),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("transaction has no inputs")]
    NoInputs,

    #[error("change of {0} requires a change key")]
    MissingChangeKey(u64),
}

/// Encoding-class failures.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("value overflow while computing {0}")]
    Overflow(&'static str),
}

/// Signing-class failures.
#[derive(Debug, Error)]
pub enum SigningFailure {
    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("transaction failed verification: {0}")]
    Verification(#[from] TransactionError),
}

// ---------------------------------------------------------------------------
// Module errors -> Error
// ---------------------------------------------------------------------------

macro_rules! via {
    ($category:ident, $($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for Error {
                fn from(e: $source) -> Self {
                    Error::$category(e.into())
                }
            }
        )+
    };
}

via!(Configuration, ConfigError, DerivationError, AddressError, EntityParseError, PricingError);
via!(Encoding, EnvelopeError, serde_json::Error);
via!(Signing, SigningError, KeyError, TransactionError);

impl From<WalletError> for Error {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::Derivation(e) => e.into(),
            WalletError::Config(e) => e.into(),
        }
    }
}

impl From<BuildError> for Error {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::NoInputs => Error::Configuration(ConfigurationError::NoInputs),
            BuildError::InsufficientFunds {
                available,
                required,
            } => Error::InsufficientFunds {
                available,
                required,
            },
            BuildError::MissingChangeKey { change } => {
                Error::Configuration(ConfigurationError::MissingChangeKey(change))
            }
            BuildError::Overflow(what) => Error::Encoding(EncodingError::Overflow(what)),
            BuildError::Derivation(e) => e.into(),
            BuildError::Envelope(e) => e.into(),
            BuildError::Signing(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_errors_land_in_the_right_category() {
        let err: Error = BuildError::InsufficientFunds {
            available: 10,
            required: 20,
        }
        .into();
        assert!(matches!(
            err,
            Error::InsufficientFunds {
                available: 10,
                required: 20
            }
        ));

        let err: Error = BuildError::NoInputs.into();
        assert_eq!(err.category(), "configuration");

        let err: Error = BuildError::Envelope(EnvelopeError::MarkerMismatch).into();
        assert_eq!(err.category(), "encoding");

        let err: Error = BuildError::Signing(SigningError::InvalidSecretKey).into();
        assert_eq!(err.category(), "signing");
    }

    #[test]
    fn module_errors_convert() {
        assert_eq!(Error::from(DerivationError::EmptySeed).category(), "configuration");
        assert_eq!(
            Error::from(WalletError::Derivation(DerivationError::EmptySeed)).category(),
            "configuration"
        );
        assert_eq!(Error::from(AttestationError::EmptySubject).category(), "attestation");
        assert_eq!(Error::from(TransactionError::NoInputs).category(), "signing");
        assert_eq!(Error::from(PricingError::Overflow).category(), "configuration");
    }

    #[test]
    fn nothing_is_retryable() {
        let errors: Vec<Error> = vec![
            DerivationError::EmptySeed.into(),
            BuildError::InsufficientFunds {
                available: 1,
                required: 2,
            }
            .into(),
            EnvelopeError::MarkerMismatch.into(),
            SigningError::SigningFailed.into(),
            AttestationError::PredecessorMismatch.into(),
        ];
        assert!(errors.iter().all(|e| !e.is_retryable()));
    }

    #[test]
    fn messages_carry_context() {
        let err: Error = DerivationError::EmptySeed.into();
        assert_eq!(err.to_string(), "configuration error: master seed is empty");
    }
}
