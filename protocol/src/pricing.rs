//! # Cost Estimation
//!
//! "How much will saving this cost me?" answered before anything is built.
//!
//! The model is deliberately dumb: payload size plus a fixed per-transaction
//! overhead, times the fee rate, converted to fiat at the caller's exchange
//! rate, then capped. The cap is product policy: the number shown next to
//! the save button never exceeds it, even for a 100 MB spreadsheet.
//!
//! All fiat arithmetic is `rust_decimal`. No `f64` anywhere near money.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{CostConfig, ProtocolConfig, UNITS_PER_COIN};
use crate::transaction::types::FeeRate;

/// Errors from cost estimation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PricingError {
    #[error("exchange rate must not be negative, got {0}")]
    NegativeExchangeRate(Decimal),

    #[error("cost cap must not be negative, got {0}")]
    NegativeCap(Decimal),

    #[error("arithmetic overflow while estimating cost")]
    Overflow,
}

/// The result of an estimate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostEstimate {
    /// Fee in the smallest ledger unit.
    pub fee_units: u64,
    /// Fiat cost before the cap.
    pub uncapped_cost: Decimal,
    /// Fiat cost after the cap. This is the number to show.
    pub cost: Decimal,
    /// `true` when the cap kicked in.
    pub capped: bool,
}

/// Prices payloads before they are built.
///
/// ```
/// use docanchor_protocol::pricing::CostEstimator;
/// use docanchor_protocol::transaction::FeeRate;
/// use rust_decimal::Decimal;
///
/// let estimator = CostEstimator::default();
/// let estimate = estimator
///     .estimate_cost(1_000_000, FeeRate::per_byte(50), Decimal::from(50))
///     .unwrap();
/// assert!(estimate.capped);
/// assert_eq!(estimate.cost, Decimal::ONE);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostEstimator {
    fixed_overhead_bytes: u64,
    cap: Decimal,
}

impl CostEstimator {
    pub fn new(fixed_overhead_bytes: u64, cap: Decimal) -> Result<Self, PricingError> {
        if cap.is_sign_negative() && !cap.is_zero() {
            return Err(PricingError::NegativeCap(cap));
        }
        Ok(Self {
            fixed_overhead_bytes,
            cap,
        })
    }

    pub fn from_config(config: &ProtocolConfig) -> Result<Self, PricingError> {
        Self::new(config.cost.fixed_overhead_bytes, config.cost.cap)
    }

    pub fn cap(&self) -> Decimal {
        self.cap
    }

    /// Estimate the fiat cost of anchoring `payload_size` bytes.
    ///
    /// `exchange_rate` is fiat per whole coin (10^8 units).
    pub fn estimate_cost(
        &self,
        payload_size: u64,
        fee_rate: FeeRate,
        exchange_rate: Decimal,
    ) -> Result<CostEstimate, PricingError> {
        if exchange_rate.is_sign_negative() && !exchange_rate.is_zero() {
            return Err(PricingError::NegativeExchangeRate(exchange_rate));
        }

        let bytes = payload_size
            .checked_add(self.fixed_overhead_bytes)
            .ok_or(PricingError::Overflow)?;
        let fee_units = fee_rate.fee_for(bytes).ok_or(PricingError::Overflow)?;

        let uncapped_cost = Decimal::from(fee_units)
            .checked_div(Decimal::from(UNITS_PER_COIN))
            .and_then(|coins| coins.checked_mul(exchange_rate))
            .ok_or(PricingError::Overflow)?;

        let capped = uncapped_cost > self.cap;
        let cost = if capped { self.cap } else { uncapped_cost };

        Ok(CostEstimate {
            fee_units,
            uncapped_cost,
            cost,
            capped,
        })
    }
}

impl Default for CostEstimator {
    fn default() -> Self {
        let CostConfig {
            fixed_overhead_bytes,
            cap,
        } = CostConfig::default();
        Self {
            fixed_overhead_bytes,
            cap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{COST_FIXED_OVERHEAD_BYTES, DEFAULT_COST_CAP};

    #[test]
    fn large_payload_hits_the_cap_exactly() {
        let est = CostEstimator::default()
            .estimate_cost(1_000_000, FeeRate::per_byte(50), Decimal::from(50))
            .unwrap();
        assert_eq!(est.fee_units, (1_000_000 + COST_FIXED_OVERHEAD_BYTES) * 50);
        assert!(est.uncapped_cost > DEFAULT_COST_CAP);
        assert!(est.capped);
        assert_eq!(est.cost, DEFAULT_COST_CAP);
    }

    #[test]
    fn small_payload_is_priced_linearly() {
        // (100 + 400) bytes * 10 units = 5_000 units = 0.00005 coin.
        let est = CostEstimator::default()
            .estimate_cost(100, FeeRate::per_byte(10), Decimal::from(20_000))
            .unwrap();
        assert_eq!(est.fee_units, 5_000);
        assert_eq!(est.cost, Decimal::ONE);
        assert!(!est.capped);

        let cheaper = CostEstimator::default()
            .estimate_cost(100, FeeRate::per_byte(10), Decimal::from(10_000))
            .unwrap();
        assert_eq!(cheaper.cost, Decimal::new(5, 1));
    }

    #[test]
    fn zero_exchange_rate_is_free() {
        let est = CostEstimator::default()
            .estimate_cost(10_000, FeeRate::per_byte(5), Decimal::ZERO)
            .unwrap();
        assert_eq!(est.cost, Decimal::ZERO);
    }

    #[test]
    fn negative_exchange_rate_rejected() {
        assert_eq!(
            CostEstimator::default()
                .estimate_cost(10, FeeRate::per_byte(1), Decimal::from(-3))
                .unwrap_err(),
            PricingError::NegativeExchangeRate(Decimal::from(-3))
        );
    }

    #[test]
    fn negative_cap_rejected() {
        assert!(CostEstimator::new(0, Decimal::from(-1)).is_err());
        assert!(CostEstimator::new(0, Decimal::ZERO).is_ok());
    }

    #[test]
    fn from_config_uses_configured_cap() {
        let mut config = ProtocolConfig::default();
        config.cost.cap = Decimal::new(25, 2);
        let est = CostEstimator::from_config(&config)
            .unwrap()
            .estimate_cost(5_000_000, FeeRate::per_byte(100), Decimal::from(60_000))
            .unwrap();
        assert_eq!(est.cost, Decimal::new(25, 2));
    }

    #[test]
    fn overflowing_size_is_an_error() {
        assert_eq!(
            CostEstimator::default()
                .estimate_cost(u64::MAX, FeeRate::per_byte(1), Decimal::ONE)
                .unwrap_err(),
            PricingError::Overflow
        );
    }
}
