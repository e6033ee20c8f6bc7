//! Interest rate strategy
//!
//! Quotes the interest a borrower pays up front and the collateral held in
//! escrow for the life of the loan. Quotes are a pure function of the inputs
//! and the data provider snapshot; only the final division floors.

use std::sync::Arc;

use lenders_common::{math, AssetId, EngineConfig, LendingError, Result, BPS, U256, WAD};
use lenders_provider::{DataProvider, RateInputs};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Cost of a prospective loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Interest collected up front, never refunded
    pub interest_due: U256,
    /// Collateral escrowed until payback
    pub collateral_required: U256,
}

impl Quote {
    /// Escrow a borrower must attach to `pay_interest`
    pub fn escrow_required(&self) -> Result<U256> {
        math::add(self.interest_due, self.collateral_required)
    }
}

/// Loan pricing seam between the factory and a rate model
pub trait InterestRateStrategy: Send + Sync {
    /// Quote `(interest_due, collateral_required)` for borrowing `principal`
    /// of `asset` over `term`
    fn quote(&self, asset: &AssetId, principal: U256, term: u16) -> Result<Quote>;
}

/// Utilization-linear rate plus a flat origination charge
pub struct LinearRateStrategy {
    provider: Arc<DataProvider>,
    global_rate_factor: u64,
    /// Collateral per unit of principal, scaled by WAD
    collateral_factor: U256,
}

impl LinearRateStrategy {
    /// Create a strategy with the default 5% collateral requirement
    pub fn new(provider: Arc<DataProvider>, global_rate_factor: u64) -> Self {
        Self::with_collateral_bps(
            provider,
            global_rate_factor,
            lenders_common::DEFAULT_COLLATERAL_BPS,
        )
    }

    pub fn with_collateral_bps(
        provider: Arc<DataProvider>,
        global_rate_factor: u64,
        collateral_bps: u64,
    ) -> Self {
        Self {
            provider,
            global_rate_factor,
            collateral_factor: U256::from(collateral_bps) * WAD / BPS,
        }
    }

    pub fn from_config(provider: Arc<DataProvider>, config: &EngineConfig) -> Self {
        Self::with_collateral_bps(provider, config.global_rate_factor, config.collateral_bps)
    }

    pub fn global_rate_factor(&self) -> u64 {
        self.global_rate_factor
    }

    pub fn collateral_factor(&self) -> U256 {
        self.collateral_factor
    }

    /// Price a loan from an explicit provider snapshot
    pub fn quote_with(&self, inputs: &RateInputs, principal: U256, term: u16) -> Result<Quote> {
        if principal.is_zero() || term == 0 {
            return Err(LendingError::InvalidAmount);
        }

        let utilization = math::utilization_bps(inputs.used, inputs.total)?;
        let rate = math::add(
            math::mul(U256::from(inputs.base_rate), BPS)?,
            math::mul(U256::from(inputs.rate_slope), utilization)?,
        )?;

        let scale = math::mul(BPS, BPS)?;
        let variable = math::mul(math::mul(principal, rate)?, U256::from(term))?;
        let flat = math::mul(math::mul(U256::from(self.global_rate_factor), WAD)?, scale)?;
        let interest_due = math::div(math::add(variable, flat)?, scale)?;

        let collateral_required = math::mul_div(principal, self.collateral_factor, WAD)?;

        Ok(Quote {
            interest_due,
            collateral_required,
        })
    }
}

impl InterestRateStrategy for LinearRateStrategy {
    #[instrument(skip(self))]
    fn quote(&self, asset: &AssetId, principal: U256, term: u16) -> Result<Quote> {
        let inputs = self.provider.rate_inputs(asset)?;
        let quote = self.quote_with(&inputs, principal, term)?;
        debug!(
            interest = %quote.interest_due,
            collateral = %quote.collateral_required,
            "Loan quoted"
        );
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lenders_common::math::units_frac;
    use lenders_common::{units, Address, PoolHandle};
    use proptest::prelude::*;

    fn dai() -> AssetId {
        Address::repeat_byte(0xda)
    }

    fn factory() -> Address {
        Address::repeat_byte(0xfa)
    }

    fn reference_provider(total: U256, used: U256) -> Arc<DataProvider> {
        let provider = Arc::new(DataProvider::new());
        provider.initialize(10, 5, factory()).unwrap();
        provider
            .register_pool(
                factory(),
                dai(),
                Address::repeat_byte(0x1e),
                PoolHandle::derive(factory(), 0),
                "Dai",
                "Dai",
            )
            .unwrap();
        if !total.is_zero() {
            provider
                .on_deposit(factory(), dai(), Address::repeat_byte(0x01), total)
                .unwrap();
        }
        if !used.is_zero() {
            provider
                .on_loan_issued(factory(), dai(), Address::repeat_byte(0x02), used)
                .unwrap();
        }
        provider
    }

    #[test]
    fn test_reference_quote() {
        let strategy = LinearRateStrategy::new(reference_provider(units(4000), U256::ZERO), 5);
        let quote = strategy.quote(&dai(), units(1500), 1).unwrap();

        assert_eq!(quote.interest_due, units_frac(65, 1));
        assert_eq!(quote.collateral_required, units(75));
        assert_eq!(quote.escrow_required().unwrap(), units_frac(815, 1));
    }

    #[test]
    fn test_collateral_factor_is_five_percent() {
        let strategy = LinearRateStrategy::new(reference_provider(units(1), U256::ZERO), 5);
        assert_eq!(strategy.collateral_factor(), units(5) / U256::from(100u64));
    }

    #[test]
    fn test_utilization_raises_interest() {
        let idle = LinearRateStrategy::new(reference_provider(units(4000), U256::ZERO), 5);
        let busy = LinearRateStrategy::new(reference_provider(units(4000), units(2000)), 5);

        let idle_quote = idle.quote(&dai(), units(1000), 1).unwrap();
        let busy_quote = busy.quote(&dai(), units(1000), 1).unwrap();

        // 10 bps idle, 10 + 5 · 0.5 = 12.5 bps at half utilization
        assert_eq!(idle_quote.interest_due, units(1) + units(5));
        assert_eq!(busy_quote.interest_due, units_frac(125, 2) + units(5));
        assert_eq!(idle_quote.collateral_required, busy_quote.collateral_required);
    }

    #[test]
    fn test_term_scales_variable_part() {
        let strategy = LinearRateStrategy::new(reference_provider(units(4000), U256::ZERO), 5);
        let quote = strategy.quote(&dai(), units(1500), 4).unwrap();
        assert_eq!(quote.interest_due, units(6) + units(5));
    }

    #[test]
    fn test_empty_pool_has_zero_utilization() {
        let strategy = LinearRateStrategy::new(reference_provider(U256::ZERO, U256::ZERO), 0);
        let quote = strategy.quote(&dai(), units(10_000), 1).unwrap();
        assert_eq!(quote.interest_due, units(10));
    }

    #[test]
    fn test_invalid_inputs() {
        let strategy = LinearRateStrategy::new(reference_provider(units(1), U256::ZERO), 5);
        assert_eq!(strategy.quote(&dai(), U256::ZERO, 1), Err(LendingError::InvalidAmount));
        assert_eq!(strategy.quote(&dai(), units(1), 0), Err(LendingError::InvalidAmount));

        let other = Address::repeat_byte(0x77);
        assert_eq!(strategy.quote(&other, units(1), 1), Err(LendingError::PoolNotFound(other)));
    }

    #[test]
    fn test_uninitialized_provider() {
        let strategy = LinearRateStrategy::new(Arc::new(DataProvider::new()), 5);
        assert_eq!(strategy.quote(&dai(), units(1), 1), Err(LendingError::NotInitialized));
    }

    #[test]
    fn test_overflow_is_reported() {
        let strategy = LinearRateStrategy::new(reference_provider(units(1), U256::ZERO), 5);
        assert_eq!(strategy.quote(&dai(), U256::MAX, 1), Err(LendingError::Overflow));
    }

    proptest! {
        #[test]
        fn prop_quote_is_deterministic(
            principal in 1u64..1_000_000_000,
            term in 1u16..365,
            used in 0u64..4000,
        ) {
            let strategy = LinearRateStrategy::new(reference_provider(units(4000), units(used)), 5);
            let first = strategy.quote(&dai(), units(principal), term).unwrap();
            let second = strategy.quote(&dai(), units(principal), term).unwrap();
            prop_assert_eq!(first, second);
            prop_assert!(first.interest_due >= units(5));
        }
    }
}
