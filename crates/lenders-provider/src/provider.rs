//! Pool registry and state mirror
//!
//! Provides:
//! - One-shot initialization with the rate parameters and the factory address
//! - An append-only list of pool descriptors
//! - Mirrored liquidity counters per pool and details per user
//! - The `(base_rate, rate_slope, used, total)` tuple rates are quoted from

use std::collections::HashMap;

use lenders_common::{
    math, AccountId, Address, AssetId, LendingError, LoanStatus, PoolHandle, Result, U256,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Registry entry of one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDescriptor {
    pub asset: AssetId,
    /// Receipt ledger implementation behind the proxy
    pub ledger_handle: Address,
    /// Proxy the pool is reached through
    pub proxy_handle: PoolHandle,
    pub name: String,
    pub symbol: String,
}

/// Inputs the rate strategy consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateInputs {
    pub base_rate: u64,
    pub rate_slope: u64,
    pub used: U256,
    pub total: U256,
}

impl RateInputs {
    pub fn as_tuple(&self) -> (u64, u64, U256, U256) {
        (self.base_rate, self.rate_slope, self.used, self.total)
    }
}

/// Mirrored position of one account in one pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetails {
    /// Liquidity provided and not yet withdrawn
    pub deposited: U256,
    /// Receipts held (deposits plus outstanding principal)
    pub receipt_balance: U256,
    /// Outstanding loan principal
    pub borrowed_amount: U256,
    /// Interest paid over the account's lifetime
    pub interest_paid: U256,
    pub loan_status: LoanStatus,
}

/// Aggregated view of one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSummary {
    pub asset: AssetId,
    pub proxy_handle: PoolHandle,
    pub total_liquidity: U256,
    pub used_liquidity: U256,
    pub free_liquidity: U256,
    /// `used / total` as a ratio in `[0, 1]`
    pub utilization: Decimal,
}

#[derive(Debug, Clone, Copy)]
struct ProviderParams {
    base_rate: u64,
    rate_slope: u64,
    factory: Address,
}

#[derive(Debug, Clone, Copy, Default)]
struct PoolStats {
    total: U256,
    used: U256,
}

#[derive(Debug, Default)]
struct ProviderState {
    params: Option<ProviderParams>,
    pools: Vec<PoolDescriptor>,
    index: HashMap<AssetId, usize>,
    stats: HashMap<AssetId, PoolStats>,
    users: HashMap<(AssetId, AccountId), UserDetails>,
}

impl ProviderState {
    fn authorize(&self, caller: Address) -> Result<()> {
        match self.params {
            Some(params) if params.factory == caller => Ok(()),
            _ => Err(LendingError::Unauthorized(caller)),
        }
    }

    fn descriptor(&self, asset: &AssetId) -> Result<&PoolDescriptor> {
        self.index
            .get(asset)
            .map(|&i| &self.pools[i])
            .ok_or(LendingError::PoolNotFound(*asset))
    }

    fn stats(&self, asset: &AssetId) -> Result<PoolStats> {
        self.stats
            .get(asset)
            .copied()
            .ok_or(LendingError::PoolNotFound(*asset))
    }

    /// Apply a mirror update computed from current values; commits only on success
    fn mirror<F>(
        &mut self,
        caller: Address,
        asset: AssetId,
        account: AccountId,
        update: F,
    ) -> Result<()>
    where
        F: FnOnce(PoolStats, UserDetails) -> Result<(PoolStats, UserDetails)>,
    {
        self.authorize(caller)?;
        let stats = self.stats(&asset)?;
        let user = self.users.get(&(asset, account)).cloned().unwrap_or_default();

        let (stats, user) = update(stats, user)?;

        self.stats.insert(asset, stats);
        self.users.insert((asset, account), user);
        Ok(())
    }
}

/// Registry and read mirror of all pools
#[derive(Debug, Default)]
pub struct DataProvider {
    state: RwLock<ProviderState>,
}

impl DataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rate parameters and the only address allowed to mutate
    #[instrument(skip(self))]
    pub fn initialize(&self, base_rate: u64, rate_slope: u64, factory: Address) -> Result<()> {
        let mut state = self.state.write();
        if state.params.is_some() {
            return Err(LendingError::AlreadyInitialized);
        }
        state.params = Some(ProviderParams {
            base_rate,
            rate_slope,
            factory,
        });
        info!(%factory, base_rate, rate_slope, "Data provider initialized");
        Ok(())
    }

    /// Factory this provider accepts mutations from
    pub fn factory(&self) -> Option<Address> {
        self.state.read().params.map(|p| p.factory)
    }

    // ============ REGISTRY ============

    #[instrument(skip(self, name, symbol))]
    pub fn register_pool(
        &self,
        caller: Address,
        asset: AssetId,
        ledger_handle: Address,
        proxy_handle: PoolHandle,
        name: &str,
        symbol: &str,
    ) -> Result<()> {
        let mut state = self.state.write();
        state.authorize(caller)?;
        if state.index.contains_key(&asset) {
            return Err(LendingError::DuplicatePool(asset));
        }

        let position = state.pools.len();
        state.pools.push(PoolDescriptor {
            asset,
            ledger_handle,
            proxy_handle,
            name: name.to_string(),
            symbol: symbol.to_string(),
        });
        state.index.insert(asset, position);
        state.stats.insert(asset, PoolStats::default());
        debug!(%asset, %proxy_handle, position, "Pool registered");
        Ok(())
    }

    // ============ MIRRORS ============

    pub fn on_deposit(
        &self,
        caller: Address,
        asset: AssetId,
        provider: AccountId,
        amount: U256,
    ) -> Result<()> {
        self.state.write().mirror(caller, asset, provider, |mut stats, mut user| {
            stats.total = math::add(stats.total, amount)?;
            user.deposited = math::add(user.deposited, amount)?;
            user.receipt_balance = math::add(user.receipt_balance, amount)?;
            Ok((stats, user))
        })
    }

    pub fn on_withdraw(
        &self,
        caller: Address,
        asset: AssetId,
        provider: AccountId,
        amount: U256,
    ) -> Result<()> {
        self.state.write().mirror(caller, asset, provider, |mut stats, mut user| {
            stats.total = math::sub(stats.total, amount)?;
            user.deposited = math::sub(user.deposited, amount)?;
            user.receipt_balance = math::sub(user.receipt_balance, amount)?;
            Ok((stats, user))
        })
    }

    pub fn on_interest_paid(
        &self,
        caller: Address,
        asset: AssetId,
        borrower: AccountId,
        interest: U256,
    ) -> Result<()> {
        self.state.write().mirror(caller, asset, borrower, |stats, mut user| {
            user.interest_paid = math::add(user.interest_paid, interest)?;
            user.loan_status = LoanStatus::InterestPaid;
            Ok((stats, user))
        })
    }

    pub fn on_loan_issued(
        &self,
        caller: Address,
        asset: AssetId,
        borrower: AccountId,
        principal: U256,
    ) -> Result<()> {
        self.state.write().mirror(caller, asset, borrower, |mut stats, mut user| {
            stats.used = math::add(stats.used, principal)?;
            user.borrowed_amount = math::add(user.borrowed_amount, principal)?;
            user.receipt_balance = math::add(user.receipt_balance, principal)?;
            user.loan_status = LoanStatus::Outstanding;
            Ok((stats, user))
        })
    }

    pub fn on_loan_settled(
        &self,
        caller: Address,
        asset: AssetId,
        borrower: AccountId,
        principal: U256,
    ) -> Result<()> {
        self.state.write().mirror(caller, asset, borrower, |mut stats, mut user| {
            stats.used = math::sub(stats.used, principal)?;
            user.borrowed_amount = math::sub(user.borrowed_amount, principal)?;
            user.receipt_balance = math::sub(user.receipt_balance, principal)?;
            user.loan_status = LoanStatus::Settled;
            Ok((stats, user))
        })
    }

    // ============ VIEWS ============

    /// All pools in creation order
    pub fn list_pools(&self) -> Vec<PoolDescriptor> {
        self.state.read().pools.clone()
    }

    pub fn pool_count(&self) -> usize {
        self.state.read().pools.len()
    }

    pub fn total_liquidity(&self, asset: &AssetId) -> Result<U256> {
        Ok(self.state.read().stats(asset)?.total)
    }

    pub fn used_liquidity(&self, asset: &AssetId) -> Result<U256> {
        Ok(self.state.read().stats(asset)?.used)
    }

    /// `(base_rate, rate_slope, used, total)` for one pool, read atomically
    pub fn rate_inputs(&self, asset: &AssetId) -> Result<RateInputs> {
        let state = self.state.read();
        let params = state.params.ok_or(LendingError::NotInitialized)?;
        let stats = state.stats(asset)?;
        Ok(RateInputs {
            base_rate: params.base_rate,
            rate_slope: params.rate_slope,
            used: stats.used,
            total: stats.total,
        })
    }

    pub fn proxy_of(&self, asset: &AssetId) -> Result<PoolHandle> {
        Ok(self.state.read().descriptor(asset)?.proxy_handle)
    }

    pub fn implementation_of(&self, asset: &AssetId) -> Result<Address> {
        Ok(self.state.read().descriptor(asset)?.ledger_handle)
    }

    /// Mirrored position of `account` in the pool of `asset`
    pub fn user_details(&self, account: &AccountId, asset: &AssetId) -> Result<UserDetails> {
        let state = self.state.read();
        state.descriptor(asset)?;
        Ok(state
            .users
            .get(&(*asset, *account))
            .cloned()
            .unwrap_or_default())
    }

    pub fn pool_summary(&self, asset: &AssetId) -> Result<PoolSummary> {
        let state = self.state.read();
        let descriptor = state.descriptor(asset)?;
        let stats = state.stats(asset)?;

        let bps = math::utilization_bps(stats.used, stats.total)?;
        let bps = u64::try_from(bps).map_err(|_| LendingError::Overflow)?;

        Ok(PoolSummary {
            asset: *asset,
            proxy_handle: descriptor.proxy_handle,
            total_liquidity: stats.total,
            used_liquidity: stats.used,
            free_liquidity: stats.total.saturating_sub(stats.used),
            utilization: Decimal::new(bps as i64, 4),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lenders_common::units;
    use rust_decimal_macros::dec;

    fn factory() -> Address {
        Address::repeat_byte(0xfa)
    }

    fn dai() -> AssetId {
        Address::repeat_byte(0xda)
    }

    fn lp() -> AccountId {
        Address::repeat_byte(0x01)
    }

    fn borrower() -> AccountId {
        Address::repeat_byte(0x02)
    }

    fn provider_with_pool() -> DataProvider {
        let provider = DataProvider::new();
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
        provider
    }

    #[test]
    fn test_initialize_once() {
        let provider = DataProvider::new();
        assert_eq!(provider.factory(), None);
        provider.initialize(10, 5, factory()).unwrap();
        assert_eq!(
            provider.initialize(1, 1, factory()),
            Err(LendingError::AlreadyInitialized)
        );
        assert_eq!(provider.factory(), Some(factory()));
    }

    #[test]
    fn test_mutators_require_factory() {
        let provider = DataProvider::new();
        let result = provider.register_pool(
            factory(),
            dai(),
            Address::ZERO,
            PoolHandle::derive(factory(), 0),
            "Dai",
            "Dai",
        );
        assert_eq!(result, Err(LendingError::Unauthorized(factory())));

        let provider = provider_with_pool();
        let intruder = Address::repeat_byte(0x66);
        assert_eq!(
            provider.on_deposit(intruder, dai(), lp(), units(1)),
            Err(LendingError::Unauthorized(intruder))
        );
        assert_eq!(provider.total_liquidity(&dai()).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_register_pool() {
        let provider = provider_with_pool();
        let pools = provider.list_pools();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].asset, dai());
        assert_eq!(provider.proxy_of(&dai()).unwrap(), PoolHandle::derive(factory(), 0));
        assert_eq!(provider.implementation_of(&dai()).unwrap(), Address::repeat_byte(0x1e));

        let again = provider.register_pool(
            factory(),
            dai(),
            Address::ZERO,
            PoolHandle::derive(factory(), 1),
            "Dai",
            "Dai",
        );
        assert_eq!(again, Err(LendingError::DuplicatePool(dai())));
        assert_eq!(provider.pool_count(), 1);
    }

    #[test]
    fn test_unknown_pool() {
        let provider = provider_with_pool();
        let other = Address::repeat_byte(0x77);
        assert_eq!(provider.total_liquidity(&other), Err(LendingError::PoolNotFound(other)));
        assert_eq!(provider.rate_inputs(&other), Err(LendingError::PoolNotFound(other)));
        assert!(provider.user_details(&lp(), &other).is_err());
    }

    #[test]
    fn test_rate_inputs_follow_mirrors() {
        let provider = provider_with_pool();
        provider.on_deposit(factory(), dai(), lp(), units(4000)).unwrap();

        let inputs = provider.rate_inputs(&dai()).unwrap();
        assert_eq!(inputs.as_tuple(), (10, 5, U256::ZERO, units(4000)));

        provider.on_loan_issued(factory(), dai(), borrower(), units(1500)).unwrap();
        assert_eq!(provider.used_liquidity(&dai()).unwrap(), units(1500));

        let summary = provider.pool_summary(&dai()).unwrap();
        assert_eq!(summary.free_liquidity, units(2500));
        assert_eq!(summary.utilization, dec!(0.375));
    }

    #[test]
    fn test_user_details_lifecycle() {
        let provider = provider_with_pool();
        provider.on_deposit(factory(), dai(), lp(), units(4000)).unwrap();
        provider.on_interest_paid(factory(), dai(), borrower(), units(6)).unwrap();
        provider.on_loan_issued(factory(), dai(), borrower(), units(1500)).unwrap();

        let details = provider.user_details(&borrower(), &dai()).unwrap();
        assert_eq!(details.borrowed_amount, units(1500));
        assert_eq!(details.receipt_balance, units(1500));
        assert_eq!(details.loan_status, LoanStatus::Outstanding);

        provider.on_loan_settled(factory(), dai(), borrower(), units(1500)).unwrap();
        let details = provider.user_details(&borrower(), &dai()).unwrap();
        assert_eq!(details.borrowed_amount, U256::ZERO);
        assert_eq!(details.interest_paid, units(6));
        assert_eq!(details.loan_status, LoanStatus::Settled);

        let details = provider.user_details(&lp(), &dai()).unwrap();
        assert_eq!(details.deposited, units(4000));
    }

    #[test]
    fn test_failed_mirror_leaves_state_unchanged() {
        let provider = provider_with_pool();
        provider.on_deposit(factory(), dai(), lp(), units(10)).unwrap();

        let result = provider.on_withdraw(factory(), dai(), lp(), units(11));
        assert_eq!(result, Err(LendingError::Overflow));
        assert_eq!(provider.total_liquidity(&dai()).unwrap(), units(10));
        assert_eq!(provider.user_details(&lp(), &dai()).unwrap().deposited, units(10));
    }

    #[test]
    fn test_summary_serializes() {
        let provider = provider_with_pool();
        let json = serde_json::to_value(provider.pool_summary(&dai()).unwrap()).unwrap();
        assert_eq!(json["utilization"], "0.0000");
    }
}
