//! External asset interface
//!
//! The factory moves underlying assets between actors and pool custody
//! through an [`AssetBank`]. Pool custody is held under the pool's handle
//! address, so `balance_of(asset, handle)` is what the pool actually owns.

use dashmap::DashMap;
use lenders_common::{math, AccountId, AssetId, LendingError, Result, U256};
use tracing::debug;

/// Fungible asset balances and allowances
#[cfg_attr(test, mockall::automock)]
pub trait AssetBank: Send + Sync {
    fn balance_of(&self, asset: &AssetId, account: &AccountId) -> U256;

    fn allowance(&self, asset: &AssetId, owner: &AccountId, spender: &AccountId) -> U256;

    /// Allow `spender` to move up to `amount` of `owner`'s balance
    fn approve(
        &self,
        asset: &AssetId,
        owner: AccountId,
        spender: AccountId,
        amount: U256,
    ) -> Result<()>;

    /// Move `amount` from `from` to `to`
    fn transfer(&self, asset: &AssetId, from: AccountId, to: AccountId, amount: U256) -> Result<()>;

    /// Move `amount` from `from` to `to` against `spender`'s allowance
    fn transfer_from(
        &self,
        asset: &AssetId,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: U256,
    ) -> Result<()>;
}

/// In-process asset bank
///
/// Uses DashMap for concurrent access; each transfer locks one balance entry
/// at a time.
#[derive(Debug, Default)]
pub struct InMemoryAssetBank {
    balances: DashMap<(AssetId, AccountId), U256>,
    allowances: DashMap<(AssetId, AccountId, AccountId), U256>,
    supply: DashMap<AssetId, U256>,
}

impl InMemoryAssetBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `amount` of `asset` out of thin air for `to`
    pub fn mint(&self, asset: &AssetId, to: AccountId, amount: U256) -> Result<()> {
        let mut supply = self.supply.entry(*asset).or_default();
        let new_supply = math::add(*supply, amount)?;
        *self.balances.entry((*asset, to)).or_default() += amount;
        *supply = new_supply;
        debug!(%asset, %to, %amount, "Minted");
        Ok(())
    }

    pub fn total_supply(&self, asset: &AssetId) -> U256 {
        self.supply.get(asset).map(|s| *s).unwrap_or_default()
    }
}

impl AssetBank for InMemoryAssetBank {
    fn balance_of(&self, asset: &AssetId, account: &AccountId) -> U256 {
        self.balances
            .get(&(*asset, *account))
            .map(|b| *b)
            .unwrap_or_default()
    }

    fn allowance(&self, asset: &AssetId, owner: &AccountId, spender: &AccountId) -> U256 {
        self.allowances
            .get(&(*asset, *owner, *spender))
            .map(|a| *a)
            .unwrap_or_default()
    }

    fn approve(
        &self,
        asset: &AssetId,
        owner: AccountId,
        spender: AccountId,
        amount: U256,
    ) -> Result<()> {
        self.allowances.insert((*asset, owner, spender), amount);
        Ok(())
    }

    fn transfer(
        &self,
        asset: &AssetId,
        from: AccountId,
        to: AccountId,
        amount: U256,
    ) -> Result<()> {
        if from == to {
            return Ok(());
        }

        {
            let mut balance = self.balances.entry((*asset, from)).or_default();
            if *balance < amount {
                return Err(LendingError::TransferFailed(format!(
                    "insufficient balance: {} < {}",
                    *balance, amount
                )));
            }
            *balance -= amount;
        }

        // Balances never exceed the minted supply, so crediting cannot overflow
        *self.balances.entry((*asset, to)).or_default() += amount;
        Ok(())
    }

    fn transfer_from(
        &self,
        asset: &AssetId,
        spender: AccountId,
        from: AccountId,
        to: AccountId,
        amount: U256,
    ) -> Result<()> {
        let mut allowance = self
            .allowances
            .get_mut(&(*asset, from, spender))
            .ok_or_else(|| LendingError::TransferFailed("no allowance".to_string()))?;
        if *allowance < amount {
            return Err(LendingError::TransferFailed(format!(
                "insufficient allowance: {} < {}",
                *allowance, amount
            )));
        }

        self.transfer(asset, from, to, amount)?;
        *allowance -= amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lenders_common::{units, Address};

    fn dai() -> AssetId {
        Address::repeat_byte(0xda)
    }

    #[test]
    fn test_mint_and_transfer() {
        let bank = InMemoryAssetBank::new();
        let alice = Address::repeat_byte(0x01);
        let bob = Address::repeat_byte(0x02);

        bank.mint(&dai(), alice, units(10_000)).unwrap();
        assert_eq!(bank.total_supply(&dai()), units(10_000));

        bank.transfer(&dai(), alice, bob, units(2000)).unwrap();
        assert_eq!(bank.balance_of(&dai(), &alice), units(8000));
        assert_eq!(bank.balance_of(&dai(), &bob), units(2000));

        let result = bank.transfer(&dai(), bob, alice, units(2001));
        assert_eq!(result.unwrap_err().code(), "TRANSFER_FAILED");
        assert_eq!(bank.balance_of(&dai(), &bob), units(2000));
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let bank = InMemoryAssetBank::new();
        let owner = Address::repeat_byte(0x01);
        let spender = Address::repeat_byte(0xfa);
        let pool = Address::repeat_byte(0xb0);
        bank.mint(&dai(), owner, units(10_000)).unwrap();

        assert!(bank.transfer_from(&dai(), spender, owner, pool, units(1)).is_err());

        bank.approve(&dai(), owner, spender, units(5000)).unwrap();
        assert_eq!(bank.allowance(&dai(), &owner, &spender), units(5000));

        bank.transfer_from(&dai(), spender, owner, pool, units(4000)).unwrap();
        assert_eq!(bank.balance_of(&dai(), &pool), units(4000));
        assert_eq!(bank.allowance(&dai(), &owner, &spender), units(1000));

        let result = bank.transfer_from(&dai(), spender, owner, pool, units(1001));
        assert_eq!(result.unwrap_err().code(), "TRANSFER_FAILED");
        assert_eq!(bank.balance_of(&dai(), &owner), units(6000));
    }
}
