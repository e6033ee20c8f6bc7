//! Collateral escrow
//!
//! `pay_interest` attaches `interest + collateral`. The interest goes to the
//! pool for good; the collateral is held here until the loan is paid back.

use std::collections::HashMap;

use lenders_common::{math, AccountId, AssetId, Result, U256};

#[derive(Debug, Default)]
pub struct EscrowBook {
    held: HashMap<(AssetId, AccountId), U256>,
    total: U256,
}

impl EscrowBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `collateral` for `borrower`'s loan in `asset`
    ///
    /// A borrower has at most one active loan per asset, so any previous
    /// entry was released at its settlement. Nothing changes on error.
    pub fn hold(&mut self, asset: AssetId, borrower: AccountId, collateral: U256) -> Result<()> {
        let previous = self.held(&asset, &borrower);
        let total = math::add(math::sub(self.total, previous)?, collateral)?;

        self.held.insert((asset, borrower), collateral);
        self.total = total;
        Ok(())
    }

    /// Release everything held for `borrower` in `asset`
    pub fn release(&mut self, asset: AssetId, borrower: AccountId) -> Result<U256> {
        let released = self.held(&asset, &borrower);
        let total = math::sub(self.total, released)?;

        self.held.remove(&(asset, borrower));
        self.total = total;
        Ok(released)
    }

    pub fn held(&self, asset: &AssetId, borrower: &AccountId) -> U256 {
        self.held
            .get(&(*asset, *borrower))
            .copied()
            .unwrap_or_default()
    }

    /// Collateral held across all pools
    pub fn total(&self) -> U256 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lenders_common::{units, Address, LendingError};

    fn dai() -> AssetId {
        Address::repeat_byte(0xda)
    }

    #[test]
    fn test_hold_release() {
        let mut book = EscrowBook::new();
        let borrower = Address::repeat_byte(0x02);

        book.hold(dai(), borrower, units(75)).unwrap();
        book.hold(Address::repeat_byte(0xee), borrower, units(5)).unwrap();
        assert_eq!(book.held(&dai(), &borrower), units(75));
        assert_eq!(book.total(), units(80));

        assert_eq!(book.release(dai(), borrower).unwrap(), units(75));
        assert_eq!(book.release(dai(), borrower).unwrap(), U256::ZERO);
        assert_eq!(book.total(), units(5));
    }

    #[test]
    fn test_total_overflow_leaves_book_unchanged() {
        let mut book = EscrowBook::new();
        let alice = Address::repeat_byte(0x01);
        let bob = Address::repeat_byte(0x02);

        book.hold(dai(), alice, U256::MAX).unwrap();
        assert_eq!(book.hold(dai(), bob, U256::from(1u64)), Err(LendingError::Overflow));
        assert_eq!(book.held(&dai(), &bob), U256::ZERO);
        assert_eq!(book.total(), U256::MAX);

        // Re-holding the same key replaces rather than adds
        book.hold(dai(), alice, units(1)).unwrap();
        assert_eq!(book.total(), units(1));
    }
}
