//! Receipt token capability set
//!
//! The engine only needs a narrow slice of a fungible token: display
//! metadata, mint, burn and the two balance views.

use lenders_common::{AccountId, Result, U256};

/// Receipt units minted against deposits and loans
pub trait ReceiptToken {
    /// Display name, fixed at creation
    fn name(&self) -> &str;

    /// Display symbol, fixed at creation
    fn symbol(&self) -> &str;

    /// Mint `amount` receipts to `to`
    fn mint(&mut self, to: AccountId, amount: U256) -> Result<()>;

    /// Burn `amount` receipts held by `from`
    fn burn(&mut self, from: AccountId, amount: U256) -> Result<()>;

    /// Receipts held by `account`
    fn balance_of(&self, account: &AccountId) -> U256;

    /// Sum of all provider deposits backing the receipts
    fn total_liquidity(&self) -> U256;
}
