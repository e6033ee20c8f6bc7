//! Receipt ledger - liquidity and loan bookkeeping for one asset
//!
//! Key characteristics:
//! - Deposits mint receipts 1:1 and grow `total_liquidity`
//! - Issued loans mint receipts to the borrower and grow `used_liquidity`
//! - Withdrawals are limited by the caller's own deposits and by free liquidity
//! - A failing operation leaves the ledger untouched
//!
//! At rest `Σ deposits == total_liquidity`, `Σ outstanding principals ==
//! used_liquidity` and `Σ receipts == total_liquidity + used_liquidity`.

use std::collections::HashMap;

use lenders_common::{
    math, AccountId, Address, AssetId, LendingError, LoanRecord, LoanStatus, Result, U256,
};
use serde::{Deserialize, Serialize};

use crate::receipt::ReceiptToken;

/// Bookkeeping for a single asset pool
#[derive(Debug, Clone)]
pub struct ReceiptLedger {
    asset: AssetId,
    name: String,
    symbol: String,
    /// Sole mutator of this ledger
    factory: Address,
    total_liquidity: U256,
    used_liquidity: U256,
    /// Receipt balance per account (deposits plus outstanding principal)
    receipts: HashMap<AccountId, U256>,
    /// Deposited share of each account's receipts
    deposits: HashMap<AccountId, U256>,
    loans: HashMap<AccountId, LoanRecord>,
    /// Interest retained by the pool
    interest_collected: U256,
}

/// Point-in-time view of a ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub asset: AssetId,
    pub name: String,
    pub symbol: String,
    pub total_liquidity: U256,
    pub used_liquidity: U256,
    pub free_liquidity: U256,
    pub interest_collected: U256,
    pub total_receipts: U256,
    pub providers: usize,
    pub active_loans: usize,
}

impl ReceiptLedger {
    /// Create an empty ledger owned by `factory`
    pub fn new(
        asset: AssetId,
        name: impl Into<String>,
        symbol: impl Into<String>,
        factory: Address,
    ) -> Self {
        Self {
            asset,
            name: name.into(),
            symbol: symbol.into(),
            factory,
            total_liquidity: U256::ZERO,
            used_liquidity: U256::ZERO,
            receipts: HashMap::new(),
            deposits: HashMap::new(),
            loans: HashMap::new(),
            interest_collected: U256::ZERO,
        }
    }

    #[inline]
    pub fn asset(&self) -> AssetId {
        self.asset
    }

    #[inline]
    pub fn factory(&self) -> Address {
        self.factory
    }

    #[inline]
    pub fn used_liquidity(&self) -> U256 {
        self.used_liquidity
    }

    /// Liquidity available for new loans or withdrawals
    #[inline]
    pub fn free_liquidity(&self) -> U256 {
        self.total_liquidity.saturating_sub(self.used_liquidity)
    }

    #[inline]
    pub fn receipt_balance(&self, account: &AccountId) -> U256 {
        self.balance_of(account)
    }

    /// Deposited share of `account`'s receipts
    pub fn deposit_of(&self, account: &AccountId) -> U256 {
        self.deposits.get(account).copied().unwrap_or_default()
    }

    /// Loan of `account`, `NONE` when it never borrowed
    pub fn loan_of(&self, account: &AccountId) -> LoanRecord {
        self.loans.get(account).cloned().unwrap_or_default()
    }

    #[inline]
    pub fn interest_collected(&self) -> U256 {
        self.interest_collected
    }

    /// Credit `amount` of fresh liquidity from `provider`
    pub fn deposit(&mut self, provider: AccountId, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Err(LendingError::InvalidAmount);
        }

        let total = math::add(self.total_liquidity, amount)?;
        let deposited = math::add(self.deposit_of(&provider), amount)?;
        self.mint(provider, amount)?;

        self.total_liquidity = total;
        self.deposits.insert(provider, deposited);
        Ok(())
    }

    /// Release `amount` of `provider`'s own deposit
    pub fn withdraw(&mut self, provider: AccountId, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Err(LendingError::InvalidAmount);
        }

        let deposited = self.deposit_of(&provider);
        if deposited < amount {
            return Err(LendingError::InsufficientBalance {
                required: amount,
                available: deposited,
            });
        }

        let free = self.free_liquidity();
        if free < amount {
            return Err(LendingError::InsufficientFreeLiquidity {
                required: amount,
                free,
            });
        }

        let total = math::sub(self.total_liquidity, amount)?;
        self.burn(provider, amount)?;

        self.total_liquidity = total;
        set_or_remove(&mut self.deposits, provider, deposited - amount);
        Ok(())
    }

    /// Record a prospective loan whose interest and collateral are escrowed
    pub fn mark_interest_paid(
        &mut self,
        borrower: AccountId,
        principal: U256,
        term: u16,
        interest: U256,
        collateral: U256,
    ) -> Result<()> {
        if principal.is_zero() || term == 0 {
            return Err(LendingError::InvalidAmount);
        }

        let status = self.loan_of(&borrower).status;
        if status.is_active() {
            return Err(LendingError::LoanAlreadyActive { status });
        }

        let collected = math::add(self.interest_collected, interest)?;

        self.loans.insert(
            borrower,
            LoanRecord::interest_paid(principal, term, interest, collateral),
        );
        self.interest_collected = collected;
        Ok(())
    }

    /// Draw the principal of a loan whose interest was paid
    pub fn issue_loan(
        &mut self,
        borrower: AccountId,
        principal: U256,
        term: u16,
    ) -> Result<LoanRecord> {
        if principal.is_zero() {
            return Err(LendingError::InvalidAmount);
        }

        let mut record = self.loan_of(&borrower);
        match record.status {
            LoanStatus::InterestPaid => {}
            LoanStatus::None | LoanStatus::Settled => return Err(LendingError::NoPriorInterest),
            LoanStatus::Outstanding => {
                return Err(LendingError::WrongLoanState {
                    actual: record.status,
                })
            }
        }

        if record.principal != principal {
            return Err(LendingError::PrincipalMismatch {
                expected: record.principal,
                actual: principal,
            });
        }
        if record.term != term {
            return Err(LendingError::TermMismatch {
                expected: record.term,
                actual: term,
            });
        }

        let free = self.free_liquidity();
        if free < principal {
            return Err(LendingError::InsufficientFreeLiquidity {
                required: principal,
                free,
            });
        }

        let used = math::add(self.used_liquidity, principal)?;
        self.mint(borrower, principal)?;

        self.used_liquidity = used;
        record.status = LoanStatus::Outstanding;
        self.loans.insert(borrower, record.clone());
        Ok(record)
    }

    /// Settle an outstanding loan in full
    ///
    /// Returns the record as it stood at settlement; its `collateral_held` is
    /// the amount the caller must release to the borrower.
    pub fn payback(&mut self, borrower: AccountId, amount: U256) -> Result<LoanRecord> {
        if amount.is_zero() {
            return Err(LendingError::InvalidAmount);
        }

        let mut record = self.loan_of(&borrower);
        if record.status != LoanStatus::Outstanding {
            return Err(LendingError::WrongLoanState {
                actual: record.status,
            });
        }
        if amount != record.principal {
            return Err(LendingError::PrincipalMismatch {
                expected: record.principal,
                actual: amount,
            });
        }

        let used = math::sub(self.used_liquidity, record.principal)?;
        self.burn(borrower, record.principal)?;

        self.used_liquidity = used;
        record.status = LoanStatus::Settled;
        let settled = record.clone();
        record.collateral_held = U256::ZERO;
        self.loans.insert(borrower, record);
        Ok(settled)
    }

    /// Sum of all receipt balances
    pub fn total_receipts(&self) -> U256 {
        self.receipts
            .values()
            .fold(U256::ZERO, |acc, v| acc.saturating_add(*v))
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            asset: self.asset,
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            total_liquidity: self.total_liquidity,
            used_liquidity: self.used_liquidity,
            free_liquidity: self.free_liquidity(),
            interest_collected: self.interest_collected,
            total_receipts: self.total_receipts(),
            providers: self.deposits.len(),
            active_loans: self.loans.values().filter(|l| l.status.is_active()).count(),
        }
    }

    /// Check the conservation invariants
    pub fn invariants_hold(&self) -> bool {
        let deposits = self
            .deposits
            .values()
            .fold(U256::ZERO, |acc, v| acc.saturating_add(*v));
        let outstanding = self
            .loans
            .values()
            .fold(U256::ZERO, |acc, l| acc.saturating_add(l.outstanding()));
        let loans_covered = self
            .loans
            .iter()
            .all(|(account, l)| self.balance_of(account) >= l.outstanding());

        self.used_liquidity <= self.total_liquidity
            && deposits == self.total_liquidity
            && outstanding == self.used_liquidity
            && self.total_receipts() == self.total_liquidity.saturating_add(self.used_liquidity)
            && loans_covered
    }
}

impl ReceiptToken for ReceiptLedger {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn mint(&mut self, to: AccountId, amount: U256) -> Result<()> {
        let balance = math::add(self.balance_of(&to), amount)?;
        self.receipts.insert(to, balance);
        Ok(())
    }

    fn burn(&mut self, from: AccountId, amount: U256) -> Result<()> {
        let balance = self.balance_of(&from);
        if balance < amount {
            return Err(LendingError::InsufficientBalance {
                required: amount,
                available: balance,
            });
        }
        set_or_remove(&mut self.receipts, from, balance - amount);
        Ok(())
    }

    fn balance_of(&self, account: &AccountId) -> U256 {
        self.receipts.get(account).copied().unwrap_or_default()
    }

    fn total_liquidity(&self) -> U256 {
        self.total_liquidity
    }
}

/// Drop zero balances so iteration only sees live accounts
fn set_or_remove(map: &mut HashMap<AccountId, U256>, account: AccountId, value: U256) {
    if value.is_zero() {
        map.remove(&account);
    } else {
        map.insert(account, value);
    }
}
