//! Pool factory
//!
//! Creates one receipt ledger per asset behind a derived pool handle and
//! routes every liquidity and loan operation to it.
//!
//! Every operation runs under the engine write lock and either commits in
//! full or leaves no trace:
//! - deposits move the asset into custody first and refund it if the ledger
//!   rejects the deposit
//! - withdrawals commit the ledger first and revert it if the transfer out
//!   fails
//!
//! Mirror updates cannot fail once the ledger step succeeded: the provider
//! authorizes the factory from pool creation on, and its counters are
//! bounded by the ledger values they mirror.

use std::collections::HashMap;
use std::sync::Arc;

use lenders_common::{
    AccountId, Address, AssetId, EngineConfig, LendingError, LoanRecord, PoolHandle, Result, U256,
};
use lenders_ledger::{Journal, JournalEntry, LedgerOp, LedgerSnapshot, ReceiptLedger, ReceiptToken};
use lenders_provider::DataProvider;
use lenders_rates::{InterestRateStrategy, LinearRateStrategy, Quote};
use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::asset::AssetBank;
use crate::escrow::EscrowBook;
use crate::guard::ReentrancyGuard;

/// Addresses wired into a factory at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryConfig {
    /// Address the factory acts under
    pub address: Address,
    /// Proxy template pool handles are cloned from
    pub proxy_template: Address,
    /// Receipt ledger implementation behind every handle
    pub implementation: Address,
}

impl From<&EngineConfig> for FactoryConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            address: config.factory_address,
            proxy_template: config.proxy_template,
            implementation: config.implementation,
        }
    }
}

/// Outcome of a full payback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub principal: U256,
    /// Collateral released back to the borrower
    pub collateral_returned: U256,
    /// Interest kept by the pool
    pub interest_retained: U256,
}

#[derive(Debug)]
struct Pool {
    handle: PoolHandle,
    ledger: ReceiptLedger,
}

#[derive(Debug)]
struct EngineState {
    pools: HashMap<AssetId, Pool>,
    handles: HashMap<PoolHandle, AssetId>,
    escrow: EscrowBook,
    journal: Journal,
    nonce: u64,
}

impl EngineState {
    fn pool(&self, asset: &AssetId) -> Result<&Pool> {
        self.pools.get(asset).ok_or(LendingError::PoolNotFound(*asset))
    }
}

/// Pool manager and sole mutator of every receipt ledger
pub struct Factory {
    config: FactoryConfig,
    provider: Arc<DataProvider>,
    strategy: Arc<dyn InterestRateStrategy>,
    bank: Arc<dyn AssetBank>,
    state: RwLock<EngineState>,
    guard: ReentrancyGuard,
}

impl Factory {
    pub fn new(
        config: FactoryConfig,
        provider: Arc<DataProvider>,
        strategy: Arc<dyn InterestRateStrategy>,
        bank: Arc<dyn AssetBank>,
    ) -> Self {
        Self {
            config,
            provider,
            strategy,
            bank,
            state: RwLock::new(EngineState {
                pools: HashMap::new(),
                handles: HashMap::new(),
                escrow: EscrowBook::new(),
                journal: Journal::new(config.address),
                nonce: 0,
            }),
            guard: ReentrancyGuard::new(),
        }
    }

    /// Wire a data provider, a linear rate strategy and a factory together
    pub fn bootstrap(config: &EngineConfig, bank: Arc<dyn AssetBank>) -> Result<Arc<Self>> {
        config.validate()?;

        let provider = Arc::new(DataProvider::new());
        let strategy = Arc::new(LinearRateStrategy::from_config(provider.clone(), config));
        let factory = Arc::new(Self::new(
            FactoryConfig::from(config),
            provider.clone(),
            strategy,
            bank,
        ));
        provider.initialize(config.base_rate, config.rate_slope, factory.address())?;

        info!(factory = %factory.address(), "Lending engine bootstrapped");
        Ok(factory)
    }

    #[inline]
    pub fn address(&self) -> Address {
        self.config.address
    }

    #[inline]
    pub fn implementation(&self) -> Address {
        self.config.implementation
    }

    #[inline]
    pub fn proxy_template(&self) -> Address {
        self.config.proxy_template
    }

    pub fn provider(&self) -> &Arc<DataProvider> {
        &self.provider
    }

    pub fn strategy(&self) -> &Arc<dyn InterestRateStrategy> {
        &self.strategy
    }

    /// Run a mutation for `caller` under the engine write lock
    fn execute<T>(
        &self,
        caller: AccountId,
        op: impl FnOnce(&mut EngineState) -> Result<T>,
    ) -> Result<T> {
        let _entered = self.guard.enter(caller).map_err(|err| {
            warn!(%caller, "Reentrant call rejected");
            err
        })?;
        let mut state = self.state.write();
        let _holding = self.guard.hold();
        op(&mut *state)
    }

    /// Engine read lock; refused to callbacks running under the write lock
    fn read(&self) -> Result<RwLockReadGuard<'_, EngineState>> {
        if self.guard.held_by_current_thread() {
            return Err(LendingError::Reentrancy(self.config.address));
        }
        Ok(self.state.read())
    }

    /// Move `amount` back out of custody after a rejected ledger step
    fn refund(&self, asset: &AssetId, custody: Address, to: AccountId, amount: U256) {
        if let Err(err) = self.bank.transfer(asset, custody, to, amount) {
            error!(%asset, %to, %amount, %err, "Refund failed");
        }
    }

    // ============ POOLS ============

    /// Create the pool of `asset`
    #[instrument(skip(self, name, symbol))]
    pub fn create_pool(
        &self,
        caller: AccountId,
        asset: AssetId,
        name: &str,
        symbol: &str,
    ) -> Result<PoolHandle> {
        self.execute(caller, |state| {
            if state.pools.contains_key(&asset) {
                return Err(LendingError::PoolExists(asset));
            }

            let handle = PoolHandle::derive(self.config.address, state.nonce);
            self.provider.register_pool(
                self.config.address,
                asset,
                self.config.implementation,
                handle,
                name,
                symbol,
            )?;

            state.nonce += 1;
            state.pools.insert(
                asset,
                Pool {
                    handle,
                    ledger: ReceiptLedger::new(asset, name, symbol, self.config.address),
                },
            );
            state.handles.insert(handle, asset);
            state.journal.append(
                asset,
                LedgerOp::PoolCreated {
                    name: name.to_string(),
                    symbol: symbol.to_string(),
                    handle,
                },
            );

            info!(%handle, name, "Pool created");
            Ok(handle)
        })
    }

    // ============ LIQUIDITY ============

    /// Move `amount` of `asset` from `caller` into the pool and mint receipts
    #[instrument(skip(self))]
    pub fn add_liquidity(&self, caller: AccountId, amount: U256, asset: AssetId) -> Result<()> {
        if amount.is_zero() {
            return Err(LendingError::InvalidAmount);
        }

        self.execute(caller, |state| {
            let pool = state
                .pools
                .get_mut(&asset)
                .ok_or(LendingError::PoolNotFound(asset))?;
            let custody = pool.handle.address();

            self.bank
                .transfer_from(&asset, self.config.address, caller, custody, amount)
                .map_err(transfer_failed)?;

            if let Err(err) = pool.ledger.deposit(caller, amount) {
                warn!(%err, "Deposit rejected after transfer, refunding");
                self.refund(&asset, custody, caller, amount);
                return Err(err);
            }

            self.provider
                .on_deposit(self.config.address, asset, caller, amount)?;
            state.journal.append(
                asset,
                LedgerOp::Deposited {
                    provider: caller,
                    amount,
                },
            );

            debug!(total = %pool.ledger.total_liquidity(), "Liquidity added");
            Ok(())
        })
    }

    /// Burn `caller`'s receipts and move `amount` of `asset` back to them
    #[instrument(skip(self))]
    pub fn withdraw_liquidity(
        &self,
        caller: AccountId,
        amount: U256,
        asset: AssetId,
    ) -> Result<()> {
        if amount.is_zero() {
            return Err(LendingError::InvalidAmount);
        }

        self.execute(caller, |state| {
            let pool = state
                .pools
                .get_mut(&asset)
                .ok_or(LendingError::PoolNotFound(asset))?;
            let custody = pool.handle.address();

            pool.ledger.withdraw(caller, amount)?;

            if let Err(err) = self.bank.transfer(&asset, custody, caller, amount) {
                warn!(%err, "Withdraw transfer failed, reverting ledger");
                if let Err(revert) = pool.ledger.deposit(caller, amount) {
                    error!(%revert, "Ledger revert failed");
                }
                return Err(transfer_failed(err));
            }

            self.provider
                .on_withdraw(self.config.address, asset, caller, amount)?;
            state.journal.append(
                asset,
                LedgerOp::Withdrawn {
                    provider: caller,
                    amount,
                },
            );

            debug!(total = %pool.ledger.total_liquidity(), "Liquidity withdrawn");
            Ok(())
        })
    }

    // ============ LOANS ============

    /// Pay the interest of a prospective loan and escrow its collateral
    ///
    /// `escrow` is what the caller attached and must equal
    /// `interest_due + collateral_required` exactly.
    #[instrument(skip(self))]
    pub fn pay_interest(
        &self,
        caller: AccountId,
        asset: AssetId,
        principal: U256,
        term: u16,
        escrow: U256,
    ) -> Result<Quote> {
        if principal.is_zero() || term == 0 {
            return Err(LendingError::InvalidAmount);
        }

        self.execute(caller, |state| {
            let pool = state
                .pools
                .get_mut(&asset)
                .ok_or(LendingError::PoolNotFound(asset))?;

            let status = pool.ledger.loan_of(&caller).status;
            if status.is_active() {
                return Err(LendingError::LoanAlreadyActive { status });
            }

            let quote = self.strategy.quote(&asset, principal, term)?;
            let expected = quote.escrow_required()?;
            if escrow != expected {
                return Err(LendingError::IncorrectEscrow {
                    expected,
                    actual: escrow,
                });
            }

            state.escrow.hold(asset, caller, quote.collateral_required)?;
            if let Err(err) = pool.ledger.mark_interest_paid(
                caller,
                principal,
                term,
                quote.interest_due,
                quote.collateral_required,
            ) {
                state.escrow.release(asset, caller)?;
                return Err(err);
            }

            self.provider
                .on_interest_paid(self.config.address, asset, caller, quote.interest_due)?;
            state.journal.append(
                asset,
                LedgerOp::InterestPaid {
                    borrower: caller,
                    principal,
                    term,
                    interest: quote.interest_due,
                    collateral: quote.collateral_required,
                },
            );

            info!(
                interest = %quote.interest_due,
                collateral = %quote.collateral_required,
                "Interest paid"
            );
            Ok(quote)
        })
    }

    /// Draw a loan whose interest was paid
    ///
    /// A borrower with no paid interest gets `WRONG_LOAN_STATE`, like any
    /// other out-of-order transition.
    #[instrument(skip(self))]
    pub fn issue_loan(
        &self,
        caller: AccountId,
        asset: AssetId,
        term: u16,
        principal: U256,
    ) -> Result<LoanRecord> {
        if principal.is_zero() {
            return Err(LendingError::InvalidAmount);
        }

        self.execute(caller, |state| {
            let pool = state
                .pools
                .get_mut(&asset)
                .ok_or(LendingError::PoolNotFound(asset))?;

            let status = pool.ledger.loan_of(&caller).status;
            let record = pool
                .ledger
                .issue_loan(caller, principal, term)
                .map_err(|err| match err {
                    LendingError::NoPriorInterest => {
                        LendingError::WrongLoanState { actual: status }
                    }
                    other => other,
                })?;

            self.provider
                .on_loan_issued(self.config.address, asset, caller, principal)?;
            state.journal.append(
                asset,
                LedgerOp::LoanIssued {
                    borrower: caller,
                    principal,
                    term,
                },
            );

            info!(used = %pool.ledger.used_liquidity(), "Loan issued");
            Ok(record)
        })
    }

    /// Settle `caller`'s loan in full and release its collateral
    #[instrument(skip(self))]
    pub fn payback_loan(
        &self,
        caller: AccountId,
        asset: AssetId,
        amount: U256,
    ) -> Result<Settlement> {
        if amount.is_zero() {
            return Err(LendingError::InvalidAmount);
        }

        self.execute(caller, |state| {
            let pool = state
                .pools
                .get_mut(&asset)
                .ok_or(LendingError::PoolNotFound(asset))?;

            let collateral_returned = state.escrow.release(asset, caller)?;
            let settled = match pool.ledger.payback(caller, amount) {
                Ok(settled) => settled,
                Err(err) => {
                    state.escrow.hold(asset, caller, collateral_returned)?;
                    return Err(err);
                }
            };

            self.provider
                .on_loan_settled(self.config.address, asset, caller, settled.principal)?;
            state.journal.append(
                asset,
                LedgerOp::LoanRepaid {
                    borrower: caller,
                    amount,
                },
            );

            info!(collateral = %collateral_returned, "Loan settled");
            Ok(Settlement {
                principal: settled.principal,
                collateral_returned,
                interest_retained: settled.interest_paid,
            })
        })
    }

    // ============ VIEWS ============

    /// Free liquidity of the pool of `asset`
    pub fn balance_supply(&self, asset: &AssetId) -> Result<U256> {
        Ok(self.read()?.pool(asset)?.ledger.free_liquidity())
    }

    /// Handle of the pool of `asset`
    pub fn address_of(&self, asset: &AssetId) -> Result<PoolHandle> {
        Ok(self.read()?.pool(asset)?.handle)
    }

    /// Asset served by the pool behind `handle`
    pub fn resolve(&self, handle: &PoolHandle) -> Result<AssetId> {
        self.read()?
            .handles
            .get(handle)
            .copied()
            .ok_or(LendingError::PoolNotFound(handle.address()))
    }

    pub fn pool_count(&self) -> Result<usize> {
        Ok(self.read()?.pools.len())
    }

    pub fn receipt_balance(&self, asset: &AssetId, account: &AccountId) -> Result<U256> {
        Ok(self.read()?.pool(asset)?.ledger.receipt_balance(account))
    }

    pub fn loan_of(&self, asset: &AssetId, account: &AccountId) -> Result<LoanRecord> {
        Ok(self.read()?.pool(asset)?.ledger.loan_of(account))
    }

    pub fn ledger_snapshot(&self, asset: &AssetId) -> Result<LedgerSnapshot> {
        Ok(self.read()?.pool(asset)?.ledger.snapshot())
    }

    /// Collateral held for `account`'s loan in `asset`
    pub fn escrow_held(&self, asset: &AssetId, account: &AccountId) -> Result<U256> {
        let state = self.read()?;
        state.pool(asset)?;
        Ok(state.escrow.held(asset, account))
    }

    /// Copy of every committed operation
    pub fn journal(&self) -> Result<Vec<JournalEntry>> {
        Ok(self.read()?.journal.entries().to_vec())
    }

    pub fn journal_json_lines(&self) -> Result<String> {
        self.read()?.journal.to_json_lines()
    }

    /// Check the ledger invariants, the provider mirrors and asset custody
    pub fn invariants_hold(&self) -> Result<bool> {
        let state = self.read()?;
        for (asset, pool) in &state.pools {
            let ledger = &pool.ledger;
            if !ledger.invariants_hold()
                || self.provider.total_liquidity(asset)? != ledger.total_liquidity()
                || self.provider.used_liquidity(asset)? != ledger.used_liquidity()
                || self.bank.balance_of(asset, &pool.handle.address()) < ledger.total_liquidity()
            {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Report any asset bank failure as a transfer failure
fn transfer_failed(err: LendingError) -> LendingError {
    match err {
        LendingError::TransferFailed(_) | LendingError::Reentrancy(_) => err,
        other => LendingError::TransferFailed(other.to_string()),
    }
}
