//! Loan records
//!
//! A borrower walks through the states in a fixed order:
//!
//! ```text
//! NONE ──pay_interest──▶ INTEREST_PAID ──issue_loan──▶ OUTSTANDING ──payback──▶ SETTLED
//! ```
//!
//! A settled borrower may start over with a new `pay_interest`.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a borrower's loan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    #[default]
    None,
    InterestPaid,
    Outstanding,
    Settled,
}

impl LoanStatus {
    /// A loan that blocks a new `pay_interest`
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, LoanStatus::InterestPaid | LoanStatus::Outstanding)
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoanStatus::None => write!(f, "NONE"),
            LoanStatus::InterestPaid => write!(f, "INTEREST_PAID"),
            LoanStatus::Outstanding => write!(f, "OUTSTANDING"),
            LoanStatus::Settled => write!(f, "SETTLED"),
        }
    }
}

/// One borrower's loan in one pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRecord {
    /// Principal quoted at `pay_interest` time
    pub principal: U256,
    /// Loan duration fed to the rate strategy
    pub term: u16,
    /// Interest collected up front, never refunded
    pub interest_paid: U256,
    /// Collateral held in escrow until payback
    pub collateral_held: U256,
    pub status: LoanStatus,
}

impl LoanRecord {
    /// Record created when interest has been paid
    pub fn interest_paid(principal: U256, term: u16, interest: U256, collateral: U256) -> Self {
        Self {
            principal,
            term,
            interest_paid: interest,
            collateral_held: collateral,
            status: LoanStatus::InterestPaid,
        }
    }

    /// Principal currently drawn from the pool
    pub fn outstanding(&self) -> U256 {
        if self.status == LoanStatus::Outstanding {
            self.principal
        } else {
            U256::ZERO
        }
    }
}
