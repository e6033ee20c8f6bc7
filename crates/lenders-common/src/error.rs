//! Error types for the Lenders engine
//!
//! Every failing operation returns exactly one [`LendingError`]. The engine
//! never commits partially, so an error always means "nothing changed".

use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::types::loan::LoanStatus;

/// Result type alias using LendingError
pub type Result<T> = std::result::Result<T, LendingError>;

/// Unified error type for pool engine operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LendingError {
    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: U256, available: U256 },

    #[error("Insufficient free liquidity: required {required}, free {free}")]
    InsufficientFreeLiquidity { required: U256, free: U256 },

    #[error("Pool already exists for asset {0}")]
    PoolExists(Address),

    #[error("No pool found for asset {0}")]
    PoolNotFound(Address),

    #[error("Asset transfer failed: {0}")]
    TransferFailed(String),

    #[error("Incorrect escrow: expected {expected}, got {actual}")]
    IncorrectEscrow { expected: U256, actual: U256 },

    #[error("Wrong loan state: {actual:?}")]
    WrongLoanState { actual: LoanStatus },

    #[error("Loan already active with status {status:?}")]
    LoanAlreadyActive { status: LoanStatus },

    #[error("Principal mismatch: expected {expected}, got {actual}")]
    PrincipalMismatch { expected: U256, actual: U256 },

    #[error("Term mismatch: expected {expected}, got {actual}")]
    TermMismatch { expected: u16, actual: u16 },

    #[error("No interest paid for a pending loan")]
    NoPriorInterest,

    #[error("Pool already registered for asset {0}")]
    DuplicatePool(Address),

    #[error("Caller {0} is not authorized for this operation")]
    Unauthorized(Address),

    #[error("Already initialized")]
    AlreadyInitialized,

    #[error("Not initialized")]
    NotInitialized,

    #[error("Reentrant call rejected for {0}")]
    Reentrancy(Address),

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LendingError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            LendingError::InvalidAmount => "INVALID_AMOUNT",
            LendingError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            LendingError::InsufficientFreeLiquidity { .. } => "INSUFFICIENT_FREE_LIQUIDITY",
            LendingError::PoolExists(_) => "POOL_EXISTS",
            LendingError::PoolNotFound(_) => "POOL_NOT_FOUND",
            LendingError::TransferFailed(_) => "TRANSFER_FAILED",
            LendingError::IncorrectEscrow { .. } => "INCORRECT_ESCROW",
            LendingError::WrongLoanState { .. } => "WRONG_LOAN_STATE",
            LendingError::LoanAlreadyActive { .. } => "LOAN_ALREADY_ACTIVE",
            LendingError::PrincipalMismatch { .. } => "PRINCIPAL_MISMATCH",
            LendingError::TermMismatch { .. } => "TERM_MISMATCH",
            LendingError::NoPriorInterest => "NO_PRIOR_INTEREST",
            LendingError::DuplicatePool(_) => "DUPLICATE_POOL",
            LendingError::Unauthorized(_) => "UNAUTHORIZED",
            LendingError::AlreadyInitialized => "ALREADY_INITIALIZED",
            LendingError::NotInitialized => "NOT_INITIALIZED",
            LendingError::Reentrancy(_) => "REENTRANCY",
            LendingError::Overflow => "OVERFLOW",
            LendingError::Config(_) => "CONFIG",
            LendingError::Serialization(_) => "SERIALIZATION",
        }
    }
}

impl From<serde_json::Error> for LendingError {
    fn from(err: serde_json::Error) -> Self {
        LendingError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for LendingError {
    fn from(err: config::ConfigError) -> Self {
        LendingError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LendingError::InsufficientFreeLiquidity {
            required: U256::from(10u64),
            free: U256::from(3u64),
        };
        assert!(err.to_string().contains("required 10, free 3"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(LendingError::InvalidAmount.code(), "INVALID_AMOUNT");
        assert_eq!(
            LendingError::WrongLoanState {
                actual: LoanStatus::Settled
            }
            .code(),
            "WRONG_LOAN_STATE"
        );
        assert_eq!(LendingError::Reentrancy(Address::ZERO).code(), "REENTRANCY");
    }

    #[test]
    fn test_json_error_converts() {
        let err: LendingError = serde_json::from_str::<u64>("not json").unwrap_err().into();
        assert_eq!(err.code(), "SERIALIZATION");
    }
}
