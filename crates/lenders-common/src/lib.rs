//! # Lenders Common
//!
//! Shared types, errors, and numeric helpers for the Lenders pool engine.
//!
//! ## Core Types
//!
//! - [`AssetId`]/[`AccountId`]: 20-byte handles for assets and actors
//! - [`PoolHandle`]: proxy address the factory resolves to a receipt ledger
//! - [`LoanRecord`]/[`LoanStatus`]: per-borrower loan lifecycle
//! - [`EngineConfig`]: rate parameters and bootstrap addresses
//!
//! ## Math
//!
//! - [`math`]: checked U256 arithmetic scaled by [`WAD`]

pub mod config;
pub mod error;
pub mod math;
pub mod types;

// Re-export commonly used types at crate root
pub use alloy_primitives::{Address, U256};
pub use config::EngineConfig;
pub use error::{LendingError, Result};
pub use math::{units, BPS, WAD};
pub use types::{
    ids::{AccountId, AssetId, PoolHandle},
    loan::{LoanRecord, LoanStatus},
};

/// Lenders version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default base rate in basis points per term
pub const DEFAULT_BASE_RATE: u64 = 10;

/// Default utilization slope in basis points per term
pub const DEFAULT_RATE_SLOPE: u64 = 5;

/// Default flat origination charge in whole asset units
pub const DEFAULT_GLOBAL_RATE_FACTOR: u64 = 5;

/// Default collateral requirement (5%)
pub const DEFAULT_COLLATERAL_BPS: u64 = 500;
