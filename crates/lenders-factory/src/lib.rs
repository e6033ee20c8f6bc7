//! # Lenders Factory
//!
//! Pool creation and the single entry point for every liquidity and loan
//! operation.
//!
//! ## Loan Lifecycle
//!
//! ```text
//! pay_interest ──► INTEREST_PAID ──► issue_loan ──► OUTSTANDING ──► payback_loan ──► SETTLED
//! ```
//!
//! ## Components
//!
//! - [`Factory`]: owns one receipt ledger per asset and serializes all mutations
//! - [`AssetBank`]: external balances the factory moves assets through
//! - [`EscrowBook`]: collateral held until payback
//! - [`ReentrancyGuard`]: rejects callbacks into an operation still in flight

pub mod asset;
pub mod escrow;
pub mod factory;
pub mod guard;

pub use asset::{AssetBank, InMemoryAssetBank};
pub use escrow::EscrowBook;
pub use factory::{Factory, FactoryConfig, Settlement};
pub use guard::ReentrancyGuard;
