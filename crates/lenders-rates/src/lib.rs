//! # Lenders Rates
//!
//! Up-front loan pricing.
//!
//! ## Quote Formula
//!
//! ```text
//! utilization = used · BPS / total
//! rate        = base_rate · BPS + rate_slope · utilization
//! interest    = (principal · rate · term + global_rate_factor · WAD · BPS²) / BPS²
//! collateral  = principal · collateral_bps / BPS
//! ```
//!
//! Where:
//! - `base_rate`, `rate_slope`: basis points per term, read from the data provider
//! - `global_rate_factor`: flat origination charge in whole asset units
//! - `collateral_bps`: share of principal held in escrow until payback

pub mod strategy;

pub use strategy::{InterestRateStrategy, LinearRateStrategy, Quote};
