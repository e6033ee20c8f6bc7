//! # Lenders Data Provider
//!
//! Registry of every pool created by the factory and a read-optimised mirror
//! of their state.
//!
//! The factory is the only writer: it registers pools and replays each
//! committed ledger mutation into the mirror while it still holds its engine
//! lock. Everyone else reads, including the interest rate strategy, which
//! takes its inputs from [`DataProvider::rate_inputs`].

pub mod provider;

pub use provider::{DataProvider, PoolDescriptor, PoolSummary, RateInputs, UserDetails};
