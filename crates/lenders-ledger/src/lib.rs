//! # Lenders Ledger
//!
//! Per-asset receipt ledgers and the operation journal they can be rebuilt
//! from.
//!
//! A [`ReceiptLedger`] tracks free and used liquidity, per-provider deposits
//! and per-borrower loans, and mints or burns receipt units through the
//! [`ReceiptToken`] capability set. Only the pool factory mutates a ledger.
//!
//! The [`Journal`] records every committed mutation so all ledgers can be
//! replayed from scratch.

pub mod journal;
pub mod ledger;
pub mod receipt;

pub use journal::{Journal, JournalEntry, LedgerOp};
pub use ledger::{LedgerSnapshot, ReceiptLedger};
pub use receipt::ReceiptToken;
