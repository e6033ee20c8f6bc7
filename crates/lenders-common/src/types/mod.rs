//! Core types for the Lenders engine

pub mod ids;
pub mod loan;
