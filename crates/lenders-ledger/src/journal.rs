//! Operation journal
//!
//! Append-only log of every committed ledger mutation with:
//! - Monotonic sequence numbers across all pools
//! - Enough arguments per entry to rebuild every ledger by replay
//! - JSON-lines export and import

use std::collections::HashMap;

use lenders_common::{AccountId, Address, AssetId, LendingError, PoolHandle, Result, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::ledger::ReceiptLedger;

/// Committed mutation of one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LedgerOp {
    PoolCreated {
        name: String,
        symbol: String,
        handle: PoolHandle,
    },
    Deposited {
        provider: AccountId,
        amount: U256,
    },
    Withdrawn {
        provider: AccountId,
        amount: U256,
    },
    InterestPaid {
        borrower: AccountId,
        principal: U256,
        term: u16,
        interest: U256,
        collateral: U256,
    },
    LoanIssued {
        borrower: AccountId,
        principal: U256,
        term: u16,
    },
    LoanRepaid {
        borrower: AccountId,
        amount: U256,
    },
}

impl LedgerOp {
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerOp::PoolCreated { .. } => "PoolCreated",
            LedgerOp::Deposited { .. } => "Deposited",
            LedgerOp::Withdrawn { .. } => "Withdrawn",
            LedgerOp::InterestPaid { .. } => "InterestPaid",
            LedgerOp::LoanIssued { .. } => "LoanIssued",
            LedgerOp::LoanRepaid { .. } => "LoanRepaid",
        }
    }
}

/// One journal record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub seq: u64,
    pub asset: AssetId,
    pub op: LedgerOp,
    /// Unix milliseconds
    pub recorded_at: i64,
}

/// A pool rebuilt from the journal
#[derive(Debug, Clone)]
pub struct ReplayedPool {
    pub handle: PoolHandle,
    pub ledger: ReceiptLedger,
}

/// Append-only journal of a factory's pools
#[derive(Debug, Clone)]
pub struct Journal {
    factory: Address,
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub fn new(factory: Address) -> Self {
        Self {
            factory,
            entries: Vec::new(),
        }
    }

    /// Append a committed operation
    pub fn append(&mut self, asset: AssetId, op: LedgerOp) -> &JournalEntry {
        let entry = JournalEntry {
            id: Uuid::now_v7(),
            seq: self.entries.len() as u64,
            asset,
            op,
            recorded_at: chrono::Utc::now().timestamp_millis(),
        };
        debug!(seq = entry.seq, asset = %asset, op = entry.op.kind(), "Journal entry appended");
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Entries of a single pool, in commit order
    pub fn entries_for(&self, asset: &AssetId) -> impl Iterator<Item = &JournalEntry> + '_ {
        let asset = *asset;
        self.entries.iter().filter(move |e| e.asset == asset)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Export as one JSON document per line
    pub fn to_json_lines(&self) -> Result<String> {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Import a JSON-lines export; sequence numbers must be contiguous
    pub fn from_json_lines(factory: Address, input: &str) -> Result<Self> {
        let mut journal = Self::new(factory);
        for line in input.lines().filter(|l| !l.trim().is_empty()) {
            let entry: JournalEntry = serde_json::from_str(line)?;
            if entry.seq != journal.entries.len() as u64 {
                return Err(LendingError::Serialization(format!(
                    "journal gap: expected seq {}, found {}",
                    journal.entries.len(),
                    entry.seq
                )));
            }
            journal.entries.push(entry);
        }
        Ok(journal)
    }

    /// Rebuild every ledger by re-applying the journal in order
    #[instrument(skip(self), fields(entries = self.entries.len()))]
    pub fn replay(&self) -> Result<HashMap<AssetId, ReplayedPool>> {
        let mut pools: HashMap<AssetId, ReplayedPool> = HashMap::new();

        for entry in &self.entries {
            if !pools.contains_key(&entry.asset) {
                let LedgerOp::PoolCreated {
                    name,
                    symbol,
                    handle,
                } = &entry.op
                else {
                    return Err(LendingError::PoolNotFound(entry.asset));
                };
                let ledger =
                    ReceiptLedger::new(entry.asset, name.clone(), symbol.clone(), self.factory);
                pools.insert(
                    entry.asset,
                    ReplayedPool {
                        handle: *handle,
                        ledger,
                    },
                );
                continue;
            }

            let pool = pools
                .get_mut(&entry.asset)
                .ok_or(LendingError::PoolNotFound(entry.asset))?;
            apply(&mut pool.ledger, &entry.op)?;
        }

        debug!(pools = pools.len(), "Journal replayed");
        Ok(pools)
    }
}

/// Re-apply one operation to an existing pool
fn apply(ledger: &mut ReceiptLedger, op: &LedgerOp) -> Result<()> {
    match op {
        LedgerOp::PoolCreated { .. } => Err(LendingError::DuplicatePool(ledger.asset())),
        LedgerOp::Deposited { provider, amount } => ledger.deposit(*provider, *amount),
        LedgerOp::Withdrawn { provider, amount } => ledger.withdraw(*provider, *amount),
        LedgerOp::InterestPaid {
            borrower,
            principal,
            term,
            interest,
            collateral,
        } => ledger.mark_interest_paid(*borrower, *principal, *term, *interest, *collateral),
        LedgerOp::LoanIssued {
            borrower,
            principal,
            term,
        } => ledger.issue_loan(*borrower, *principal, *term).map(|_| ()),
        LedgerOp::LoanRepaid { borrower, amount } => {
            ledger.payback(*borrower, *amount).map(|_| ())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipt::ReceiptToken;
    use lenders_common::{units, LoanStatus};

    fn dai() -> AssetId {
        Address::repeat_byte(0xda)
    }

    fn factory() -> Address {
        Address::repeat_byte(0xfa)
    }

    fn sample_journal() -> Journal {
        let lp = Address::repeat_byte(0x01);
        let borrower = Address::repeat_byte(0x02);
        let mut journal = Journal::new(factory());
        journal.append(
            dai(),
            LedgerOp::PoolCreated {
                name: "Dai".into(),
                symbol: "Dai".into(),
                handle: PoolHandle::derive(factory(), 0),
            },
        );
        journal.append(dai(), LedgerOp::Deposited { provider: lp, amount: units(4000) });
        journal.append(dai(), LedgerOp::Withdrawn { provider: lp, amount: units(200) });
        journal.append(
            dai(),
            LedgerOp::InterestPaid {
                borrower,
                principal: units(1500),
                term: 1,
                interest: units(6),
                collateral: units(75),
            },
        );
        journal.append(
            dai(),
            LedgerOp::LoanIssued {
                borrower,
                principal: units(1500),
                term: 1,
            },
        );
        journal
    }

    #[test]
    fn test_sequence_numbers() {
        let journal = sample_journal();
        assert_eq!(journal.len(), 5);
        for (i, entry) in journal.entries().iter().enumerate() {
            assert_eq!(entry.seq, i as u64);
        }
        assert_eq!(journal.entries_for(&dai()).count(), 5);
        assert_eq!(journal.entries_for(&Address::ZERO).count(), 0);
    }

    #[test]
    fn test_replay_rebuilds_ledger() {
        let pools = sample_journal().replay().unwrap();
        let pool = &pools[&dai()];

        assert_eq!(pool.handle, PoolHandle::derive(factory(), 0));
        assert_eq!(pool.ledger.name(), "Dai");
        assert_eq!(pool.ledger.total_liquidity(), units(3800));
        assert_eq!(pool.ledger.used_liquidity(), units(1500));
        assert_eq!(
            pool.ledger.loan_of(&Address::repeat_byte(0x02)).status,
            LoanStatus::Outstanding
        );
        assert!(pool.ledger.invariants_hold());
    }

    #[test]
    fn test_json_lines_round_trip() {
        let journal = sample_journal();
        let exported = journal.to_json_lines().unwrap();
        assert_eq!(exported.lines().count(), 5);

        let imported = Journal::from_json_lines(factory(), &exported).unwrap();
        assert_eq!(imported.entries(), journal.entries());
    }

    #[test]
    fn test_import_rejects_gaps() {
        let exported = sample_journal().to_json_lines().unwrap();
        let gapped: String = exported
            .lines()
            .enumerate()
            .filter(|(i, _)| *i != 2)
            .map(|(_, l)| format!("{}\n", l))
            .collect();

        let result = Journal::from_json_lines(factory(), &gapped);
        assert_eq!(result.unwrap_err().code(), "SERIALIZATION");
    }

    #[test]
    fn test_replay_unknown_pool() {
        let mut journal = Journal::new(factory());
        journal.append(
            dai(),
            LedgerOp::Deposited {
                provider: Address::repeat_byte(0x01),
                amount: units(1),
            },
        );
        assert_eq!(journal.replay().unwrap_err(), LendingError::PoolNotFound(dai()));
    }
}
