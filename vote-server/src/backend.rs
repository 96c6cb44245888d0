//! The ledger layout the server was started with.

use std::path::Path;

use tally_store::{Direction, DualLedger, Result, TallyRepository, VoteRecord};

/// Either a lone net-tally ledger or the tally/attempt pair.
#[derive(Debug)]
pub enum Tallies {
    Single(TallyRepository),
    Dual(DualLedger),
}

impl Tallies {
    pub fn open(path: &Path, dual_ledger: bool) -> Result<Self> {
        if dual_ledger {
            Ok(Self::Dual(DualLedger::open(path)?))
        } else {
            Ok(Self::Single(TallyRepository::open(path)?))
        }
    }

    /// The net-tally ledger, used for lookups and selection.
    pub fn repository(&self) -> &TallyRepository {
        match self {
            Self::Single(repo) => repo,
            Self::Dual(ledger) => ledger.tallies(),
        }
    }

    /// Registers a resource with a zero tally.
    pub fn register(&self, key: &[u8]) -> Result<()> {
        match self {
            Self::Single(repo) => repo.insert(key, 0),
            Self::Dual(ledger) => ledger.insert(key),
        }
    }

    pub fn vote(&self, key: &[u8], direction: Direction) -> Result<VoteRecord> {
        match self {
            Self::Single(repo) => Ok(VoteRecord {
                key: key.to_vec(),
                tally: repo.update(key, direction.delta())?,
                attempts: None,
            }),
            Self::Dual(ledger) => ledger.vote(key, direction),
        }
    }

    pub fn unvote(&self, key: &[u8], direction: Direction) -> Result<VoteRecord> {
        match self {
            Self::Single(repo) => Ok(VoteRecord {
                key: key.to_vec(),
                tally: repo.update(key, -direction.delta())?,
                attempts: None,
            }),
            Self::Dual(ledger) => ledger.unvote(key, direction),
        }
    }

    /// Every resource, lowest tally first, ties in key order.
    pub fn records(&self) -> Result<Vec<VoteRecord>> {
        match self {
            Self::Single(repo) => Ok(repo
                .ranked()?
                .into_iter()
                .map(|(key, tally)| VoteRecord {
                    key,
                    tally,
                    attempts: None,
                })
                .collect()),
            Self::Dual(ledger) => {
                let mut records = ledger.records()?;
                records.sort_by_key(|record| record.tally);
                Ok(records)
            }
        }
    }

    pub fn close(self) {
        match self {
            Self::Single(repo) => repo.close(),
            Self::Dual(ledger) => ledger.close(),
        }
    }
}
