//! Net tallies plus raw vote attempts, kept in two separate ledgers.
//!
//! The net-tally ledger lives at `<path>` and the attempt ledger at
//! `<path>.count`. Each vote touches both, but the two writes are separate
//! transactions on separate databases. They are not atomic as a pair:
//!
//! - the tally update runs first; if it fails nothing is written;
//! - if the attempt update then fails, the tally update is reverted on a
//!   best-effort basis and the divergence is logged.
//!
//! The ledgers are therefore eventually consistent. Reporting joins them by
//! key, never by scan position, so a key missing from one side does not
//! shift every row after it.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{error, warn};

use crate::error::{Result, TallyError};
use crate::repository::TallyRepository;
use crate::vote::{Direction, VoteRecord};

/// Suffix appended to the tally ledger path for the attempt ledger.
pub const ATTEMPTS_SUFFIX: &str = ".count";

/// Path of the attempt ledger paired with a tally ledger at `path`.
pub fn attempts_path(path: &Path) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(ATTEMPTS_SUFFIX);
    PathBuf::from(raw)
}

#[derive(Debug)]
pub struct DualLedger {
    tallies: TallyRepository,
    attempts: TallyRepository,
}

impl DualLedger {
    /// Opens the tally ledger at `path` and the attempt ledger beside it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Ok(Self {
            tallies: TallyRepository::open(path)?,
            attempts: TallyRepository::open(attempts_path(path))?,
        })
    }

    /// The net-tally ledger. Selection algorithms run against this one.
    pub fn tallies(&self) -> &TallyRepository {
        &self.tallies
    }

    pub fn attempts(&self) -> &TallyRepository {
        &self.attempts
    }

    /// Registers `key` with zero in both ledgers.
    ///
    /// Succeeds if at least one ledger was missing the key, which lets a
    /// re-seed repair a key that only one side knows about. Fails with
    /// [`TallyError::AlreadyExists`] only when both already had it.
    pub fn insert(&self, key: impl AsRef<[u8]>) -> Result<()> {
        let key = key.as_ref();
        let tally_inserted = inserted(self.tallies.insert(key, 0))?;
        let attempt_inserted = inserted(self.attempts.insert(key, 0))?;

        match (tally_inserted, attempt_inserted) {
            (false, false) => Err(TallyError::AlreadyExists),
            (true, true) => Ok(()),
            _ => {
                warn!(
                    key = %String::from_utf8_lossy(key),
                    tally_inserted,
                    attempt_inserted,
                    "repaired key missing from one ledger"
                );
                Ok(())
            }
        }
    }

    /// Records a vote: the tally moves by the direction, attempts grow by one.
    pub fn vote(&self, key: impl AsRef<[u8]>, direction: Direction) -> Result<VoteRecord> {
        self.apply(key.as_ref(), direction.delta(), 1)
    }

    /// Retracts an earlier vote in `direction`.
    ///
    /// Attempts never go below zero: retracting from a key with no recorded
    /// attempts fails with [`TallyError::NothingToRetract`] and leaves the
    /// tally as it was.
    pub fn unvote(&self, key: impl AsRef<[u8]>, direction: Direction) -> Result<VoteRecord> {
        self.apply(key.as_ref(), -direction.delta(), -1)
    }

    fn apply(&self, key: &[u8], tally_delta: i64, attempt_delta: i64) -> Result<VoteRecord> {
        let tally = self.tallies.update(key, tally_delta)?;

        match self.attempts.update_at_least(key, attempt_delta, 0) {
            Ok(attempts) => Ok(VoteRecord {
                key: key.to_vec(),
                tally,
                attempts: Some(attempts),
            }),
            Err(err) => {
                let key_lossy = String::from_utf8_lossy(key);
                warn!(key = %key_lossy, error = %err, "attempt ledger update failed, reverting tally");
                if let Err(revert_err) = self.tallies.update(key, -tally_delta) {
                    error!(
                        key = %key_lossy,
                        error = %revert_err,
                        "failed to revert tally, ledgers have diverged"
                    );
                }
                Err(err)
            }
        }
    }

    /// Every tally joined with its attempt count, in key order.
    ///
    /// A key missing from the attempt ledger reports zero attempts. A key
    /// only the attempt ledger knows about is left out.
    pub fn records(&self) -> Result<Vec<VoteRecord>> {
        let tallies = self.tallies.snapshot()?;
        let mut attempts: BTreeMap<Vec<u8>, i64> =
            self.attempts.snapshot()?.iter()?.collect::<Result<_>>()?;

        let mut records = Vec::new();
        for entry in tallies.iter()? {
            let (key, tally) = entry?;
            let count = match attempts.remove(&key) {
                Some(count) => count,
                None => {
                    warn!(key = %String::from_utf8_lossy(&key), "key missing from attempt ledger");
                    0
                }
            };
            records.push(VoteRecord {
                key,
                tally,
                attempts: Some(count),
            });
        }

        for key in attempts.keys() {
            warn!(key = %String::from_utf8_lossy(key), "key missing from tally ledger");
        }

        Ok(records)
    }

    pub fn close(self) {
        self.tallies.close();
        self.attempts.close();
    }
}

fn inserted(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(TallyError::AlreadyExists) => Ok(false),
        Err(err) => Err(err),
    }
}
