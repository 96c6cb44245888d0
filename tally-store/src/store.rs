//! On-disk ordered key-value storage for tallies.
//!
//! This module wraps a single redb database file holding one table that maps
//! raw resource keys to encoded tallies. Every repository operation runs
//! inside one of the scoped transactions exposed here, so the engine's
//! guarantees apply to it directly:
//!
//! - read transactions see a consistent snapshot and run concurrently;
//! - write transactions are serialized, so a read-then-write inside one of
//!   them cannot interleave with another writer.

use std::fmt;
use std::path::{Path, PathBuf};

use redb::{Database, ReadTransaction, TableDefinition};
use tracing::{debug, warn};

use crate::error::{Result, TallyError};

const TALLIES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("tallies");

/// Read-only view of the tallies table.
pub type ReadTable = redb::ReadOnlyTable<&'static [u8], &'static [u8]>;

/// Writable view of the tallies table, valid for one write transaction.
pub type WriteTable<'txn> = redb::Table<'txn, &'static [u8], &'static [u8]>;

/// Handle to one opened tally database.
///
/// There is no global instance: open it once at startup and share it by
/// reference (or `Arc`) with everything that needs it.
pub struct Store {
    db: Database,
    path: PathBuf,
}

impl Store {
    /// Opens the database at `path`, creating the file and any missing
    /// parent directories when absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|err| TallyError::StoreUnavailable(redb::Error::Io(err)))?;
        }

        let db = Database::create(&path)?;

        // Create the table up front so read transactions never hit a
        // missing-table error on a fresh file.
        let txn = db.begin_write()?;
        {
            txn.open_table(TALLIES)?;
        }
        txn.commit()?;

        debug!(path = %path.display(), "opened tally store");
        Ok(Self { db, path })
    }

    /// The file this store was opened at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `f` against a consistent read-only snapshot of the table.
    pub fn with_read_transaction<T>(&self, f: impl FnOnce(&ReadTable) -> Result<T>) -> Result<T> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TALLIES)?;
        f(&table)
    }

    /// Runs `f` inside a write transaction.
    ///
    /// The transaction commits when `f` returns `Ok` and aborts when it
    /// returns `Err`, so a failed closure leaves the store untouched.
    pub fn with_write_transaction<T>(
        &self,
        f: impl FnOnce(&mut WriteTable<'_>) -> Result<T>,
    ) -> Result<T> {
        let txn = self.db.begin_write()?;
        let outcome = {
            let mut table = txn.open_table(TALLIES)?;
            f(&mut table)
        };

        match outcome {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = txn.abort() {
                    warn!(error = %abort_err, "failed to abort write transaction");
                }
                Err(err)
            }
        }
    }

    /// Opens a read transaction that outlives this call.
    ///
    /// Used by snapshots, which iterate lazily and may be restarted.
    pub(crate) fn begin_view(&self) -> Result<ReadView> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TALLIES)?;
        Ok(ReadView { table, _txn: txn })
    }

    /// Releases the database. Consuming `self` makes a second close
    /// impossible.
    pub fn close(self) {
        debug!(path = %self.path.display(), "closing tally store");
        drop(self.db);
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store").field("path", &self.path).finish()
    }
}

/// A read transaction kept open together with its table.
pub(crate) struct ReadView {
    // Declared before the transaction so it drops first.
    pub(crate) table: ReadTable,
    _txn: ReadTransaction,
}
