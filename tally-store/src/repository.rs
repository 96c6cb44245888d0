//! Per-key tallies on top of [`Store`].
//!
//! Each operation runs in exactly one transaction. `insert` and `update`
//! read and write inside the same write transaction, so concurrent callers
//! on one key serialize: no lost updates and no duplicate inserts.

use std::path::Path;

use redb::ReadableTable;
use tracing::trace;

use crate::codec;
use crate::error::{Result, TallyError};
use crate::store::{ReadView, Store};

/// A ledger of signed tallies keyed by raw resource identifiers.
#[derive(Debug)]
pub struct TallyRepository {
    store: Store,
}

impl TallyRepository {
    /// Opens (or creates) the repository stored at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Store::open(path)?))
    }

    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Adds `key` with an initial tally. Fails with
    /// [`TallyError::AlreadyExists`] if the key is present; the existing
    /// tally is left as it was.
    pub fn insert(&self, key: impl AsRef<[u8]>, initial: i64) -> Result<()> {
        let key = key.as_ref();
        self.store.with_write_transaction(|table| {
            if table.get(key)?.is_some() {
                return Err(TallyError::AlreadyExists);
            }
            table.insert(key, codec::encode(initial).as_slice())?;
            Ok(())
        })?;
        trace!(key = %String::from_utf8_lossy(key), initial, "inserted resource");
        Ok(())
    }

    /// Adds `delta` to the tally of `key` and returns the new tally.
    ///
    /// Fails with [`TallyError::NotFound`] for an unknown key. A result that
    /// does not fit in an `i64` is rejected with [`TallyError::Encoding`]
    /// and nothing is written.
    pub fn update(&self, key: impl AsRef<[u8]>, delta: i64) -> Result<i64> {
        self.apply_delta(key.as_ref(), delta, None)
    }

    /// Like [`update`](Self::update), but a negative `delta` that would take
    /// the tally below `floor` fails with [`TallyError::NothingToRetract`]
    /// and nothing is written.
    pub fn update_at_least(&self, key: impl AsRef<[u8]>, delta: i64, floor: i64) -> Result<i64> {
        self.apply_delta(key.as_ref(), delta, Some(floor))
    }

    fn apply_delta(&self, key: &[u8], delta: i64, floor: Option<i64>) -> Result<i64> {
        let tally = self.store.with_write_transaction(|table| {
            let current = match table.get(key)? {
                Some(stored) => codec::decode(stored.value())?,
                None => return Err(TallyError::NotFound),
            };
            let next = current.checked_add(delta).ok_or_else(|| {
                TallyError::Encoding(format!("tally {current} overflows when adding {delta}"))
            })?;
            if let Some(floor) = floor {
                if delta < 0 && next < floor {
                    return Err(TallyError::NothingToRetract);
                }
            }
            table.insert(key, codec::encode(next).as_slice())?;
            Ok(next)
        })?;
        trace!(key = %String::from_utf8_lossy(key), delta, tally, "updated resource");
        Ok(tally)
    }

    /// Current tally of `key`.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<i64> {
        let key = key.as_ref();
        self.store.with_read_transaction(|table| match table.get(key)? {
            Some(stored) => codec::decode(stored.value()),
            None => Err(TallyError::NotFound),
        })
    }

    /// Number of keys present.
    ///
    /// This walks every entry, so it is O(n). Callers that need the size on
    /// a hot path should cache it.
    pub fn count(&self) -> Result<u64> {
        self.store.with_read_transaction(|table| {
            let mut count = 0u64;
            for entry in table.iter()? {
                entry?;
                count += 1;
            }
            Ok(count)
        })
    }

    /// Captures a consistent view of every entry.
    ///
    /// Writes made after this call are not visible through the snapshot.
    pub fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot {
            view: self.store.begin_view()?,
        })
    }

    /// Releases the underlying store.
    pub fn close(self) {
        self.store.close();
    }
}

/// A frozen read view of a repository.
///
/// Iterate it as many times as needed with [`Snapshot::iter`]; each pass
/// yields the same entries in key order.
pub struct Snapshot {
    view: ReadView,
}

impl Snapshot {
    /// Lazily walks the entries in key order.
    pub fn iter(&self) -> Result<impl Iterator<Item = Result<(Vec<u8>, i64)>> + '_> {
        let range = self.view.table.iter()?;
        Ok(range.map(|entry| -> Result<(Vec<u8>, i64)> {
            let (key, value) = entry?;
            Ok((key.value().to_vec(), codec::decode(value.value())?))
        }))
    }

    /// Collects every entry into memory.
    pub fn entries(&self) -> Result<Vec<(Vec<u8>, i64)>> {
        self.iter()?.collect()
    }
}
