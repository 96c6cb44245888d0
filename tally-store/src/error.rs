use thiserror::Error;

/// Everything a tally store operation can fail with.
///
/// Per-call errors are returned to the caller as-is. Nothing in this crate
/// retries; retry policy belongs to whoever holds the handle.
#[derive(Debug, Error)]
pub enum TallyError {
    /// The key is not present in the repository (`update`, `get`).
    #[error("resource not found")]
    NotFound,

    /// The key is already present (`insert`).
    #[error("resource already exists")]
    AlreadyExists,

    /// Stored bytes are not a valid tally, or the new tally does not fit.
    #[error("invalid tally encoding: {0}")]
    Encoding(String),

    /// A selection algorithm ran over zero entries.
    #[error("repository is empty")]
    EmptyRepository,

    /// Random selection ran past the end, either because the repository is
    /// empty or because the size hint is larger than its current contents.
    #[error("repository is empty or the size hint is stale")]
    EmptyOrStale,

    /// A decrement would take a floored counter below its floor, such as
    /// retracting a vote that was never cast (`update_at_least`).
    #[error("nothing to retract")]
    NothingToRetract,

    /// The underlying engine failed to open, begin, or commit.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] redb::Error),
}

pub type Result<T, E = TallyError> = std::result::Result<T, E>;

// redb splits its errors by phase; they all collapse into `redb::Error`.
macro_rules! from_redb {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for TallyError {
                fn from(err: $ty) -> Self {
                    Self::StoreUnavailable(redb::Error::from(err))
                }
            }
        )*
    };
}

from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);
