//! Embedded vote tally store.
//!
//! Resources (in practice file paths) are registered once with an initial
//! tally and then moved up or down by votes. Tallies persist in a redb
//! database as fixed-width signed integers, one entry per resource key.
//!
//! # Modules
//!
//! - [`codec`]: fixed-width encoding of tallies
//! - [`store`]: the redb file and its scoped read/write transactions
//! - [`repository`]: insert, update, get, count, and snapshots
//! - [`selection`]: random and minimum-tally key selection
//! - [`ledger`]: optional second ledger counting vote attempts
//! - [`vote`]: vote direction and report rows
//! - [`error`]: the error type shared by all of the above
//!
//! All operations are blocking. Async callers should run them on a blocking
//! pool.

pub mod codec;
pub mod error;
pub mod ledger;
pub mod repository;
pub mod selection;
pub mod store;
pub mod vote;

pub use error::{Result, TallyError};
pub use ledger::DualLedger;
pub use repository::{Snapshot, TallyRepository};
pub use store::Store;
pub use vote::{Direction, VoteRecord};
