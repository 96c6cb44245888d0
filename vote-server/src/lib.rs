//! HTTP vote service over the embedded tally store.
//!
//! At startup every file under the configured static folder is registered
//! as a resource with a zero tally. Clients then fetch a resource to judge,
//! vote it up or down, and read back tallies. Each module has one job:
//!
//! - [`cli`] parses the command line (just the config path).
//! - [`config`] loads the JSON configuration file.
//! - [`logging`] sends log output to stdout or the configured file.
//! - [`backend`] picks between the single and dual ledger layouts.
//! - [`seed`] walks the static folder and registers its files.
//! - [`api`] maps HTTP routes onto store operations.
//! - [`server`] binds the router to a listener and handles shutdown.
//!
//! Integration tests drive the router and server through this crate
//! directly.

pub mod api;
pub mod backend;
pub mod cli;
pub mod config;
pub mod logging;
pub mod seed;
pub mod server;
